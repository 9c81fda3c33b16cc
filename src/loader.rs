//! Sources for `{{include "path"}}` templates.

use crate::error::{Error, Result};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// Trait for loading included templates from different sources.
#[async_trait]
pub trait IncludeLoader: Send + Sync {
    /// Loads the template text stored under `path`.
    ///
    /// # Returns
    /// * `Result<String>` - The raw, unrendered template
    async fn load(&self, path: &str) -> Result<String>;
}

/// Reads includes from the filesystem, relative to a root directory.
#[derive(Debug, Clone)]
pub struct FsIncludeLoader {
    root: PathBuf,
}

impl FsIncludeLoader {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    /// A loader rooted at the current working directory.
    pub fn current_dir() -> Self {
        Self::new(std::env::current_dir().unwrap_or_default())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl IncludeLoader for FsIncludeLoader {
    async fn load(&self, path: &str) -> Result<String> {
        let full_path = self.root.join(path);
        tokio::fs::read_to_string(&full_path).await.map_err(|e| Error::IncludeLoad {
            path: path.to_string(),
            message: format!("{}: {e}", full_path.display()),
        })
    }
}

/// Serves includes from an in-memory table.
#[derive(Debug, Clone, Default)]
pub struct MemoryIncludeLoader {
    templates: IndexMap<String, String>,
}

impl MemoryIncludeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<String>, template: impl Into<String>) -> Self {
        self.insert(path, template);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, template: impl Into<String>) {
        self.templates.insert(path.into(), template.into());
    }
}

#[async_trait]
impl IncludeLoader for MemoryIncludeLoader {
    async fn load(&self, path: &str) -> Result<String> {
        self.templates.get(path).cloned().ok_or_else(|| Error::IncludeLoad {
            path: path.to_string(),
            message: "no such template".to_string(),
        })
    }
}
