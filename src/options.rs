//! Render options and engine configuration

use crate::cache::CacheConfig;
use crate::constants::{DEFAULT_JSON_INDENT, DEFAULT_NULL_VALUE, DEFAULT_UNDEFINED_VALUE};
use crate::error::{Error, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Post-render formatting applied to the final output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Xml,
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OutputFormat::Json => "json",
            OutputFormat::Xml => "xml",
        };
        write!(f, "{s}")
    }
}

/// How placeholders are resolved and stringified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaceholderOptions {
    /// Propagate placeholder failures instead of degrading.
    pub throw_on_error: bool,
    /// Leave a failed placeholder's `{{...}}` text in the output.
    pub keep_unresolved: bool,
    /// Output for a failed placeholder when neither of the above is set.
    pub default_value: Option<String>,
    pub null_value: String,
    pub undefined_value: String,
    /// Render objects and arrays as JSON rather than display text.
    pub stringify_objects: bool,
    pub json_indent: usize,
    /// Cache the output of [`resolve_placeholders`](crate::TemplateEngine::resolve_placeholders).
    /// Not read from files: the render-level `useCache` shares its key.
    #[serde(skip)]
    pub use_cache: bool,
}

impl Default for PlaceholderOptions {
    fn default() -> Self {
        Self {
            throw_on_error: false,
            keep_unresolved: false,
            default_value: None,
            null_value: DEFAULT_NULL_VALUE.to_string(),
            undefined_value: DEFAULT_UNDEFINED_VALUE.to_string(),
            stringify_objects: true,
            json_indent: DEFAULT_JSON_INDENT,
            use_cache: false,
        }
    }
}

/// Options for one [`process_template`](crate::TemplateEngine::process_template) call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderOptions {
    pub use_cache: bool,
    pub trim_whitespace: bool,
    pub format: Option<OutputFormat>,
    /// Overrides the cache's default TTL for this render's entry.
    #[serde(rename = "cacheTTL", with = "duration_secs::option")]
    pub cache_ttl: Option<Duration>,
    /// Replace failed includes with a marker comment instead of failing.
    pub ignore_include_errors: bool,
    #[serde(flatten)]
    pub placeholder: PlaceholderOptions,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            trim_whitespace: false,
            format: None,
            cache_ttl: None,
            ignore_include_errors: false,
            placeholder: PlaceholderOptions::default(),
        }
    }
}

impl RenderOptions {
    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }
}

/// Engine-wide configuration, loadable from a JSON or YAML file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    /// Defaults for renders that don't pass their own options.
    pub render: RenderOptions,
    /// Directory includes are resolved against; the working directory when unset.
    pub include_root: Option<PathBuf>,
}

impl EngineConfig {
    /// Loads a configuration file, choosing the parser by extension.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            _ => {
                return Err(Error::Config(format!(
                    "unsupported configuration file '{}', expected .json, .yaml or .yml",
                    path.display()
                )))
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache.max_memory == 0 {
            return Err(Error::Config("cache.maxMemory must be greater than zero".into()));
        }
        if self.cache.cleanup_interval.is_zero() {
            return Err(Error::Config("cache.cleanupInterval must be greater than zero".into()));
        }
        Ok(())
    }
}

/// Serde adapter for durations written as (fractional) seconds.
pub mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(duration) => serializer.serialize_some(&duration.as_secs_f64()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            Option::<f64>::deserialize(deserializer)?
                .map(|secs| Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
