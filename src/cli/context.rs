//! Assembles the render context from command-line sources.

use crate::constants::STDIN_INDICATOR;
use crate::context::TemplateContext;
use crate::error::{Error, Result};
use serde_json::Value;
use std::path::Path;

/// Collects the context from a context file and the `--context` argument.
/// Keys from `--context` override keys from the file.
pub struct ContextCollector;

impl ContextCollector {
    pub fn collect(context_file: Option<&Path>, context_arg: Option<&str>) -> Result<TemplateContext> {
        let mut context = TemplateContext::new();

        if let Some(path) = context_file {
            log::debug!("Reading context file {}", path.display());
            context = context.merged_with(&Self::read_file(path)?);
        }

        if let Some(arg) = context_arg {
            let text = if arg == STDIN_INDICATOR {
                Self::read_from(std::io::stdin())?
            } else {
                arg.to_string()
            };
            context = context.merged_with(&Self::parse_json(&text)?);
        }

        Ok(context)
    }

    fn read_from(mut reader: impl std::io::Read) -> Result<String> {
        let mut buf = String::new();
        reader.read_to_string(&mut buf)?;
        Ok(buf)
    }

    fn read_file(path: &Path) -> Result<TemplateContext> {
        let content = std::fs::read_to_string(path)?;
        let value: Value = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            _ => {
                return Err(Error::Config(format!(
                    "unsupported context file '{}', expected .json, .yaml or .yml",
                    path.display()
                )))
            }
        };
        TemplateContext::from_value(value)
    }

    /// Parses a JSON object, retrying once with shell-escaped quotes undone.
    fn parse_json(text: &str) -> Result<TemplateContext> {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => TemplateContext::from_value(value),
            Err(initial_err) if text.contains("\\\"") => {
                match serde_json::from_str::<Value>(&text.replace("\\\"", "\"")) {
                    Ok(value) => TemplateContext::from_value(value),
                    Err(_) => Err(initial_err.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}
