/// Handles argument parsing and the command-line runner.
pub mod cli;

/// Defines custom error types.
pub mod error;

/// Defaults, markers and other shared constants.
pub mod constants;

/// Extension traits over the value domain.
pub mod ext;

/// Render context, loop scopes and property paths.
pub mod context;

/// Tokenizer and evaluator for `#if` conditions.
pub mod expression;

/// Placeholder expression parsing.
pub mod placeholder;

/// Built-in and custom transformers.
pub mod transformers;

/// Date parsing and formatting used by the date transformers.
pub mod date;

/// Template block tree.
pub mod ast;

/// Block parser producing the template tree.
pub mod parser;

/// Sources for included templates.
pub mod loader;

/// Async template functions and custom resolvers.
pub mod functions;

/// TTL and memory bounded render cache.
pub mod cache;

/// Post-render output formatting.
pub mod format;

/// Render options and engine configuration.
pub mod options;

/// The template engine.
pub mod engine;

pub use cache::{CacheConfig, CacheStats, TemplateCache};
pub use context::TemplateContext;
pub use engine::TemplateEngine;
pub use error::{Error, Result};
pub use functions::{Resolver, TemplateFunction};
pub use loader::{FsIncludeLoader, IncludeLoader, MemoryIncludeLoader};
pub use options::{EngineConfig, OutputFormat, PlaceholderOptions, RenderOptions};
pub use serde_json::Value;
