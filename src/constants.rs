//! Constants used throughout the engine

use std::time::Duration;

/// Template tag delimiters
pub const TAG_OPEN: &str = "{{";
pub const TAG_CLOSE: &str = "}}";

/// Transformer segment that sets a placeholder's fallback value
pub const DEFAULT_SEGMENT_PREFIX: &str = "default:";

/// Placeholder stringification defaults
pub const DEFAULT_NULL_VALUE: &str = "null";
pub const DEFAULT_UNDEFINED_VALUE: &str = "";
pub const DEFAULT_JSON_INDENT: usize = 2;

/// Date format used by the `date` transformer when no format is given
pub const DEFAULT_DATE_FORMAT: &str = "YYYY-MM-DD";

/// Nesting limit for `{{include}}`, which stops self-including templates
pub const MAX_INCLUDE_DEPTH: usize = 32;

/// Nesting limit for `#if` and `#each` blocks; deeper openers stay literal text
pub const MAX_BLOCK_DEPTH: usize = 64;

/// Upper bound for the decimals argument of numeric transformers
pub const MAX_DECIMALS: usize = 100;

/// Cache defaults
pub mod cache {
    use super::Duration;

    pub const MAX_SIZE: usize = 1000;
    pub const MAX_MEMORY: usize = 50 * 1024 * 1024;
    pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);
    pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);
}

/// Loop variable suffixes, appended to the loop variable name
pub mod loop_vars {
    pub const INDEX: &str = "Index";
    pub const COUNT: &str = "Count";
    pub const FIRST: &str = "First";
    pub const LAST: &str = "Last";
}

/// Inline markers left in the output when a block degrades
pub mod markers {
    pub fn include_failed(path: &str) -> String {
        format!("<!-- include failed: {path} -->")
    }

    pub fn function_failed(name: &str, message: &str) -> String {
        format!("<!-- error in {name}(): {message} -->")
    }
}

/// Exit codes
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
}

/// Verbosity levels
pub mod verbosity {
    pub const OFF: u8 = 0;
    pub const INFO: u8 = 1;
    pub const DEBUG: u8 = 2;
    pub const TRACE: u8 = 3;
}

/// STDIN indicator for CLI arguments
pub const STDIN_INDICATOR: &str = "-";
