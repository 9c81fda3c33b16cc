pub mod args;
pub mod context;
pub mod runner;

pub use args::{
    get_log_level_from_verbose, parse_cli, Cli, Commands, RenderArgs, ValidateArgs,
};
pub use runner::run;
