use crate::constants::{exit_codes, verbosity};
use crate::options::OutputFormat;
use clap::{error::ErrorKind, Args as ClapArgs, CommandFactory, Parser, Subcommand};
use log::LevelFilter;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = r#"{about-section}
{usage-heading} {usage}

{all-args}
{after-help}
"#;

/// Command-line front end of the stencil template engine.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a template file to stdout.
    Render(RenderArgs),
    /// Check a template's blocks and conditions without rendering it.
    Validate(ValidateArgs),
}

impl Commands {
    pub fn verbose(&self) -> u8 {
        match self {
            Commands::Render(args) => args.verbose,
            Commands::Validate(args) => args.verbose,
        }
    }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RenderArgs {
    /// Template file to render. Includes resolve relative to its directory.
    #[arg(value_name = "TEMPLATE_FILE")]
    pub template: PathBuf,

    /// Context as a JSON object, or `-` to read it from stdin.
    #[arg(short, long)]
    pub context: Option<String>,

    /// Context file (`.json`, `.yaml` or `.yml`), merged under `--context`.
    #[arg(long = "context-file", value_name = "PATH")]
    pub context_file: Option<PathBuf>,

    /// Engine configuration file (`.json`, `.yaml` or `.yml`).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Reformat the rendered output.
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Trim surrounding whitespace and trailing whitespace on each line.
    #[arg(long)]
    pub trim: bool,

    /// Bypass the render cache.
    #[arg(long = "no-cache")]
    pub no_cache: bool,

    /// Fail on the first placeholder that cannot be resolved.
    #[arg(long)]
    pub strict: bool,

    /// Increase logging verbosity (`-v`, `-vv`, `-vvv`).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ValidateArgs {
    #[arg(value_name = "TEMPLATE_FILE")]
    pub template: PathBuf,

    /// Increase logging verbosity (`-v`, `-vv`, `-vvv`).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parse command line arguments, printing help when a required input is missing.
pub fn parse_cli() -> Cli {
    Cli::try_parse().unwrap_or_else(|e| {
        if e.kind() == ErrorKind::MissingRequiredArgument
            || e.kind() == ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
        {
            let mut command = Cli::command().help_template(HELP_TEMPLATE);
            if let Err(print_err) = command.print_help() {
                eprintln!("Failed to display help information: {print_err}");
            } else {
                println!();
            }
            std::process::exit(exit_codes::FAILURE);
        } else {
            e.exit();
        }
    })
}

/// Map `-v` counts to the appropriate log level.
pub fn get_log_level_from_verbose(verbose_count: u8) -> LevelFilter {
    match verbose_count {
        verbosity::OFF => LevelFilter::Error,
        verbosity::INFO => LevelFilter::Info,
        verbosity::DEBUG => LevelFilter::Debug,
        verbosity::TRACE.. => LevelFilter::Trace,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_verbose_flags_to_log_filters() {
        assert_eq!(get_log_level_from_verbose(verbosity::OFF), LevelFilter::Error);
        assert_eq!(get_log_level_from_verbose(verbosity::INFO), LevelFilter::Info);
        assert_eq!(get_log_level_from_verbose(verbosity::DEBUG), LevelFilter::Debug);
        assert_eq!(get_log_level_from_verbose(verbosity::TRACE), LevelFilter::Trace);
        assert_eq!(get_log_level_from_verbose(verbosity::TRACE + 1), LevelFilter::Trace);
    }

    #[test]
    fn parses_minimal_render_args() {
        let cli = Cli::parse_from(["stencil", "render", "body.tpl"]);
        let Commands::Render(args) = cli.command else { panic!("expected render") };
        assert_eq!(args.template, PathBuf::from("body.tpl"));
        assert!(args.context.is_none());
        assert!(!args.no_cache);
    }

    #[test]
    fn parses_full_render_flags() {
        let cli = Cli::parse_from([
            "stencil",
            "render",
            "body.tpl",
            "--context",
            "{\"name\":\"John\"}",
            "--context-file",
            "ctx.yaml",
            "--config",
            "stencil.json",
            "--format",
            "json",
            "--trim",
            "--no-cache",
            "--strict",
            "-vv",
        ]);
        assert_eq!(cli.command.verbose(), 2);
        let Commands::Render(args) = cli.command else { panic!("expected render") };
        assert_eq!(args.context.as_deref(), Some("{\"name\":\"John\"}"));
        assert_eq!(args.context_file, Some(PathBuf::from("ctx.yaml")));
        assert_eq!(args.config, Some(PathBuf::from("stencil.json")));
        assert_eq!(args.format, Some(OutputFormat::Json));
        assert!(args.trim && args.no_cache && args.strict);
    }

    #[test]
    fn parses_validate() {
        let cli = Cli::parse_from(["stencil", "validate", "body.tpl", "-v"]);
        assert_eq!(cli.command.verbose(), 1);
        assert!(matches!(cli.command, Commands::Validate(_)));
    }
}
