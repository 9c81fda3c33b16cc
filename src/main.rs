use stencil::{
    cli::{get_log_level_from_verbose, parse_cli, run},
    error::default_error_handler,
};

#[tokio::main]
async fn main() {
    let cli = parse_cli();
    let level = get_log_level_from_verbose(cli.command.verbose());
    env_logger::Builder::new().filter_level(level).init();

    if let Err(err) = run(cli.command).await {
        default_error_handler(err);
    }
}
