use chunkagg::app::{handle_fatal_error, init_logging, AppConfig};
use chunkagg::cli::{execute_command, Cli};
use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let app_config = AppConfig::new(cli.verbose);
    init_logging(&app_config);

    if let Err(e) = execute_command(cli.command).await {
        handle_fatal_error(e, app_config.verbose);
    }
}
