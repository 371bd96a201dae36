use std::env;
use std::error::Error;
use std::process;

use clap::Parser;
use hhd::cli::{main_cli, Args, Commands};
use hhd::daemon;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let args = Args::parse();
    let log_level = match env::var("LOG_LEVEL") {
        Ok(value) => value,
        Err(_) => "info".to_string(),
    };
    env::set_var("RUST_LOG", log_level);
    env_logger::init();

    if let Some(cmd) = args.cmd.clone() {
        if !matches!(cmd, Commands::Run) {
            if let Err(e) = main_cli(args) {
                eprintln!("{e}");
                process::exit(1);
            }
            return Ok(());
        }
    }

    const VERSION: &str = env!("CARGO_PKG_VERSION");
    log::info!("Starting Handheld Daemon v{}", VERSION);

    if let Err(e) = daemon::run().await {
        log::error!("Handheld Daemon failed: {e}");
        return Err(e);
    }
    Ok(())
}
