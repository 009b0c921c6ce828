use anyhow::Result;
use clap::Parser;
use meeting_orchestrator::{
    app,
    cli::{handle_cleanup_command, handle_inspect_command, handle_rescan_command, Cli, CliCommand},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Some(CliCommand::Version) => {
            println!("meeting-orchestrator {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Some(CliCommand::Inspect(args)) => {
            handle_inspect_command(args).await?;
            return Ok(());
        }
        Some(CliCommand::Rescan(args)) => {
            handle_rescan_command(args).await?;
            return Ok(());
        }
        Some(CliCommand::Cleanup(args)) => {
            handle_cleanup_command(args).await?;
            return Ok(());
        }
        Some(CliCommand::Serve) | None => {}
    }

    app::run_service().await
}
