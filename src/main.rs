use clap::Parser;
use gavel::cli::{self, Cli, Commands};
use gavel::config::AppConfig;
use gavel::error::Result;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Decide {
            context,
            no_oracle,
            stats,
        } => {
            init_logging();
            let config = AppConfig::load()?;
            cli::run_decide(&config, context, *no_oracle, *stats).await?;
        }
        Commands::Prompt { context } => {
            init_logging_simple();
            let config = AppConfig::load()?;
            cli::run_prompt(&config, context)?;
        }
    }

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,gavel=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

fn init_logging_simple() {
    // Minimal logging for prompt rendering
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}
