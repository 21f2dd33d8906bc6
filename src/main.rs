//! AIBud CLI entry point

use aibud::cli::{Cli, Commands};
use aibud::commands::{run_chat, run_models, run_serve};
use aibud::config::Config;
use aibud::error::Result;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "aibud=debug" } else { "aibud=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose);

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| "config/config.yaml".to_string());
    let config = Config::load(&config_path, &cli)?;
    config.validate()?;

    match cli.command {
        Commands::Chat { search } => run_chat(config, search).await,
        Commands::Models => run_models(config).await,
        Commands::Serve { port } => run_serve(config, port).await,
    }
}
