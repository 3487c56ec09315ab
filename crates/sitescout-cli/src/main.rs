use clap::{Parser, Subcommand};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "sitescout")]
#[command(about = "Deterministic expansion-site suggestion engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generate expansion suggestions for a region
    Generate(commands::GenerateArgs),
    /// Re-run a saved scenario against a fresh store snapshot
    Refresh(commands::RefreshArgs),
    /// List the named regions the engine can resolve
    Regions,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Generate(args) => commands::run_generate(args).await,
        Commands::Refresh(args) => commands::run_refresh(args).await,
        Commands::Regions => commands::run_regions(),
    }
}
