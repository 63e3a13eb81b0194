mod migrate;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "storeforge-cli")]
#[command(about = "Storeforge command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run, inspect, or cancel store migrations.
    Migrate(migrate::MigrateArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Migrate(args) => migrate::run(args).await,
    }
}
