//! # finval CLI

use clap::Parser;

use crate::cli::Commands;

mod cli;

#[derive(Parser)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    finval::init().await;

    let cli = Cli::parse();
    match &cli.command {
        Commands::Analyze(cmd) => {
            cmd.exec().await;
        }
        Commands::Config(cmd) => {
            cmd.exec().await;
        }
        Commands::Sectors(cmd) => {
            cmd.exec().await;
        }
        Commands::Llm(cmd) => {
            cmd.exec().await;
        }
        Commands::Info(cmd) => {
            cmd.exec().await;
        }
    }
}
