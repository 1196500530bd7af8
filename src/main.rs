//! CarbonSight - CLI entry point

#![forbid(unsafe_code)]

use clap::Parser;

use carbonsight_lib::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = carbonsight_lib::run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
