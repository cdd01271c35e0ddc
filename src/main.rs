use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use readbook::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    init_tracing();

    match args.get_command() {
        cli::Commands::Start => {
            commands::start::execute(&args.config).await?;
        }
        cli::Commands::Test => {
            commands::test::execute(&args.config)?;
        }
        cli::Commands::Version => {
            println!("readbook v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
