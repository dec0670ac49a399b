use anyhow::Result;
use clap::Parser;
use labctl::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.run().await
}
