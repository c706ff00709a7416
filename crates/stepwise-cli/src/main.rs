use anyhow::Result;
use clap::Parser;
use stepwise_cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    stepwise_cli::run(Args::parse()).await
}
