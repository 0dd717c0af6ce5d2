use clap::Parser;
use matching_engine::{cli, utils};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();
    utils::init_tracing(&args.log_level);
    cli::run(args).await
}
