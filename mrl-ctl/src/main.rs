use std::time::Duration;

mod args;
use args::{parse_args, Commands};

mod core;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = parse_args();

    match args.command {
        Commands::Status => core::status(args.address).await?,
        Commands::Wait { interval_ms } => {
            core::wait(args.address, Duration::from_millis(interval_ms)).await?
        }
    }

    Ok(())
}
