use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use mrl_coordinator::args::Args;
use mrl_coordinator::{run, serve, MRCoordinator};
use scheduler::Scheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // Retrieve server configuration from command line.
    // Note: There are default values for every argument except the inputs.
    let args = Args::parse();

    let scheduler = Arc::new(Scheduler::new(args.inputs.clone(), args.scheduler_config())?);
    info!(
        "Scheduling {} map tasks and {} reduce tasks",
        args.inputs.len(),
        args.n_reduce
    );

    let listener = TcpListener::bind(args.socket_addr()?).await?;
    let shutdown = CancellationToken::new();

    let server = tokio::spawn(serve(
        listener,
        MRCoordinator::new(scheduler.clone()),
        shutdown.clone(),
    ));

    let interrupt = shutdown.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Coordinator interrupted, shutting down");
                interrupt.cancel();
            }
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }
    });

    run(
        &scheduler,
        server,
        args.poll_interval(),
        args.grace(),
        &shutdown,
    )
    .await
}
