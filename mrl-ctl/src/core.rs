use std::time::Duration;

use tonic::transport::Channel;
use tracing::debug;

//
// Import gRPC stubs/definitions.
//
use crate::core::coordinator::coordinator_client::CoordinatorClient;
use crate::core::coordinator::{StatusRequest, StatusResponse};

pub mod coordinator {
    tonic::include_proto!("coordinator");
}

async fn fetch_status(client: &mut CoordinatorClient<Channel>) -> anyhow::Result<StatusResponse> {
    let request = tonic::Request::new(StatusRequest {});
    let response = client.status(request).await?;
    Ok(response.into_inner())
}

pub fn format_status(status: &StatusResponse) -> Vec<String> {
    vec![
        format!("phase:  {}", status.phase),
        format!(
            "map:    {}/{} done",
            status.map_total - status.map_remaining,
            status.map_total
        ),
        format!(
            "reduce: {}/{} done",
            status.reduce_total - status.reduce_remaining,
            status.reduce_total
        ),
    ]
}

pub async fn status(address: String) -> anyhow::Result<()> {
    let mut client = CoordinatorClient::connect(address).await?;
    let status = fetch_status(&mut client).await?;

    println!("[Status]");
    for line in format_status(&status) {
        println!("{}", line);
    }

    Ok(())
}

pub async fn wait(address: String, interval: Duration) -> anyhow::Result<()> {
    let mut client = CoordinatorClient::connect(address).await?;

    loop {
        let status = fetch_status(&mut client).await?;
        if status.complete {
            println!("Job complete.");
            return Ok(());
        }
        debug!("Job still {}", status.phase);
        tokio::time::sleep(interval).await;
    }
}
