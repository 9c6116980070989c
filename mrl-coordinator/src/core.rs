use std::sync::Arc;

use anyhow::anyhow;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tonic::transport::server::TcpIncoming;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

//
// Import gRPC stubs/definitions.
//
pub use coordinator::coordinator_client::CoordinatorClient;
pub use coordinator::coordinator_server::{Coordinator, CoordinatorServer};
pub use coordinator::{
    AssignmentKind, ReportKind, StatusRequest, StatusResponse, TaskReply, TaskRequest,
};
pub mod coordinator {
    tonic::include_proto!("coordinator");
}

use scheduler::{Assignment, JobStatus, Report, Scheduler, SchedulerError};

/// gRPC front of the [`Scheduler`].
#[derive(Debug, Clone)]
pub struct MRCoordinator {
    scheduler: Arc<Scheduler>,
}

impl MRCoordinator {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        Self { scheduler }
    }
}

#[tonic::async_trait]
impl Coordinator for MRCoordinator {
    /// Executor reports its previous task and asks for the next one.
    async fn request_task(
        &self,
        request: Request<TaskRequest>,
    ) -> Result<Response<TaskReply>, Status> {
        debug!("Got a task request from {:?}", request.remote_addr());

        let report = report_from_request(request.into_inner())?;
        let assignment = self
            .scheduler
            .request_task(report)
            .await
            .map_err(status_from_error)?;

        Ok(Response::new(reply_from_assignment(assignment)?))
    }

    async fn status(
        &self,
        _: Request<StatusRequest>,
    ) -> Result<Response<StatusResponse>, Status> {
        let status = self.scheduler.status().await;
        Ok(Response::new(status_response(status)?))
    }
}

/// Convert a wire request into a [`Report`].
///
/// NOTE: This is TIGHTLY coupled with the stubs generated from
///       `coordinator.proto`. Keep the two in sync.
pub fn report_from_request(request: TaskRequest) -> Result<Report, Status> {
    let kind = ReportKind::try_from(request.kind)
        .map_err(|_| Status::invalid_argument(format!("Unknown report kind {}", request.kind)))?;
    let task_id = request.task_id as usize;

    let report = match kind {
        ReportKind::None => Report::None,
        ReportKind::Map => Report::Map {
            task_id,
            outputs: request
                .intermediate
                .into_iter()
                .map(|(bucket, path)| (bucket as usize, path))
                .collect(),
        },
        ReportKind::Reduce => Report::Reduce { task_id },
    };

    Ok(report)
}

/// Rejected reports are the executor's fault, never the coordinator's.
fn status_from_error(err: SchedulerError) -> Status {
    warn!("Rejecting task request: {}", err);
    Status::invalid_argument(err.to_string())
}

/// Narrow a scheduler count or identity to its wire width.
///
/// The scheduler accepts any `usize`, the wire carries `uint32`. A value that
/// does not fit is reported instead of being truncated.
fn wire_u32(value: usize, field: &str) -> Result<u32, Status> {
    u32::try_from(value).map_err(|_| {
        Status::internal(format!("{} {} does not fit in the wire format", field, value))
    })
}

/// NOTE: TIGHTLY coupled with `TaskReply` in `coordinator.proto`.
pub fn reply_from_assignment(assignment: Assignment) -> Result<TaskReply, Status> {
    let reply = match assignment {
        Assignment::Map {
            task_id,
            input,
            n_reduce,
        } => TaskReply {
            kind: AssignmentKind::Map as i32,
            task_id: wire_u32(task_id, "task_id")?,
            inputs: vec![input],
            n_reduce: wire_u32(n_reduce, "n_reduce")?,
        },
        Assignment::Reduce { task_id, inputs } => TaskReply {
            kind: AssignmentKind::Reduce as i32,
            task_id: wire_u32(task_id, "task_id")?,
            inputs,
            n_reduce: 0,
        },
        Assignment::Wait => TaskReply {
            kind: AssignmentKind::Wait as i32,
            ..Default::default()
        },
        Assignment::Exit => TaskReply {
            kind: AssignmentKind::Exit as i32,
            ..Default::default()
        },
    };

    Ok(reply)
}

pub fn status_response(status: JobStatus) -> Result<StatusResponse, Status> {
    Ok(StatusResponse {
        phase: status.phase.to_string(),
        map_total: wire_u32(status.map_total, "map_total")?,
        map_remaining: wire_u32(status.map_remaining, "map_remaining")?,
        reduce_total: wire_u32(status.reduce_total, "reduce_total")?,
        reduce_remaining: wire_u32(status.reduce_remaining, "reduce_remaining")?,
        complete: status.is_complete(),
    })
}

/// Serve the coordinator on an already bound listener until `shutdown` fires.
///
/// Accept errors (e.g. running out of file descriptors) are logged and the
/// server keeps accepting, like `Server::serve` does for an address.
pub async fn serve(
    listener: TcpListener,
    coordinator: MRCoordinator,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    let incoming = TcpIncoming::from_listener(listener, true, None)
        .map_err(|e| anyhow!("Unable to serve on {}: {}", addr, e))?;
    info!("CoordinatorServer listening on {}", addr);

    Server::builder()
        .add_service(CoordinatorServer::new(coordinator))
        .serve_with_incoming_shutdown(incoming, shutdown.cancelled())
        .await?;

    info!("CoordinatorServer stopped");
    Ok(())
}
