use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::{Assignment, JobStatus, Report, Result, SchedulerConfig, TaskTable};

/// The job scheduler shared by every executor connection.
///
/// All state lives in one [`TaskTable`] behind one lock. Each call holds the
/// lock for its whole body and never awaits anything else while holding it.
#[derive(Debug)]
pub struct Scheduler {
    table: Mutex<TaskTable>,
}

impl Scheduler {
    /// Create a scheduler for `inputs`, one map task per input partition.
    ///
    /// Fails if `inputs` is empty or `config.n_reduce` is zero.
    pub fn new(inputs: Vec<String>, config: SchedulerConfig) -> Result<Self> {
        let table = TaskTable::new(inputs, config)?;
        Ok(Self {
            table: Mutex::new(table),
        })
    }

    /// Create a scheduler with the default staleness threshold.
    pub fn with_defaults(inputs: Vec<String>, n_reduce: usize) -> Result<Self> {
        Self::new(inputs, SchedulerConfig::new(n_reduce))
    }

    /// Record what an executor finished and hand it its next assignment.
    pub async fn request_task(&self, report: Report) -> Result<Assignment> {
        let mut table = self.table.lock().await;
        table.handle(report, Instant::now())
    }

    /// Whether every map and reduce task has been reported complete.
    pub async fn is_job_complete(&self) -> bool {
        self.table.lock().await.is_complete()
    }

    pub async fn status(&self) -> JobStatus {
        self.table.lock().await.status()
    }

    /// Intermediate partitions collected so far for a reduce bucket.
    pub async fn reduce_inputs(&self, bucket: usize) -> Option<Vec<String>> {
        self.table.lock().await.reduce_inputs(bucket).cloned()
    }
}
