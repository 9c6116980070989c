//! Task scheduling for MapReduce (lite) jobs.
//!
//! Executors pull work from the [`Scheduler`] by calling
//! [`Scheduler::request_task`], reporting the outcome of whatever they held
//! before. Nothing is ever pushed to an executor: the reply is either a map
//! task, a reduce task, an instruction to wait, or an instruction to exit.
//!
//! An executor that holds a task for longer than the configured staleness
//! threshold without reporting back is presumed dead, and its task becomes
//! eligible for dispatch again.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

pub mod core;
pub mod error;
pub mod table;
pub mod task;

pub use crate::core::Scheduler;
pub use crate::error::{Result, SchedulerError};
pub use crate::table::TaskTable;

/// How long a dispatched task may go unreported before it is handed out again.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(10);

/////////////////////////////////////////////////////////////////////////////
// Job configuration
/////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Number of reduce buckets map output is partitioned into.
    pub n_reduce: usize,

    /// Staleness threshold for re-dispatching unreported tasks.
    pub stale_after: Duration,
}

impl SchedulerConfig {
    pub fn new(n_reduce: usize) -> Self {
        Self {
            n_reduce,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }
}

/////////////////////////////////////////////////////////////////////////////
// Task kinds and job phase
/////////////////////////////////////////////////////////////////////////////

/// The kind of a schedulable task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Map,
    Reduce,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Map => write!(f, "map"),
            TaskKind::Reduce => write!(f, "reduce"),
        }
    }
}

/// Phase of the job.
///
/// Never stored, always derived from the remaining task counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// At least one map task is incomplete.
    Mapping,

    /// Every map task is complete, at least one reduce task is not.
    Reducing,

    /// Job completed.
    Done,
}

impl Phase {
    pub fn from_remaining(map_remaining: usize, reduce_remaining: usize) -> Self {
        if map_remaining > 0 {
            Phase::Mapping
        } else if reduce_remaining > 0 {
            Phase::Reducing
        } else {
            Phase::Done
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Mapping => write!(f, "mapping"),
            Phase::Reducing => write!(f, "reducing"),
            Phase::Done => write!(f, "done"),
        }
    }
}

/////////////////////////////////////////////////////////////////////////////
// Executor protocol
/////////////////////////////////////////////////////////////////////////////

/// What an executor reports about the task it held before asking for more.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Report {
    /// First contact, or the previous reply was `Wait`.
    #[default]
    None,

    /// A map task finished. `outputs` maps a reduce bucket to the
    /// intermediate partition written for it. Empty references are ignored.
    Map {
        task_id: usize,
        outputs: HashMap<usize, String>,
    },

    /// A reduce task finished.
    Reduce { task_id: usize },
}

/// The scheduler's answer to an executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    /// Run the map function over `input`, partitioning output into
    /// `n_reduce` buckets.
    Map {
        task_id: usize,
        input: String,
        n_reduce: usize,
    },

    /// Run the reduce function over every intermediate partition of bucket
    /// `task_id`.
    Reduce { task_id: usize, inputs: Vec<String> },

    /// Nothing is dispatchable right now. Ask again later.
    Wait,

    /// The job is done.
    Exit,
}

/// A point-in-time view of the job, for drivers and operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobStatus {
    pub phase: Phase,
    pub map_total: usize,
    pub map_remaining: usize,
    pub reduce_total: usize,
    pub reduce_remaining: usize,
}

impl JobStatus {
    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Done
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "phase={} map={}/{} reduce={}/{}",
            self.phase,
            self.map_total - self.map_remaining,
            self.map_total,
            self.reduce_total - self.reduce_remaining,
            self.reduce_total,
        )
    }
}
