use thiserror::Error;

use crate::TaskKind;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("A job needs at least one input partition")]
    EmptyInput,

    #[error("A job needs at least one reduce task")]
    NoReduceTasks,

    #[error("No {kind} task with id {task_id} (job has {count})")]
    InvalidTaskId {
        kind: TaskKind,
        task_id: usize,
        count: usize,
    },

    #[error("Reduce bucket {bucket} is out of range (n_reduce = {n_reduce})")]
    InvalidBucket { bucket: usize, n_reduce: usize },
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
