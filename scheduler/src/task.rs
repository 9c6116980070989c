use tokio::time::{Duration, Instant};

/// Dispatch bookkeeping shared by map and reduce tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lease {
    /// When the task was last handed to an executor. `None` until the
    /// first dispatch.
    assigned_at: Option<Instant>,

    /// Set once, never cleared.
    done: bool,
}

impl Lease {
    pub fn assigned_at(&self) -> Option<Instant> {
        self.assigned_at
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Whether the task may be handed out at `now`.
    ///
    /// Incomplete tasks are dispatchable if they were never handed out, or if
    /// their executor has been silent for at least `stale_after`.
    pub fn is_dispatchable(&self, now: Instant, stale_after: Duration) -> bool {
        if self.done {
            return false;
        }

        match self.assigned_at {
            None => true,
            Some(at) => now.saturating_duration_since(at) >= stale_after,
        }
    }

    /// Record a dispatch. Returns `true` if the task had been handed out
    /// before, i.e. this is a reassignment.
    pub fn stamp(&mut self, now: Instant) -> bool {
        self.assigned_at.replace(now).is_some()
    }

    /// Mark the task complete. Returns `false` if it already was.
    pub fn complete(&mut self) -> bool {
        !std::mem::replace(&mut self.done, true)
    }
}

/// Access to the [`Lease`] of a task record.
pub trait Leased {
    fn lease(&self) -> &Lease;

    fn lease_mut(&mut self) -> &mut Lease;
}

/// A map task. There is exactly one per input partition.
#[derive(Debug, Clone)]
pub struct MapTask {
    /// Position of the input partition in the job's input list.
    id: usize,

    /// The input partition, e.g. a file path.
    input: String,

    lease: Lease,
}

impl MapTask {
    pub fn new(id: usize, input: String) -> Self {
        Self {
            id,
            input,
            lease: Lease::default(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn input(&self) -> &str {
        &self.input
    }
}

impl Leased for MapTask {
    fn lease(&self) -> &Lease {
        &self.lease
    }

    fn lease_mut(&mut self) -> &mut Lease {
        &mut self.lease
    }
}

/// A reduce task, one per reduce bucket.
#[derive(Debug, Clone)]
pub struct ReduceTask {
    /// The reduce bucket, in `0..n_reduce`.
    id: usize,

    /// Intermediate partitions written for this bucket by completed map
    /// tasks. Append-only.
    inputs: Vec<String>,

    lease: Lease,
}

impl ReduceTask {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            inputs: vec![],
            lease: Lease::default(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn inputs(&self) -> &Vec<String> {
        &self.inputs
    }

    pub fn add_input(&mut self, input: String) {
        self.inputs.push(input);
    }
}

impl Leased for ReduceTask {
    fn lease(&self) -> &Lease {
        &self.lease
    }

    fn lease_mut(&mut self) -> &mut Lease {
        &mut self.lease
    }
}

/// Find the first dispatchable task, in identity order, and stamp it with
/// `now`.
///
/// Returns the index of the task and whether it was a reassignment.
pub fn dispatch_next<T: Leased>(
    tasks: &mut [T],
    now: Instant,
    stale_after: Duration,
) -> Option<(usize, bool)> {
    let (index, task) = tasks
        .iter_mut()
        .enumerate()
        .find(|(_, task)| task.lease().is_dispatchable(now, stale_after))?;

    let reassigned = task.lease_mut().stamp(now);
    Some((index, reassigned))
}
