use std::collections::HashMap;

use tokio::time::{Duration, Instant};
use tracing::{debug, info};

use crate::task::{dispatch_next, Leased, MapTask, ReduceTask};
use crate::{
    Assignment, JobStatus, Phase, Report, Result, SchedulerConfig, SchedulerError, TaskKind,
};

/// Every task record of a job, plus the remaining-task counters.
///
/// The table holds no lock of its own. [`crate::Scheduler`] wraps it in one
/// and calls [`TaskTable::handle`] for each executor request, so a whole
/// request is applied as a single transaction.
#[derive(Debug)]
pub struct TaskTable {
    map_tasks: Vec<MapTask>,
    reduce_tasks: Vec<ReduceTask>,

    /// Number of map tasks not yet reported complete.
    map_remaining: usize,

    /// Number of reduce tasks not yet reported complete.
    reduce_remaining: usize,

    stale_after: Duration,
}

impl TaskTable {
    /// Create one map task per input partition and `n_reduce` reduce tasks.
    pub fn new(inputs: Vec<String>, config: SchedulerConfig) -> Result<Self> {
        if inputs.is_empty() {
            return Err(SchedulerError::EmptyInput);
        }
        if config.n_reduce == 0 {
            return Err(SchedulerError::NoReduceTasks);
        }

        let map_tasks: Vec<MapTask> = inputs
            .into_iter()
            .enumerate()
            .map(|(id, input)| MapTask::new(id, input))
            .collect();
        let reduce_tasks: Vec<ReduceTask> = (0..config.n_reduce).map(ReduceTask::new).collect();

        Ok(Self {
            map_remaining: map_tasks.len(),
            reduce_remaining: reduce_tasks.len(),
            map_tasks,
            reduce_tasks,
            stale_after: config.stale_after,
        })
    }

    /// Apply an executor's report, then pick its next assignment.
    ///
    /// A report that names a non-existent task or bucket is rejected before
    /// anything is mutated.
    pub fn handle(&mut self, report: Report, now: Instant) -> Result<Assignment> {
        self.validate(&report)?;
        self.ingest(report);
        Ok(self.assign(now))
    }

    fn validate(&self, report: &Report) -> Result<()> {
        match report {
            Report::None => Ok(()),
            Report::Map { task_id, outputs } => {
                if *task_id >= self.map_tasks.len() {
                    return Err(SchedulerError::InvalidTaskId {
                        kind: TaskKind::Map,
                        task_id: *task_id,
                        count: self.map_tasks.len(),
                    });
                }
                match outputs.keys().find(|&&bucket| bucket >= self.n_reduce()) {
                    Some(&bucket) => Err(SchedulerError::InvalidBucket {
                        bucket,
                        n_reduce: self.n_reduce(),
                    }),
                    None => Ok(()),
                }
            }
            Report::Reduce { task_id } => {
                if *task_id >= self.reduce_tasks.len() {
                    return Err(SchedulerError::InvalidTaskId {
                        kind: TaskKind::Reduce,
                        task_id: *task_id,
                        count: self.reduce_tasks.len(),
                    });
                }
                Ok(())
            }
        }
    }

    fn ingest(&mut self, report: Report) {
        match report {
            Report::None => {}
            Report::Map { task_id, outputs } => self.complete_map(task_id, outputs),
            Report::Reduce { task_id } => self.complete_reduce(task_id),
        }
    }

    fn complete_map(&mut self, task_id: usize, outputs: HashMap<usize, String>) {
        // A reassigned task can be reported by more than one executor. Only
        // the first report may feed the reduce buckets.
        if !self.map_tasks[task_id].lease_mut().complete() {
            debug!(task_id, "Ignoring duplicate map report");
            return;
        }
        self.map_remaining -= 1;

        for (bucket, output) in outputs {
            if !output.is_empty() {
                self.reduce_tasks[bucket].add_input(output);
            }
        }

        info!(task_id, remaining = self.map_remaining, "Map task complete");
        if self.map_remaining == 0 {
            info!("All map tasks complete, moving to reduce phase");
        }
    }

    fn complete_reduce(&mut self, task_id: usize) {
        if !self.reduce_tasks[task_id].lease_mut().complete() {
            debug!(task_id, "Ignoring duplicate reduce report");
            return;
        }
        self.reduce_remaining -= 1;

        info!(task_id, remaining = self.reduce_remaining, "Reduce task complete");
        if self.reduce_remaining == 0 {
            info!("All reduce tasks complete, job finished");
        }
    }

    fn assign(&mut self, now: Instant) -> Assignment {
        match self.phase() {
            Phase::Mapping => {
                let Some((index, reassigned)) =
                    dispatch_next(&mut self.map_tasks, now, self.stale_after)
                else {
                    debug!("No map task dispatchable, executor should wait");
                    return Assignment::Wait;
                };
                let task = &self.map_tasks[index];
                log_dispatch(TaskKind::Map, task.id(), reassigned);

                Assignment::Map {
                    task_id: task.id(),
                    input: task.input().to_owned(),
                    n_reduce: self.n_reduce(),
                }
            }
            Phase::Reducing => {
                let Some((index, reassigned)) =
                    dispatch_next(&mut self.reduce_tasks, now, self.stale_after)
                else {
                    debug!("No reduce task dispatchable, executor should wait");
                    return Assignment::Wait;
                };
                let task = &self.reduce_tasks[index];
                log_dispatch(TaskKind::Reduce, task.id(), reassigned);

                Assignment::Reduce {
                    task_id: task.id(),
                    inputs: task.inputs().clone(),
                }
            }
            Phase::Done => Assignment::Exit,
        }
    }

    pub fn phase(&self) -> Phase {
        Phase::from_remaining(self.map_remaining, self.reduce_remaining)
    }

    pub fn is_complete(&self) -> bool {
        self.map_remaining == 0 && self.reduce_remaining == 0
    }

    pub fn status(&self) -> JobStatus {
        JobStatus {
            phase: self.phase(),
            map_total: self.map_tasks.len(),
            map_remaining: self.map_remaining,
            reduce_total: self.reduce_tasks.len(),
            reduce_remaining: self.reduce_remaining,
        }
    }

    pub fn n_reduce(&self) -> usize {
        self.reduce_tasks.len()
    }

    pub fn map_remaining(&self) -> usize {
        self.map_remaining
    }

    pub fn reduce_remaining(&self) -> usize {
        self.reduce_remaining
    }

    #[cfg(test)]
    pub(crate) fn map_tasks(&self) -> &[MapTask] {
        &self.map_tasks
    }

    #[cfg(test)]
    pub(crate) fn reduce_tasks(&self) -> &[ReduceTask] {
        &self.reduce_tasks
    }

    /// Intermediate partitions collected so far for a reduce bucket.
    pub fn reduce_inputs(&self, bucket: usize) -> Option<&Vec<String>> {
        self.reduce_tasks.get(bucket).map(ReduceTask::inputs)
    }
}

fn log_dispatch(kind: TaskKind, task_id: usize, reassigned: bool) {
    if reassigned {
        info!(task_id, %kind, "Executor presumed dead, reassigning task");
    } else {
        info!(task_id, %kind, "Assigned task");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STALE: Duration = Duration::from_secs(10);

    fn table(inputs: &[&str], n_reduce: usize) -> TaskTable {
        let inputs = inputs.iter().map(|s| s.to_string()).collect();
        TaskTable::new(inputs, SchedulerConfig::new(n_reduce)).unwrap()
    }

    fn map_report(task_id: usize, outputs: &[(usize, &str)]) -> Report {
        Report::Map {
            task_id,
            outputs: outputs
                .iter()
                .map(|(bucket, path)| (*bucket, path.to_string()))
                .collect(),
        }
    }

    fn remaining_matches_records(table: &TaskTable) -> bool {
        let maps = table
            .map_tasks()
            .iter()
            .filter(|t| !t.lease().is_done())
            .count();
        let reduces = table
            .reduce_tasks()
            .iter()
            .filter(|t| !t.lease().is_done())
            .count();
        maps == table.map_remaining() && reduces == table.reduce_remaining()
    }

    #[test]
    fn rejects_empty_input() {
        let err = TaskTable::new(vec![], SchedulerConfig::new(3)).unwrap_err();
        assert_eq!(err, SchedulerError::EmptyInput);
    }

    #[test]
    fn rejects_zero_reduce_tasks() {
        let err = TaskTable::new(vec!["a".into()], SchedulerConfig::new(0)).unwrap_err();
        assert_eq!(err, SchedulerError::NoReduceTasks);
    }

    #[test]
    fn new_table_is_mapping_with_full_counters() {
        let table = table(&["a", "b", "c"], 2);
        assert_eq!(table.phase(), Phase::Mapping);
        assert_eq!(table.map_remaining(), 3);
        assert_eq!(table.reduce_remaining(), 2);
        assert!(!table.is_complete());
        assert!(table
            .map_tasks()
            .iter()
            .all(|t| t.lease().assigned_at().is_none()));
    }

    #[test]
    fn two_inputs_one_reducer_end_to_end() {
        let mut table = table(&["pg-0.txt", "pg-1.txt"], 1);
        let now = Instant::now();

        assert_eq!(
            table.handle(Report::None, now).unwrap(),
            Assignment::Map {
                task_id: 0,
                input: "pg-0.txt".into(),
                n_reduce: 1
            }
        );
        assert_eq!(
            table.handle(Report::None, now).unwrap(),
            Assignment::Map {
                task_id: 1,
                input: "pg-1.txt".into(),
                n_reduce: 1
            }
        );

        // Both maps are in flight; the next caller waits.
        assert_eq!(table.handle(Report::None, now).unwrap(), Assignment::Wait);

        let reply = table.handle(map_report(0, &[(0, "mr-0-0")]), now).unwrap();
        assert_eq!(reply, Assignment::Wait);

        let reply = table.handle(map_report(1, &[(0, "mr-1-0")]), now).unwrap();
        assert_eq!(
            reply,
            Assignment::Reduce {
                task_id: 0,
                inputs: vec!["mr-0-0".into(), "mr-1-0".into()]
            }
        );
        assert_eq!(table.phase(), Phase::Reducing);

        let reply = table.handle(Report::Reduce { task_id: 0 }, now).unwrap();
        assert_eq!(reply, Assignment::Exit);
        assert!(table.is_complete());
        assert_eq!(table.phase(), Phase::Done);
        assert_eq!(table.handle(Report::None, now).unwrap(), Assignment::Exit);
    }

    #[test]
    fn duplicate_map_report_is_ignored() {
        let mut table = table(&["a", "b"], 2);
        let now = Instant::now();
        table.handle(Report::None, now).unwrap();

        table
            .handle(map_report(0, &[(0, "mr-0-0"), (1, "mr-0-1")]), now)
            .unwrap();
        table
            .handle(map_report(0, &[(0, "mr-0-0"), (1, "mr-0-1")]), now)
            .unwrap();

        assert_eq!(table.map_remaining(), 1);
        assert_eq!(table.reduce_inputs(0).unwrap(), &vec!["mr-0-0".to_string()]);
        assert_eq!(table.reduce_inputs(1).unwrap(), &vec!["mr-0-1".to_string()]);
        assert!(remaining_matches_records(&table));
    }

    #[test]
    fn duplicate_reduce_report_is_ignored() {
        let mut table = table(&["a"], 2);
        let now = Instant::now();
        table.handle(map_report(0, &[]), now).unwrap();

        table.handle(Report::Reduce { task_id: 1 }, now).unwrap();
        table.handle(Report::Reduce { task_id: 1 }, now).unwrap();
        assert_eq!(table.reduce_remaining(), 1);
        assert!(remaining_matches_records(&table));
    }

    #[test]
    fn empty_references_are_not_collected() {
        let mut table = table(&["a"], 3);
        let now = Instant::now();
        table
            .handle(map_report(0, &[(0, ""), (2, "mr-0-2")]), now)
            .unwrap();

        assert!(table.reduce_inputs(0).unwrap().is_empty());
        assert!(table.reduce_inputs(1).unwrap().is_empty());
        assert_eq!(table.reduce_inputs(2).unwrap(), &vec!["mr-0-2".to_string()]);
    }

    #[test]
    fn reduce_is_never_assigned_while_maps_are_pending() {
        let mut table = table(&["a", "b"], 2);
        let now = Instant::now();
        table.handle(Report::None, now).unwrap();
        table.handle(Report::None, now).unwrap();

        let reply = table.handle(map_report(0, &[(0, "x")]), now).unwrap();
        assert_eq!(reply, Assignment::Wait);
        assert_eq!(table.phase(), Phase::Mapping);
        assert!(table
            .reduce_tasks()
            .iter()
            .all(|t| t.lease().assigned_at().is_none()));
    }

    #[test]
    fn unreported_map_is_reassigned_only_after_threshold() {
        let mut table = table(&["a"], 1);
        let t0 = Instant::now();

        assert!(matches!(
            table.handle(Report::None, t0).unwrap(),
            Assignment::Map { task_id: 0, .. }
        ));
        assert_eq!(
            table.handle(Report::None, t0 + Duration::from_secs(9)).unwrap(),
            Assignment::Wait
        );

        let later = t0 + STALE;
        assert!(matches!(
            table.handle(Report::None, later).unwrap(),
            Assignment::Map { task_id: 0, .. }
        ));
        assert_eq!(table.map_tasks()[0].lease().assigned_at(), Some(later));

        // The fresh stamp holds off a third dispatch.
        assert_eq!(
            table.handle(Report::None, later + Duration::from_secs(1)).unwrap(),
            Assignment::Wait
        );
    }

    #[test]
    fn late_report_from_presumed_dead_executor_is_absorbed() {
        let mut table = table(&["a"], 1);
        let t0 = Instant::now();
        table.handle(Report::None, t0).unwrap();
        table.handle(Report::None, t0 + STALE).unwrap();

        // Replacement finishes first, then the original straggles in.
        table
            .handle(map_report(0, &[(0, "mr-0-0-replacement")]), t0 + STALE)
            .unwrap();
        table
            .handle(map_report(0, &[(0, "mr-0-0-original")]), t0 + STALE)
            .unwrap();

        assert_eq!(
            table.reduce_inputs(0).unwrap(),
            &vec!["mr-0-0-replacement".to_string()]
        );
        assert_eq!(table.map_remaining(), 0);
    }

    #[test]
    fn stale_reduce_task_is_reassigned() {
        let mut table = table(&["a"], 2);
        let t0 = Instant::now();

        let first = table
            .handle(map_report(0, &[(0, "x"), (1, "y")]), t0)
            .unwrap();
        assert_eq!(
            first,
            Assignment::Reduce {
                task_id: 0,
                inputs: vec!["x".to_string()]
            }
        );
        let second = table.handle(Report::Reduce { task_id: 0 }, t0).unwrap();
        assert!(matches!(second, Assignment::Reduce { task_id: 1, .. }));
        assert_eq!(table.reduce_remaining(), 1);

        // Reduce 1 is in flight and never reported.
        assert_eq!(table.handle(Report::None, t0).unwrap(), Assignment::Wait);

        let reply = table.handle(Report::None, t0 + STALE).unwrap();
        assert_eq!(
            reply,
            Assignment::Reduce {
                task_id: 1,
                inputs: vec!["y".to_string()]
            }
        );
    }

    #[test]
    fn out_of_range_ids_are_rejected_without_mutation() {
        let mut table = table(&["a", "b"], 2);
        let now = Instant::now();

        let err = table.handle(map_report(2, &[]), now).unwrap_err();
        assert_eq!(
            err,
            SchedulerError::InvalidTaskId {
                kind: TaskKind::Map,
                task_id: 2,
                count: 2
            }
        );

        let err = table.handle(map_report(0, &[(0, "ok"), (5, "bad")]), now).unwrap_err();
        assert_eq!(err, SchedulerError::InvalidBucket { bucket: 5, n_reduce: 2 });
        assert_eq!(table.map_remaining(), 2);
        assert!(table.reduce_inputs(0).unwrap().is_empty());

        let err = table.handle(Report::Reduce { task_id: 9 }, now).unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::InvalidTaskId {
                kind: TaskKind::Reduce,
                ..
            }
        ));

        // Rejected requests do not dispatch anything either.
        assert!(table
            .map_tasks()
            .iter()
            .all(|t| t.lease().assigned_at().is_none()));
    }
}
