//! In-process FIFO of worker jobs.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use casewise_core::WorkerJob;

/// FIFO job queue owned by one worker instance.
///
/// Jobs live here from `push` until `pop` hands them to the worker, which
/// processes and then drops them.
#[derive(Debug, Default)]
pub struct JobQueue {
    jobs: Mutex<VecDeque<WorkerJob>>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn jobs(&self) -> MutexGuard<'_, VecDeque<WorkerJob>> {
        self.jobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, job: WorkerJob) {
        self.jobs().push_back(job);
    }

    /// Oldest queued job, if any.
    pub fn pop(&self) -> Option<WorkerJob> {
        self.jobs().pop_front()
    }

    pub fn len(&self) -> usize {
        self.jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casewise_core::JobKind;
    use serde_json::json;

    #[test]
    fn test_queue_is_fifo() {
        let queue = JobQueue::new();
        assert!(queue.is_empty());

        let first = WorkerJob::new(JobKind::ProcessDocument, json!({"n": 1}));
        let second = WorkerJob::new(JobKind::ProcessDocument, json!({"n": 2}));
        let first_id = first.id;
        queue.push(first);
        queue.push(second);
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.pop().map(|j| j.id), Some(first_id));
        assert_eq!(queue.pop().unwrap().payload["n"], 2);
        assert!(queue.pop().is_none());
    }
}
