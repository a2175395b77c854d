//! FIFO job queue.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::fmt;

use serde_json::Value;

use crate::error::Result;
use crate::identifiers::JobId;

// ============================================================================
// Types
// ============================================================================

/// Completion callback of one job. Invoked at most once.
pub type Completion = Box<dyn FnOnce(Result<Value>) + Send + 'static>;

// ============================================================================
// Job
// ============================================================================

/// A submitted unit of work.
pub struct Job {
    /// Job number.
    pub id: JobId,
    /// Payload delivered to the unit.
    pub payload: Value,
    /// Receives the unit's reply.
    pub on_complete: Completion,
}

impl Job {
    /// Creates a job with a fresh ID.
    pub fn new(payload: Value, on_complete: Completion) -> Self {
        Self {
            id: JobId::next(),
            payload,
            on_complete,
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// JobQueue
// ============================================================================

/// Unbounded, insertion-ordered queue of pending jobs.
#[derive(Debug, Default)]
pub struct JobQueue {
    jobs: VecDeque<Job>,
}

impl JobQueue {
    /// Creates an empty queue.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a job at the tail.
    #[inline]
    pub fn push(&mut self, job: Job) {
        self.jobs.push_back(job);
    }

    /// Removes the head job.
    #[inline]
    pub fn pop(&mut self) -> Option<Job> {
        self.jobs.pop_front()
    }

    /// Returns the number of queued jobs.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Returns `true` if nothing is queued.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Removes every queued job, head first.
    pub fn drain(&mut self) -> Vec<Job> {
        self.jobs.drain(..).collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
