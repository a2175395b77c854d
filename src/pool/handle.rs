//! Awaitable job results.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::identifiers::JobId;

use super::queue::Completion;

/// Resolves to the result of one job submitted with
/// [`WorkerPool::run`](super::WorkerPool::run).
///
/// Resolves to [`Error::JobAbandoned`] if the pool is destroyed before the
/// job completes.
#[derive(Debug)]
pub struct JobHandle {
    job: JobId,
    receiver: oneshot::Receiver<Result<Value>>,
}

impl JobHandle {
    /// Creates a handle for `job` and the completion that resolves it.
    pub(crate) fn channel(job: JobId) -> (Self, Completion) {
        let (tx, receiver) = oneshot::channel();
        let completion: Completion = Box::new(move |result| {
            let _ = tx.send(result);
        });
        (Self { job, receiver }, completion)
    }

    /// Returns the job this handle resolves.
    #[inline]
    #[must_use]
    pub fn id(&self) -> JobId {
        self.job
    }
}

impl Future for JobHandle {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let job = self.job;
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(Error::job_abandoned(job))),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[tokio::test]
    async fn test_resolves_with_result() {
        let (handle, complete) = JobHandle::channel(JobId::from_raw(7));
        assert_eq!(handle.id(), JobId::from_raw(7));

        complete(Ok(json!({"x": 1})));
        assert_eq!(handle.await.unwrap(), json!({"x": 1}));
    }

    #[tokio::test]
    async fn test_dropped_completion_abandons() {
        let (handle, complete) = JobHandle::channel(JobId::from_raw(8));
        drop(complete);

        let err = handle.await.unwrap_err();
        assert!(matches!(err, Error::JobAbandoned { .. }));
    }
}
