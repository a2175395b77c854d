//! Point-in-time pool status.

use serde::Serialize;

/// Snapshot of scheduler state, taken under the scheduler lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    /// Units currently owned by the pool. Zero after destroy.
    pub units: usize,
    /// Units whose handshake completed.
    pub ready_units: usize,
    /// Units with a job in flight.
    pub running_units: usize,
    /// Units eligible for dispatch right now.
    pub idle_units: usize,
    /// Units that refused a payload and are never dispatched to again.
    pub faulted_units: usize,
    /// Jobs waiting in the queue.
    pub queued_jobs: usize,
    /// Jobs accepted by `submit` or `run`.
    pub submitted: u64,
    /// Jobs handed to a unit.
    pub dispatched: u64,
    /// Jobs whose reply was routed to their callback.
    pub completed: u64,
    /// Whether `destroy` has run.
    pub destroyed: bool,
}

impl PoolStatus {
    /// Fraction of units with a job in flight.
    pub fn utilization(&self) -> f64 {
        if self.units == 0 {
            return 0.0;
        }
        self.running_units as f64 / self.units as f64
    }

    /// Returns `true` when nothing is queued or in flight.
    pub fn is_drained(&self) -> bool {
        self.queued_jobs == 0 && self.running_units == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utilization() {
        let status = PoolStatus {
            units: 4,
            running_units: 1,
            ..Default::default()
        };
        assert!((status.utilization() - 0.25).abs() < f64::EPSILON);
        assert_eq!(PoolStatus::default().utilization(), 0.0);
    }

    #[test]
    fn test_is_drained() {
        assert!(PoolStatus::default().is_drained());
        let busy = PoolStatus {
            queued_jobs: 1,
            ..Default::default()
        };
        assert!(!busy.is_drained());
    }
}
