//! Host-side bookkeeping of submitted work
//!
//! The core never retains events. Host layers that issue many calls on a
//! queue record the returned `(guard, kernel)` pairs here to chain later
//! calls after earlier ones and to drain everything before shutdown.

use super::Event;
use crate::error::{Error, Result};

/// Caller-owned record of outstanding `(guard, kernel)` pairs
#[derive(Debug, Default)]
pub struct OrderManager {
    host_tasks: Vec<Event>,
    submitted: Vec<Event>,
    // First failure among kernels already pruned, reported by `wait`
    first_error: Option<Error>,
}

impl OrderManager {
    /// Empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the handles returned by one scheduling call
    pub fn add_event_pair(&mut self, guard: Event, kernel: Event) {
        self.prune();
        self.host_tasks.push(guard);
        self.submitted.push(kernel);
    }

    /// Kernel handles that have not completed yet
    ///
    /// Pass these as `depends` to order the next call after every earlier one.
    pub fn submitted_events(&mut self) -> Vec<Event> {
        self.prune();
        self.submitted.clone()
    }

    /// Guard handles that have not completed yet
    pub fn host_task_events(&mut self) -> Vec<Event> {
        self.prune();
        self.host_tasks.clone()
    }

    /// Number of recorded handles still pending
    pub fn pending(&mut self) -> usize {
        self.prune();
        self.host_tasks.len() + self.submitted.len()
    }

    /// Block until every recorded handle completes
    ///
    /// All handles are waited on even after a failure; the first kernel
    /// failure since the previous `wait` is returned, including failures of
    /// kernels that finished before later pairs were recorded.
    pub fn wait(&mut self) -> Result<()> {
        let kernels = std::mem::take(&mut self.submitted);
        let guards = std::mem::take(&mut self.host_tasks);
        let kernel_result = Event::wait_all(&kernels);
        let guard_result = Event::wait_all(&guards);
        if let Some(err) = self.first_error.take() {
            return Err(err);
        }
        guard_result?;
        kernel_result
    }

    fn prune(&mut self) {
        self.host_tasks.retain(|e| !e.is_complete());
        let first_error = &mut self.first_error;
        self.submitted.retain(|e| match e.status() {
            None => true,
            Some(Ok(())) => false,
            Some(Err(err)) => {
                first_error.get_or_insert(err);
                false
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::runtime::{Queue, QueueOptions};
    use std::sync::mpsc;

    #[test]
    fn test_prunes_completed_pairs() {
        let mut om = OrderManager::new();
        om.add_event_pair(Event::completed(), Event::completed());
        assert!(om.submitted_events().is_empty());
        assert_eq!(om.pending(), 0);
    }

    #[test]
    fn test_tracks_pending_and_waits() {
        let q = Queue::host(QueueOptions::new().num_threads(2)).unwrap();
        let (tx, rx) = mpsc::channel::<()>();
        let kernel = q.submit(&[], move || {
            rx.recv().ok();
            Err(Error::NotPositiveDefinite { minor: 1 })
        });
        let guard = q.submit(&[kernel.clone()], || Ok(()));

        let mut om = OrderManager::new();
        om.add_event_pair(guard, kernel.clone());
        let pending = om.submitted_events();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].same_as(&kernel));

        tx.send(()).unwrap();
        assert_eq!(om.wait(), Err(Error::NotPositiveDefinite { minor: 1 }));
        assert_eq!(om.pending(), 0);
    }

    #[test]
    fn test_keeps_failure_of_pruned_kernel() {
        let mut om = OrderManager::new();
        let failed = Event::finished(Err(Error::NotPositiveDefinite { minor: 2 }));
        om.add_event_pair(Event::completed(), failed);

        // Recording a later pair prunes the finished failure
        om.add_event_pair(Event::completed(), Event::completed());
        assert!(om.submitted_events().is_empty());

        assert_eq!(om.wait(), Err(Error::NotPositiveDefinite { minor: 2 }));
        // Reported once
        assert_eq!(om.wait(), Ok(()));
    }
}
