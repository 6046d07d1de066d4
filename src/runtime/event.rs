//! Completion handles for scheduled work
//!
//! An [`Event`] is the host's view of one task submitted to a
//! [`Queue`](super::Queue). Events are partially ordered by the dependency
//! edges given at submission time; the only way to observe a task's outcome
//! is through its event.

use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;

type Callback = Box<dyn FnOnce() + Send>;

/// Handle to a pending or finished asynchronous operation
///
/// Cloning an event is cheap and every clone observes the same completion.
/// Failures raised while the task runs (for example a matrix that is not
/// positive definite) are stored in the event and returned by [`Event::wait`].
#[derive(Clone)]
pub struct Event {
    inner: Arc<EventInner>,
}

struct EventInner {
    state: Mutex<State>,
    done: Condvar,
}

enum State {
    Pending(Vec<Callback>),
    Complete(Result<()>),
}

impl Event {
    pub(crate) fn pending() -> Self {
        Self {
            inner: Arc::new(EventInner {
                state: Mutex::new(State::Pending(Vec::new())),
                done: Condvar::new(),
            }),
        }
    }

    /// An event that is already complete with success
    pub fn completed() -> Self {
        Self::finished(Ok(()))
    }

    /// An event that is already complete with `result`
    pub fn finished(result: Result<()>) -> Self {
        Self {
            inner: Arc::new(EventInner {
                state: Mutex::new(State::Complete(result)),
                done: Condvar::new(),
            }),
        }
    }

    /// Returns true once the task has finished, successfully or not
    pub fn is_complete(&self) -> bool {
        matches!(*self.inner.state.lock(), State::Complete(_))
    }

    /// Outcome of the task, or `None` while it is still pending
    pub fn status(&self) -> Option<Result<()>> {
        match &*self.inner.state.lock() {
            State::Pending(_) => None,
            State::Complete(result) => Some(result.clone()),
        }
    }

    /// Block the calling thread until the task finishes and return its outcome
    pub fn wait(&self) -> Result<()> {
        let mut state = self.inner.state.lock();
        loop {
            if let State::Complete(result) = &*state {
                return result.clone();
            }
            self.inner.done.wait(&mut state);
        }
    }

    /// Wait for every event; returns the first failure in slice order
    pub fn wait_all(events: &[Event]) -> Result<()> {
        let mut first_err = None;
        for event in events {
            if let Err(e) = event.wait() {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Returns true if both handles refer to the same operation
    pub fn same_as(&self, other: &Event) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Run `callback` once the event completes
    ///
    /// Runs immediately on the calling thread if the event is already
    /// complete, otherwise on the thread that completes it.
    pub(crate) fn on_complete(&self, callback: impl FnOnce() + Send + 'static) {
        let mut state = self.inner.state.lock();
        match &mut *state {
            State::Pending(callbacks) => callbacks.push(Box::new(callback)),
            State::Complete(_) => {
                drop(state);
                callback();
            }
        }
    }

    /// Mark the event complete and run the registered callbacks
    ///
    /// Callbacks run after the lock is released so that they may inspect
    /// this event or complete others.
    pub(crate) fn signal(&self, result: Result<()>) {
        let callbacks = {
            let mut state = self.inner.state.lock();
            match std::mem::replace(&mut *state, State::Complete(result)) {
                State::Pending(callbacks) => callbacks,
                State::Complete(previous) => {
                    *state = State::Complete(previous);
                    log::error!("event signalled twice; keeping first outcome");
                    return;
                }
            }
        };
        self.inner.done.notify_all();
        for callback in callbacks {
            callback();
        }
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::completed()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match &*self.inner.state.lock() {
            State::Pending(_) => "pending",
            State::Complete(Ok(())) => "complete",
            State::Complete(Err(_)) => "failed",
        };
        f.debug_struct("Event").field("status", &status).finish()
    }
}

/// Turn a caught panic payload into an error
pub(crate) fn panic_to_error(payload: Box<dyn std::any::Any + Send>) -> Error {
    let msg = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "kernel panicked".to_string());
    Error::Internal(msg)
}
