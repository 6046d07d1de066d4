//! Out-of-order execution queue
//!
//! Tasks are launched on a worker pool as soon as every event they depend
//! on has completed. Dependency edges only order execution: a failed
//! prerequisite does not fail or cancel its dependents.

use super::device::{Context, Device};
use super::event::{Event, panic_to_error};
use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Environment variable overriding the worker count
pub const ENV_NUM_THREADS: &str = "KDISPATCH_NUM_THREADS";
/// Environment variable requesting in-order queues
pub const ENV_IN_ORDER: &str = "KDISPATCH_IN_ORDER";

/// Queue construction options
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueueOptions {
    num_threads: Option<usize>,
    thread_name_prefix: Option<String>,
    in_order: bool,
}

impl QueueOptions {
    /// Default options: one worker per logical CPU, out-of-order
    pub fn new() -> Self {
        Self::default()
    }

    /// Options read from `KDISPATCH_NUM_THREADS` and `KDISPATCH_IN_ORDER`
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::var(ENV_NUM_THREADS).ok().as_deref(),
            std::env::var(ENV_IN_ORDER).ok().as_deref(),
        )
    }

    fn from_vars(num_threads: Option<&str>, in_order: Option<&str>) -> Self {
        let mut options = Self::default();
        if let Some(raw) = num_threads {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => options.num_threads = Some(n),
                _ => log::warn!("ignoring invalid {ENV_NUM_THREADS}={raw:?}"),
            }
        }
        if let Some(raw) = in_order {
            match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => options.in_order = true,
                "0" | "false" | "no" | "off" | "" => {}
                _ => log::warn!("ignoring invalid {ENV_IN_ORDER}={raw:?}"),
            }
        }
        options
    }

    /// Set the number of worker threads
    pub fn num_threads(mut self, n: usize) -> Self {
        self.num_threads = Some(n);
        self
    }

    /// Set the worker thread name prefix
    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = Some(prefix.into());
        self
    }

    /// Make every task implicitly depend on the previously submitted one
    pub fn in_order(mut self, in_order: bool) -> Self {
        self.in_order = in_order;
        self
    }
}

static NEXT_QUEUE_ID: AtomicU64 = AtomicU64::new(1);

/// A device queue accepting dependency-ordered tasks
///
/// Cloning a queue is cheap; clones share the worker pool and statistics.
#[derive(Clone)]
pub struct Queue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    id: u64,
    context: Context,
    device: Device,
    pool: rayon::ThreadPool,
    in_order: bool,
    last: Mutex<Option<Event>>,
    submitted: AtomicU64,
    outstanding: Mutex<usize>,
    idle: Condvar,
}

impl Queue {
    /// Create a queue on `device` within `context`
    pub fn new(context: &Context, device: &Device, options: QueueOptions) -> Result<Self> {
        if !context.contains(device) {
            return Err(Error::invalid_argument(
                "device",
                format!("{device} is not part of context {}", context.id()),
            ));
        }

        let id = NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed);
        let prefix = options
            .thread_name_prefix
            .clone()
            .unwrap_or_else(|| "kdispatch".to_string());
        let mut builder = rayon::ThreadPoolBuilder::new()
            .thread_name(move |i| format!("{prefix}-q{id}-{i}"));
        if let Some(n) = options.num_threads {
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|e| Error::Internal(format!("failed to start queue workers: {e}")))?;

        log::debug!(
            "queue {id} created on {device} (context {}, {} workers, in_order={})",
            context.id(),
            pool.current_num_threads(),
            options.in_order
        );

        Ok(Self {
            inner: Arc::new(QueueInner {
                id,
                context: context.clone(),
                device: device.clone(),
                pool,
                in_order: options.in_order,
                last: Mutex::new(None),
                submitted: AtomicU64::new(0),
                outstanding: Mutex::new(0),
                idle: Condvar::new(),
            }),
        })
    }

    /// Queue on the host device in the process-wide default context
    pub fn host(options: QueueOptions) -> Result<Self> {
        Self::new(&Context::default_host(), &Device::host(), options)
    }

    /// Unique identifier for this queue
    #[inline]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Context this queue belongs to
    pub fn context(&self) -> &Context {
        &self.inner.context
    }

    /// Device this queue executes on
    pub fn device(&self) -> &Device {
        &self.inner.device
    }

    /// Whether tasks are serialised in submission order
    pub fn is_in_order(&self) -> bool {
        self.inner.in_order
    }

    /// Number of worker threads
    pub fn num_threads(&self) -> usize {
        self.inner.pool.current_num_threads()
    }

    /// Total number of tasks submitted over the queue's lifetime
    pub fn submitted_count(&self) -> u64 {
        self.inner.submitted.load(Ordering::SeqCst)
    }

    /// Block until every submitted task has finished
    pub fn wait(&self) {
        let mut outstanding = self.inner.outstanding.lock();
        while *outstanding > 0 {
            self.inner.idle.wait(&mut outstanding);
        }
    }

    /// Schedule `task` to run after every event in `depends`
    ///
    /// Returns immediately. The returned event completes with the task's
    /// result; a panicking task completes it with [`Error::Internal`].
    pub fn submit<F>(&self, depends: &[Event], task: F) -> Event
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let event = Event::pending();

        let mut waits: Vec<Event> = depends.iter().filter(|e| !e.is_complete()).cloned().collect();
        if self.inner.in_order {
            let mut last = self.inner.last.lock();
            if let Some(prev) = last.replace(event.clone()) {
                if !prev.is_complete() {
                    waits.push(prev);
                }
            }
        }

        let seq = self.inner.submitted.fetch_add(1, Ordering::SeqCst);
        *self.inner.outstanding.lock() += 1;
        log::trace!(
            "queue {}: task {seq} submitted with {} pending dependencies",
            self.inner.id,
            waits.len()
        );

        let launch = Arc::new(Launch {
            remaining: AtomicUsize::new(waits.len() + 1),
            job: Mutex::new(Some(Box::new(task))),
            queue: Arc::clone(&self.inner),
            event: event.clone(),
        });
        for dep in &waits {
            let launch = Arc::clone(&launch);
            dep.on_complete(move || launch.arrive());
        }
        launch.arrive();

        event
    }
}

type Job = Box<dyn FnOnce() -> Result<()> + Send>;

/// Launch countdown: one arrival per dependency plus one for the submitter
struct Launch {
    remaining: AtomicUsize,
    job: Mutex<Option<Job>>,
    queue: Arc<QueueInner>,
    event: Event,
}

impl Launch {
    fn arrive(&self) {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        let Some(job) = self.job.lock().take() else {
            return;
        };
        let event = self.event.clone();
        let queue = Arc::clone(&self.queue);
        self.queue.pool.spawn(move || {
            let result = catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|p| Err(panic_to_error(p)));
            if let Err(e) = &result {
                log::trace!("queue {}: task finished with error: {e}", queue.id);
            }
            event.signal(result);
            queue.task_done();
        });
    }
}

impl QueueInner {
    fn task_done(&self) {
        let mut outstanding = self.outstanding.lock();
        *outstanding = outstanding.saturating_sub(1);
        if *outstanding == 0 {
            self.idle.notify_all();
        }
    }
}

impl PartialEq for Queue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("id", &self.inner.id)
            .field("device", &self.inner.device)
            .field("context", &self.inner.context.id())
            .field("in_order", &self.inner.in_order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn queue(threads: usize) -> Queue {
        Queue::host(QueueOptions::new().num_threads(threads)).unwrap()
    }

    #[test]
    fn test_submit_runs_task() {
        let q = queue(2);
        let (tx, rx) = mpsc::channel();
        let e = q.submit(&[], move || {
            tx.send(7).unwrap();
            Ok(())
        });
        assert_eq!(e.wait(), Ok(()));
        assert_eq!(rx.recv().unwrap(), 7);
        assert_eq!(q.submitted_count(), 1);
    }

    #[test]
    fn test_task_error_and_panic() {
        let q = queue(1);
        let failed = q.submit(&[], || Err(Error::MemoryOverlap));
        assert_eq!(failed.wait(), Err(Error::MemoryOverlap));

        let panicked = q.submit(&[], || panic!("boom"));
        assert_eq!(panicked.wait(), Err(Error::Internal("boom".to_string())));

        // The pool survives the panic
        assert_eq!(q.submit(&[], || Ok(())).wait(), Ok(()));
    }

    #[test]
    fn test_failed_dependency_still_releases_dependent() {
        let q = queue(2);
        let failed = q.submit(&[], || Err(Error::NotWritable));
        let after = q.submit(&[failed], || Ok(()));
        assert_eq!(after.wait(), Ok(()));
    }

    #[test]
    fn test_in_order_queue_serialises() {
        let q = Queue::host(QueueOptions::new().num_threads(4).in_order(true)).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..16 {
            let log = log.clone();
            q.submit(&[], move || {
                log.lock().push(i);
                Ok(())
            });
        }
        q.wait();
        assert_eq!(*log.lock(), (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn test_options_from_vars() {
        let o = QueueOptions::from_vars(Some("3"), Some("true"));
        assert_eq!(o, QueueOptions::new().num_threads(3).in_order(true));

        let o = QueueOptions::from_vars(Some("zero"), Some("maybe"));
        assert_eq!(o, QueueOptions::new());

        assert_eq!(QueueOptions::from_vars(Some("0"), None), QueueOptions::new());
    }

    #[test]
    fn test_device_must_belong_to_context() {
        let ctx = Context::new(vec![Device::host()]);
        let err = Queue::new(&ctx, &Device::new(5, "gpu"), QueueOptions::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { arg: "device", .. }));
    }
}
