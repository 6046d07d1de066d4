//! Device queue model
//!
//! ```text
//! Context (memory space)
//! └── Device
//!     └── Queue (worker pool, dependency-driven launch)
//!         └── Event (completion handle, carries async failures)
//! ```
//!
//! Scheduling calls never block. Work is ordered only by the events passed
//! as dependencies, and each call hands back a `(guard, kernel)` pair built
//! by [`compose`].

pub mod compose;
mod device;
mod event;
pub mod helpers;
mod order;
mod queue;

pub use compose::{chain, keep_args_alive};
pub use device::{Context, Device};
pub use event::Event;
pub use helpers::queues_are_compatible;
pub use order::OrderManager;
pub use queue::{ENV_IN_ORDER, ENV_NUM_THREADS, Queue, QueueOptions};
