//! Deterministic event loop for studying callback ordering.
//!
//! This crate models the deferred-execution guarantees of a single-threaded
//! runtime:
//! - Microtasks (next-tick work) that drain before anything else
//! - One-shot and recurring timers on a virtual clock
//! - I/O completions delivered after due timers
//! - Immediates that run after the I/O phase
//!
//! # Overview
//!
//! - [`Scheduler`] - The event loop; owns every queue and the clock
//! - [`TaskHandle`] - Returned by every scheduling call, used to cancel or (un)ref
//! - [`Trace`] - Record of fired callbacks in execution order
//! - [`EventEmitter`] - Synchronous named events, with a microtask-deferred emit
//!
//! # Examples
//!
//! ```
//! use event_loop::Scheduler;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let fired = Rc::new(RefCell::new(Vec::new()));
//! let mut scheduler = Scheduler::new();
//!
//! let f = fired.clone();
//! scheduler.set_timeout(move |_| f.borrow_mut().push("T10"), 10).unwrap();
//! let f = fired.clone();
//! scheduler.set_timeout(move |_| f.borrow_mut().push("T0"), 0).unwrap();
//!
//! scheduler.run_until_idle();
//! assert_eq!(*fired.borrow(), vec!["T0", "T10"]);
//! assert_eq!(scheduler.now(), 10);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod emitter;
pub mod error;
pub mod io;
pub mod scheduler;
pub mod task_queue;
pub mod timers;
pub mod trace;

// Re-export main types at crate root
pub use config::LoopConfig;
pub use emitter::{EventEmitter, ListenerId};
pub use error::{SchedulerError, SchedulerResult};
pub use scheduler::{RunOutcome, RunSummary, Scheduler};
pub use task_queue::{QueueKind, Task, TaskHandle, TaskId, TaskQueue};
pub use timers::{TimerGroup, TimerList};
pub use trace::{Firing, Trace};
