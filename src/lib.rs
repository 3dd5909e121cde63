//! pacer - a tick-driven cooperative task scheduler
//!
//! A registry of suspended computations resumed one step per external
//! tick. A task may suspend on a time delay, on another task (structural
//! nesting, with same-tick collapse when the nested task finishes), or on
//! nothing at all. Handles give callers identity-based stop, query, and
//! join over tasks that are not themselves addressable.
//!
//! Design principles:
//! - Cooperative, not preemptive: a task suspends only where its body says
//! - Tick-based: the caller owns the loop and supplies elapsed time;
//!   no internal clock, no knowledge of wall time or frame rate
//! - Sequential: slots advance strictly in scheduling order, one thread
//! - Lazy cancellation: stopping marks a slot at once, sweeping waits for
//!   the next tick
//!
//! ```
//! use pacer::{Scheduler, Task};
//!
//! let sched = Scheduler::new();
//! let handle = sched.schedule(Task::new(|ctx| async move {
//!     ctx.delay(1.0).await;
//!     // ... do the work ...
//! }));
//!
//! sched.advance(0.5); // the body starts, then waits 1.0
//! sched.advance(0.6); // not yet: only 0.6 of the wait has passed
//! sched.advance(0.5); // wait satisfied: the body runs to completion
//! assert!(!handle.is_running());
//! ```

pub mod handle;
pub mod scheduler;
pub mod task;

pub use handle::Handle;
pub use scheduler::Scheduler;
pub use task::{Suspend, Task, TaskContext, TaskId, YieldPoint};
