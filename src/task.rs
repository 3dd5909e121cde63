//! Task abstraction and the suspension protocol
//!
//! A Task is a resumable computation: an ordinary future that the scheduler
//! polls one step per eligible tick. Each time it is resumed it either
//! completes or suspends, and a suspension carries exactly one value:
//! - a delay (wait that long before the next resumption),
//! - a nested task (resume that one first, then continue here), or
//! - nothing (resume again next tick).
//!
//! The value travels out of the future through a shared cell written by the
//! await-able primitives on [`TaskContext`]. A future that returns `Pending`
//! without writing the cell is treated as a plain yield.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures::task::noop_waker;

/// Unique identifier for a scheduled task
///
/// Issued by the scheduler; never reused. Id 0 is reserved for unbound
/// handles and is never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TaskId(pub u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Task({})", self.0)
    }
}

/// What a task produced when it last suspended
pub enum Suspend {
    /// Wait this long (in the tick source's time unit) before resuming
    Delay(f64),
    /// Resume this task to completion first, then resume the suspender
    Nested(Task),
    /// No wait: eligible again on the next tick
    Yield,
}

/// A boxed task body
pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + 'static>>;

/// Shared cell the yield primitives write their suspension value into
type SuspendCell = Rc<RefCell<Option<Suspend>>>;

/// Outcome of resuming a task by one step
pub(crate) enum Flow {
    /// Suspended again, with the value it produced
    Suspended(Suspend),
    /// Ran to completion
    Complete,
}

/// A resumable computation managed by the scheduler
///
/// Built from an async body that receives a [`TaskContext`] for producing
/// suspension values. The body runs only when the scheduler resumes it;
/// between resumptions it is just suspended state.
pub struct Task {
    name: Option<&'static str>,
    future: BoxFuture,
    cell: SuspendCell,
}

impl Task {
    /// Create a task from an async body
    pub fn new<F, Fut>(body: F) -> Self
    where
        F: FnOnce(TaskContext) -> Fut,
        Fut: Future<Output = ()> + 'static,
    {
        Self::build(None, body)
    }

    /// Create a task with a debug name (surfaces in trace output)
    pub fn named<F, Fut>(name: &'static str, body: F) -> Self
    where
        F: FnOnce(TaskContext) -> Fut,
        Fut: Future<Output = ()> + 'static,
    {
        Self::build(Some(name), body)
    }

    fn build<F, Fut>(name: Option<&'static str>, body: F) -> Self
    where
        F: FnOnce(TaskContext) -> Fut,
        Fut: Future<Output = ()> + 'static,
    {
        let cell: SuspendCell = Rc::new(RefCell::new(None));
        let ctx = TaskContext { cell: cell.clone() };
        Self {
            name,
            future: Box::pin(body(ctx)),
            cell,
        }
    }

    /// Debug name, if one was given
    pub fn name(&self) -> Option<&'static str> {
        self.name
    }

    /// Resume the body by one step and collect the suspension value
    ///
    /// The scheduler never parks, so the waker is a noop: readiness is
    /// decided by tick arithmetic, not by wake notifications.
    pub(crate) fn resume(&mut self) -> Flow {
        self.cell.borrow_mut().take();
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        match self.future.as_mut().poll(&mut cx) {
            Poll::Ready(()) => Flow::Complete,
            Poll::Pending => {
                Flow::Suspended(self.cell.borrow_mut().take().unwrap_or(Suspend::Yield))
            }
        }
    }
}

/// Capability handed to a task body for producing suspension values
///
/// Bound to the task whose body received it; each primitive suspends that
/// task once.
#[derive(Clone)]
pub struct TaskContext {
    cell: SuspendCell,
}

impl TaskContext {
    /// Suspend until `amount` of tick time has elapsed
    ///
    /// Zero or negative amounts suspend until the next tick, like
    /// [`next_tick`](Self::next_tick).
    pub fn delay(&self, amount: f64) -> YieldPoint {
        YieldPoint::new(&self.cell, Suspend::Delay(amount))
    }

    /// Suspend until the next tick
    pub fn next_tick(&self) -> YieldPoint {
        YieldPoint::new(&self.cell, Suspend::Yield)
    }

    /// Suspend until `task` has run to completion
    ///
    /// The task is woven into this task's suspension chain, not scheduled
    /// on its own: it has no identity of its own, and stopping this task
    /// abandons it. Its first resumption happens on the next eligible
    /// tick; once it completes, this task resumes in that same tick.
    pub fn nested(&self, task: Task) -> YieldPoint {
        YieldPoint::new(&self.cell, Suspend::Nested(task))
    }
}

/// Future returned by the [`TaskContext`] primitives
///
/// Writes its suspension value on the first poll and returns `Pending`
/// exactly once; the resumption after the suspension is satisfied observes
/// `Ready`.
pub struct YieldPoint {
    cell: SuspendCell,
    value: Option<Suspend>,
    polled: bool,
}

impl YieldPoint {
    fn new(cell: &SuspendCell, value: Suspend) -> Self {
        Self {
            cell: cell.clone(),
            value: Some(value),
            polled: false,
        }
    }
}

impl Future for YieldPoint {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.polled {
            return Poll::Ready(());
        }
        this.polled = true;
        *this.cell.borrow_mut() = this.value.take();
        Poll::Pending
    }
}
