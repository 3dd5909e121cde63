//! Tick-driven task scheduler
//!
//! The registry at the core of the crate:
//! - Ordered slot list: scheduling order, compacted lazily during ticks
//! - One resumption step per eligible slot per `advance` call
//! - Per-slot suspension-frame stack: a task suspended on a nested task
//!   keeps the whole chain in its own slot, and a completed frame hands
//!   control back to the next-outer frame within the same tick
//! - Identity-based stop/query through opaque task ids
//!
//! Single-threaded and cooperative: slots are advanced strictly in order,
//! and a task only suspends at points its own body chooses.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use crate::handle::Handle;
use crate::task::{Flow, Suspend, Task, TaskId};

/// One registry entry: a scheduled task and its pending wait
///
/// `frames` is the suspension chain, outermost task first; the innermost
/// frame is the slot's current resumption frontier, and `remaining` is the
/// frontier's pending delay, not a property of the top-level task. The
/// innermost frame is briefly lifted out while its body runs, so an empty
/// `frames` on a live slot only ever exists inside a resumption.
struct Slot {
    id: TaskId,
    frames: Vec<Task>,
    remaining: f64,
    /// Stopped but not yet swept; the slot still counts toward `len`
    vacant: bool,
}

pub(crate) struct Inner {
    slots: Vec<Slot>,
    next_id: u64,
}

/// Marks a slot vacant without compacting the registry
///
/// Shared with `Handle`, which reaches the registry through a weak
/// reference rather than a `Scheduler` value.
pub(crate) fn stop_in(inner: &RefCell<Inner>, id: TaskId) -> bool {
    let mut inner = inner.borrow_mut();
    let Some(slot) = inner.slots.iter_mut().find(|s| s.id == id && !s.vacant) else {
        return false;
    };
    slot.vacant = true;
    slot.frames.clear();
    slot.remaining = 0.0;
    trace!(id = id.0, "stopped task");
    true
}

pub(crate) fn is_running_in(inner: &RefCell<Inner>, id: TaskId) -> bool {
    inner.borrow().slots.iter().any(|s| s.id == id && !s.vacant)
}

/// The scheduler - resumes cooperative tasks, one tick at a time
///
/// Cheap to clone; clones share the same registry. Call
/// [`advance`](Self::advance) once per external tick with the elapsed time
/// since the previous call, in whatever unit the tick source uses.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<RefCell<Inner>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                slots: Vec::new(),
                // Id 0 is reserved for unbound handles
                next_id: 1,
            })),
        }
    }

    /// Schedule a task, eligible on the very next tick
    ///
    /// Returns a [`Handle`] bound to the task's identity, usable to stop,
    /// query, or join it later.
    pub fn schedule(&self, task: Task) -> Handle {
        self.schedule_after(task, 0.0)
    }

    /// Schedule a task with an initial delay
    ///
    /// A zero or negative delay means eligible on the very next tick.
    pub fn schedule_after(&self, task: Task, delay: f64) -> Handle {
        let mut inner = self.inner.borrow_mut();
        let id = TaskId(inner.next_id);
        inner.next_id += 1;
        trace!(
            id = id.0,
            name = task.name().unwrap_or(""),
            delay,
            "scheduled task"
        );
        inner.slots.push(Slot {
            id,
            frames: vec![task],
            remaining: delay,
            vacant: false,
        });
        Handle::bound(Rc::downgrade(&self.inner), id)
    }

    /// Stop the task a handle refers to
    ///
    /// The slot is marked vacant immediately (`is_running` reflects it at
    /// once) but is only removed during the next `advance` pass, so `len`
    /// is unchanged until then. Returns false if the task already
    /// completed or was already stopped.
    pub fn stop(&self, handle: &Handle) -> bool {
        self.stop_id(handle.id())
    }

    /// Stop a task by id
    pub fn stop_id(&self, id: TaskId) -> bool {
        stop_in(&self.inner, id)
    }

    /// Stop every task and empty the registry immediately
    ///
    /// Unlike single stops, this does not wait for a sweep: `len` is 0
    /// when the call returns.
    pub fn stop_all(&self) {
        let mut inner = self.inner.borrow_mut();
        let dropped = inner.slots.len();
        inner.slots.clear();
        trace!(dropped, "stopped all tasks");
    }

    /// Whether the task a handle refers to still occupies a live slot
    pub fn is_running(&self, handle: &Handle) -> bool {
        self.is_running_id(handle.id())
    }

    /// Whether a task id still occupies a live slot
    pub fn is_running_id(&self, id: TaskId) -> bool {
        is_running_in(&self.inner, id)
    }

    /// Current slot count, including stopped slots awaiting the sweep
    pub fn len(&self) -> usize {
        self.inner.borrow().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().slots.is_empty()
    }

    /// Run one tick
    ///
    /// Visits the slots present when the call began, in order; each is
    /// either swept (stopped earlier), left waiting (its delay has not run
    /// out), or resumed - and a resumption that completes the whole chain
    /// removes the slot in this same pass. Slot N is fully resolved,
    /// nested collapse included, before slot N+1 is touched. Tasks
    /// scheduled from inside a body are appended and first visited on the
    /// next call.
    ///
    /// Returns true if the registry held at least one slot when the call
    /// began, even if every one of them completed during it.
    ///
    /// Task bodies may call `schedule`, `stop`, `stop_all`, and
    /// `is_running` re-entrantly, but not `advance` itself. A panic in a
    /// task body propagates out uncaught, leaving already-visited slots
    /// resolved and unvisited slots pending.
    pub fn advance(&self, elapsed: f64) -> bool {
        let (initial, id_limit) = {
            let inner = self.inner.borrow();
            (inner.slots.len(), inner.next_id)
        };
        if initial == 0 {
            return false;
        }
        let mut index = 0;
        for _ in 0..initial {
            // stop_all() from a task body can empty the list mid-pass, and
            // slots carrying ids issued after the pass began were scheduled
            // during it - they sit behind the originals and wait for the
            // next call.
            let visitable = {
                let inner = self.inner.borrow();
                index < inner.slots.len() && inner.slots[index].id.0 < id_limit
            };
            if !visitable {
                break;
            }
            if self.step_slot(index, elapsed) {
                index += 1;
            }
        }
        true
    }

    /// Drive the registry with a fixed step until no slots remain
    ///
    /// For non-interactive callers; an external tick loop is the primary
    /// interface. Returns the number of ticks run. Loops forever if some
    /// task never completes.
    pub fn run_until_idle(&self, step: f64) -> usize {
        let mut ticks = 0;
        while self.advance(step) {
            ticks += 1;
        }
        ticks
    }

    /// Advance one slot
    ///
    /// Returns true if the slot survives the pass (the caller moves to the
    /// next index), false if it was removed (the same index now names the
    /// next slot).
    fn step_slot(&self, index: usize, elapsed: f64) -> bool {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.slots[index].vacant {
                let slot = inner.slots.remove(index);
                trace!(id = slot.id.0, "swept stopped slot");
                return false;
            }
            let slot = &mut inner.slots[index];
            if slot.remaining > 0.0 {
                slot.remaining -= elapsed;
                if slot.remaining > 0.0 {
                    // Still waiting; the task is not touched this tick
                    return true;
                }
                // The wait ran out within this tick. Overshoot is dropped,
                // not credited against the next delay.
                slot.remaining = 0.0;
            }
        }

        // Resume the innermost suspension frame. A frame that completes
        // pops and the next-outer frame resumes within this same call, so
        // finishing a nested task never costs an extra tick.
        loop {
            let (id, mut frame) = {
                let mut inner = self.inner.borrow_mut();
                let slot = &mut inner.slots[index];
                let Some(frame) = slot.frames.pop() else {
                    // Frame lost to a panic in an earlier call
                    let slot = inner.slots.remove(index);
                    trace!(id = slot.id.0, "removed torn slot");
                    return false;
                };
                (slot.id, frame)
            };

            // The registry borrow is released while the body runs: it may
            // call schedule/stop/stop_all/is_running re-entrantly.
            let flow = frame.resume();

            let mut inner = self.inner.borrow_mut();
            let Some(pos) = inner.slots.iter().position(|s| s.id == id) else {
                // stop_all() ran inside the body; nothing to put back
                return false;
            };
            let slot = &mut inner.slots[pos];
            if slot.vacant {
                // The body stopped its own task; discard the frame and
                // leave the vacant slot for the next pass, like any stop
                return true;
            }
            match flow {
                Flow::Suspended(Suspend::Delay(amount)) => {
                    slot.frames.push(frame);
                    slot.remaining = amount;
                    return true;
                }
                Flow::Suspended(Suspend::Nested(nested)) => {
                    // The nested task becomes the slot's new frontier; its
                    // first resumption is on the next eligible tick
                    slot.frames.push(frame);
                    slot.frames.push(nested);
                    return true;
                }
                Flow::Suspended(Suspend::Yield) => {
                    slot.frames.push(frame);
                    return true;
                }
                Flow::Complete => {
                    if slot.frames.is_empty() {
                        inner.slots.remove(pos);
                        trace!(id = id.0, "task completed");
                        return false;
                    }
                    // Chain collapse: clear any residual wait and resume
                    // the next-outer frame in this same call
                    slot.remaining = 0.0;
                }
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
