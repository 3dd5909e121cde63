//! Identity-based task handles
//!
//! A Handle is a lightweight, cloneable reference to a scheduled task: the
//! id the scheduler issued for it plus a weak link back to the registry.
//! It does not own the task - the registry does - so a handle held past
//! the task's completion simply reports false from then on.

use std::cell::RefCell;
use std::rc::Weak;

use crate::scheduler::{Inner, is_running_in, stop_in};
use crate::task::{Task, TaskId};

/// External reference to a scheduled task, for stop/query/join
///
/// Cheap to clone. The default value is unbound: it refers to nothing,
/// reports not-running, and refuses to stop anything.
#[derive(Clone, Default)]
pub struct Handle {
    scheduler: Weak<RefCell<Inner>>,
    id: TaskId,
}

impl Handle {
    pub(crate) fn bound(scheduler: Weak<RefCell<Inner>>, id: TaskId) -> Self {
        Self { scheduler, id }
    }

    /// The opaque identity the scheduler issued for this task
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Whether the task still occupies a live slot
    ///
    /// False for unbound handles, after the scheduler itself is gone, and
    /// as soon as the task is stopped - even before its slot is swept.
    pub fn is_running(&self) -> bool {
        match self.scheduler.upgrade() {
            Some(inner) => is_running_in(&inner, self.id),
            None => false,
        }
    }

    /// Stop the task; false if it is not running
    pub fn stop(&self) -> bool {
        let Some(inner) = self.scheduler.upgrade() else {
            return false;
        };
        if !is_running_in(&inner, self.id) {
            return false;
        }
        stop_in(&inner, self.id)
    }

    /// A task that completes once this handle's task is gone
    ///
    /// Yield it as a nested suspension to join on an independently
    /// scheduled task: the waiting body checks once per tick and resumes,
    /// by normal chain collapse, in the tick it first observes the watched
    /// slot gone. Stopping the waiting task does not stop the watched one.
    pub fn wait(&self) -> Task {
        let watched = self.clone();
        Task::named("wait", move |ctx| async move {
            while watched.is_running() {
                ctx.next_tick().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Scheduler;
    use crate::task::{Flow, Suspend};
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_default_handle_is_inert() {
        let handle = Handle::default();
        assert!(!handle.is_running());
        assert!(!handle.stop());
    }

    #[test]
    fn test_handle_tracks_task_lifecycle() {
        let sched = Scheduler::new();
        let handle = sched.schedule(Task::new(|ctx| async move {
            ctx.next_tick().await;
        }));

        assert!(handle.is_running());
        sched.advance(0.1);
        assert!(handle.is_running());
        sched.advance(0.1);
        assert!(!handle.is_running());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let sched = Scheduler::new();
        let counter = Rc::new(Cell::new(0));
        let counter_clone = counter.clone();
        let handle = sched.schedule(Task::new(move |ctx| async move {
            counter_clone.set(counter_clone.get() + 1);
            ctx.next_tick().await;
        }));

        assert!(handle.stop());
        assert!(!handle.stop());
        assert!(!handle.is_running());

        sched.advance(0.1);
        assert_eq!(counter.get(), 0);
        assert!(!handle.stop());
    }

    #[test]
    fn test_handle_outliving_scheduler_reports_false() {
        let sched = Scheduler::new();
        let handle = sched.schedule(Task::new(|ctx| async move {
            ctx.next_tick().await;
        }));

        assert!(handle.is_running());
        drop(sched);
        assert!(!handle.is_running());
        assert!(!handle.stop());
    }

    #[test]
    fn test_wait_yields_while_watched_runs() {
        let sched = Scheduler::new();
        let handle = sched.schedule(Task::new(|ctx| async move {
            ctx.next_tick().await;
        }));

        // Drive the wait task by hand: it yields while the watched slot is
        // live and completes once it is gone
        let mut wait = handle.wait();
        assert_eq!(wait.name(), Some("wait"));
        assert!(matches!(wait.resume(), Flow::Suspended(Suspend::Yield)));

        sched.advance(0.1);
        assert!(matches!(wait.resume(), Flow::Suspended(Suspend::Yield)));

        sched.advance(0.1);
        assert!(!handle.is_running());
        assert!(matches!(wait.resume(), Flow::Complete));
    }

    #[test]
    fn test_wait_on_finished_task_completes_immediately() {
        let sched = Scheduler::new();
        let handle = sched.schedule(Task::new(|_ctx| async {}));
        sched.advance(0.1);

        let mut wait = handle.wait();
        assert!(matches!(wait.resume(), Flow::Complete));
    }
}
