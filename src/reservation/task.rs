/*!
 * Task State
 * The scheduler-visible slice of a registered task
 */

use crate::core::sync::RcuSlot;
use crate::core::types::Pid;
use crate::group::Group;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A task known to the reservation manager
///
/// `cos` is the task's class-of-service pointer: empty means the task runs
/// in the global pool (COS 0). The control path swaps it; the scheduler path
/// only loads it. `need_resched` is the hand-off flag for the platform glue:
/// set whenever the task's hardware state must be re-established, drained by
/// whoever drives the actual reschedule.
pub struct Task {
    pub pid: Pid,
    pub(crate) cos: RcuSlot<Group>,
    need_resched: AtomicBool,
}

impl Task {
    pub(crate) fn new(pid: Pid) -> Self {
        Self {
            pid,
            cos: RcuSlot::empty(),
            need_resched: AtomicBool::new(false),
        }
    }

    /// The group this task currently belongs to, if attached
    #[inline]
    pub fn current_group(&self) -> Option<Arc<Group>> {
        self.cos.load()
    }

    /// Mark the task for reschedule
    pub(crate) fn kick(&self) {
        self.need_resched.store(true, Ordering::Release);
    }

    /// Consume the reschedule flag
    pub fn take_resched(&self) -> bool {
        self.need_resched.swap(false, Ordering::AcqRel)
    }

    /// Peek at the reschedule flag without consuming it
    #[inline]
    pub fn needs_resched(&self) -> bool {
        self.need_resched.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_is_unattached() {
        let task = Task::new(7);
        assert!(task.current_group().is_none());
        assert!(!task.needs_resched());
    }

    #[test]
    fn test_resched_flag_consumed_once() {
        let task = Task::new(7);
        task.kick();
        assert!(task.needs_resched());
        assert!(task.take_resched());
        assert!(!task.take_resched());
    }
}
