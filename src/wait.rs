//! Wait-list (component C1): a priority+FIFO ordered set of blocked
//! tasks.
//!
//! Two ordering policies are used by [`crate::Semaphore`]: takers are
//! served by descending priority (ties broken by arrival order)
//! because they compete for a scarce resource; givers are served
//! strictly FIFO because they are being back-pressured, and serving
//! them by priority would let a high-priority producer starve a
//! low-priority consumer that already has an item pending.
use alloc::collections::VecDeque;

use crate::lock::CsProof;
use crate::scheduler::Scheduler;

struct Entry<S: Scheduler> {
    task: S::TaskId,
    priority: S::Priority,
    /// Monotonically increasing arrival order, used as the FIFO
    /// tie-break among waiters of equal priority. This counter advances
    /// only on `place` and is untouched by `try_pop`/`pop_from_isr`,
    /// including pops of an empty list.
    #[allow(dead_code)] // kept for debugging / future FIFO diagnostics
    sequence: u64,
}

/// A priority- or FIFO-ordered list of tasks blocked on one side
/// (takers or givers) of a [`crate::Semaphore`].
///
/// All operations must be called while holding the scheduler's
/// critical section; this type does not lock anything itself.
pub(crate) struct WaitList<S: Scheduler> {
    entries: VecDeque<Entry<S>>,
    next_sequence: u64,
}

impl<S: Scheduler> WaitList<S> {
    pub(crate) const fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            next_sequence: 0,
        }
    }

    /// Insert the current task. When `priority_ordered`, the list
    /// stays sorted by descending priority with FIFO tie-break;
    /// otherwise the task is appended (FIFO only).
    pub(crate) fn place(&mut self, _cs: &impl CsProof, task: S::TaskId, priority_ordered: bool) {
        let entry = Entry {
            task,
            priority: S::priority_of(task),
            sequence: self.next_sequence,
        };
        self.next_sequence = self.next_sequence.wrapping_add(1);

        if !priority_ordered {
            self.entries.push_back(entry);
            return;
        }

        // Insert before the first entry with strictly lower priority,
        // i.e. after every entry with priority >= ours. That keeps
        // descending-priority order and puts us last among equals,
        // preserving FIFO arrival order within a priority bucket.
        let insert_at = self
            .entries
            .iter()
            .position(|e| e.priority < entry.priority)
            .unwrap_or(self.entries.len());
        self.entries.insert(insert_at, entry);
    }

    /// Remove and return the head task, or `None` if the list is
    /// empty.
    pub(crate) fn try_pop(&mut self, _cs: &impl CsProof) -> Option<S::TaskId> {
        self.entries.pop_front().map(|e| e.task)
    }

    /// Remove a specific task, if present. Idempotent: removing a task
    /// that isn't on the list (e.g. because it already timed out and
    /// was removed, or was already woken) is a no-op.
    pub(crate) fn remove(&mut self, _cs: &impl CsProof, task: S::TaskId) {
        if let Some(i) = self.entries.iter().position(|e| e.task == task) {
            self.entries.remove(i);
        }
    }

    pub(crate) fn is_empty(&self, _cs: &impl CsProof) -> bool {
        self.entries.is_empty()
    }

    /// Like [`Self::try_pop`], but for use from an ISR: returns `None`
    /// if the list was empty, or `Some(higher_priority_woken)` where
    /// the bool is `true` iff the removed task outranks the
    /// interrupted task.
    pub(crate) fn pop_from_isr(&mut self, _cs: &impl CsProof) -> Option<(S::TaskId, bool)> {
        let entry = self.entries.pop_front()?;
        let higher_priority_woken = entry.priority > S::priority_of_interrupted_task();
        Some((entry.task, higher_priority_woken))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Sim, SimTask};
    use quickcheck_macros::quickcheck;

    fn list() -> WaitList<Sim> {
        WaitList::new()
    }

    #[test]
    fn fifo_order_when_not_priority_ordered() {
        let cs = Sim::enter_critical();
        let a = SimTask::for_test(1, 5);
        let b = SimTask::for_test(2, 9);
        let mut l = list();
        l.place(&cs, a, false);
        l.place(&cs, b, false);
        assert_eq!(l.try_pop(&cs).unwrap(), a);
        assert_eq!(l.try_pop(&cs).unwrap(), b);
    }

    #[test]
    fn priority_order_with_fifo_tiebreak() {
        let cs = Sim::enter_critical();
        let low = SimTask::for_test(1, 1);
        let high = SimTask::for_test(2, 9);
        let mid_first = SimTask::for_test(3, 5);
        let mid_second = SimTask::for_test(4, 5);
        let mut l = list();
        l.place(&cs, low, true);
        l.place(&cs, high, true);
        l.place(&cs, mid_first, true);
        l.place(&cs, mid_second, true);

        assert_eq!(l.try_pop(&cs).unwrap(), high);
        assert_eq!(l.try_pop(&cs).unwrap(), mid_first);
        assert_eq!(l.try_pop(&cs).unwrap(), mid_second);
        assert_eq!(l.try_pop(&cs).unwrap(), low);
    }

    #[test]
    fn remove_is_idempotent() {
        let cs = Sim::enter_critical();
        let a = SimTask::for_test(1, 5);
        let mut l = list();
        l.place(&cs, a, true);
        l.remove(&cs, a);
        l.remove(&cs, a);
        assert!(l.is_empty(&cs));
    }

    /// Property 4 (priority preemption of takers): a priority-ordered
    /// list, popped to exhaustion, never yields a higher priority after
    /// a lower one.
    #[quickcheck]
    fn qc_priority_pop_order_is_non_increasing(priorities: Vec<u8>) -> bool {
        let cs = Sim::enter_critical();
        let mut l = list();
        for (i, &p) in priorities.iter().enumerate() {
            l.place(&cs, SimTask::for_test(i as u64, p), true);
        }

        let mut last = u8::MAX;
        while let Some(task) = l.try_pop(&cs) {
            if task.priority() > last {
                return false;
            }
            last = task.priority();
        }
        true
    }

    /// A FIFO (non-priority-ordered) list always pops in arrival order,
    /// regardless of priority.
    #[quickcheck]
    fn qc_fifo_pop_order_matches_arrival(ids: Vec<u8>) -> bool {
        let cs = Sim::enter_critical();
        let mut l = list();
        for &id in &ids {
            l.place(&cs, SimTask::for_test(id as u64, id), false);
        }

        for &id in &ids {
            match l.try_pop(&cs) {
                Some(task) if task == SimTask::for_test(id as u64, id) => {}
                _ => return false,
            }
        }
        l.is_empty(&cs)
    }
}
