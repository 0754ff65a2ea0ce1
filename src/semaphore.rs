//! The counting semaphore (component C2): the hard part of this crate.
//!
//! Unlike a classic counting semaphore, which only blocks on `take`,
//! this one blocks symmetrically: a `give` against a saturated
//! semaphore parks the giver exactly as a `take` against an empty one
//! parks the taker. Whichever side has a pending permit wakes the
//! opposite side's head-of-list waiter and hands the permit off to it
//! atomically, inside the same critical section that decided to wake
//! it — there is no window for a third task to steal the permit
//! between wake-up and re-check, because there is no re-check.
use core::marker::PhantomData;

use log::trace;

use crate::error::{CreateError, IsrGiveError, IsrTakeError, TimeoutError};
use crate::lock::Cell;
use crate::scheduler::Scheduler;
use crate::ticks::Ticks;
use crate::wait::WaitList;

/// A counting semaphore with symmetric take/give blocking.
///
/// `S` is the [`Scheduler`] this semaphore's critical sections and
/// notifications are dispatched through.
pub struct Semaphore<S: Scheduler> {
    count: Cell<u32>,
    max_count: u32,
    waiting_takers: Cell<WaitList<S>>,
    waiting_givers: Cell<WaitList<S>>,
    _scheduler: PhantomData<S>,
}

// Safety: every field is either `Send` on its own (`max_count`,
// `PhantomData`) or a `Cell`, whose own `Sync` impl already requires
// the contained type to be `Send`.
unsafe impl<S: Scheduler> Sync for Semaphore<S> {}

impl<S: Scheduler> Semaphore<S> {
    /// Create a semaphore with the given bounds.
    ///
    /// Returns `Err(InvalidArgs)` if `max_count == 0` or
    /// `initial_count > max_count`. This never allocates (the wait
    /// lists start empty and grow lazily), so `AllocFailed` can't
    /// actually occur here today, but the error is still part of the
    /// type to match [`crate::Queue::create`] and leave room for a
    /// future pre-reservation strategy.
    pub fn create(max_count: u32, initial_count: u32) -> Result<Self, CreateError> {
        if max_count == 0 || initial_count > max_count {
            return Err(CreateError::InvalidArgs);
        }
        Ok(Self {
            count: Cell::new(initial_count),
            max_count,
            waiting_takers: Cell::new(WaitList::new()),
            waiting_givers: Cell::new(WaitList::new()),
            _scheduler: PhantomData,
        })
    }

    /// Take one permit, blocking for up to `ticks` if none is
    /// available.
    pub fn take(&self, ticks: Ticks) -> Result<(), TimeoutError> {
        let cs = S::enter_critical();

        let count = self.count.get(&cs);
        if count > 0 {
            // Fast take with hand-off.
            self.count.set(&cs, count - 1);

            if let Some(giver) = self.waiting_givers.with_mut(&cs, |l| l.try_pop(&cs)) {
                // `G`'s slot was just consumed by our decrement; `G`'s
                // wake-path replenishes it. The signal is proof the
                // give completed, not an invitation to re-check.
                self.count.set(&cs, self.count.get(&cs) + 1);
                trace!("semaphore: take() hands off to waiting giver");
                S::notify_give_from_task(giver);
            }

            drop(cs);
            return Ok(());
        }

        // Slow path: park on `waiting_takers`, priority-ordered.
        let me = S::current_task();
        self.waiting_takers.with_mut(&cs, |l| l.place(&cs, me, true));
        drop(cs);

        trace!("semaphore: take() blocking on empty semaphore");
        let notified = S::notify_take(true, ticks);
        if notified != 0 {
            // The giver already decremented `count` on our behalf.
            return Ok(());
        }

        let cs = S::enter_critical();
        self.waiting_takers.with_mut(&cs, |l| l.remove(&cs, me));
        drop(cs);
        Err(TimeoutError)
    }

    /// Give one permit, blocking for up to `ticks` if the semaphore is
    /// already at `max_count`.
    pub fn give(&self, ticks: Ticks) -> Result<(), TimeoutError> {
        let cs = S::enter_critical();

        let count = self.count.get(&cs);
        if count < self.max_count {
            // Fast give with hand-off.
            self.count.set(&cs, count + 1);

            if let Some(taker) = self.waiting_takers.with_mut(&cs, |l| l.try_pop(&cs)) {
                self.count.set(&cs, self.count.get(&cs) - 1);
                trace!("semaphore: give() hands off to waiting taker");
                S::notify_give_from_task(taker);
            }

            drop(cs);
            return Ok(());
        }

        // Slow path: park on `waiting_givers`, FIFO.
        let me = S::current_task();
        self.waiting_givers.with_mut(&cs, |l| l.place(&cs, me, false));
        drop(cs);

        trace!("semaphore: give() blocking on full semaphore");
        let notified = S::notify_take(true, ticks);
        if notified != 0 {
            return Ok(());
        }

        let cs = S::enter_critical();
        self.waiting_givers.with_mut(&cs, |l| l.remove(&cs, me));
        drop(cs);
        Err(TimeoutError)
    }

    /// Non-blocking take for ISR context. `*woken` is OR-accumulated:
    /// callers making several ISR calls in a row should not reset it
    /// between calls.
    pub fn take_from_isr(&self, woken: &mut bool) -> Result<(), IsrTakeError> {
        let cs = S::enter_critical_from_isr();

        let count = self.count.get(&cs);
        if count == 0 {
            return Err(IsrTakeError);
        }
        self.count.set(&cs, count - 1);

        if let Some((giver, higher_priority)) =
            self.waiting_givers.with_mut(&cs, |l| l.pop_from_isr(&cs))
        {
            self.count.set(&cs, self.count.get(&cs) + 1);
            let scheduler_says_higher = S::notify_give_from_isr(giver);
            debug_assert_eq!(
                higher_priority, scheduler_says_higher,
                "WaitList and Scheduler disagree on whether the woken task outranks the interrupted one"
            );
            *woken |= scheduler_says_higher;
        }

        Ok(())
    }

    /// Non-blocking give for ISR context. `*woken` is OR-accumulated.
    pub fn give_from_isr(&self, woken: &mut bool) -> Result<(), IsrGiveError> {
        let cs = S::enter_critical_from_isr();

        let count = self.count.get(&cs);
        if count >= self.max_count {
            return Err(IsrGiveError);
        }
        self.count.set(&cs, count + 1);

        if let Some((taker, higher_priority)) =
            self.waiting_takers.with_mut(&cs, |l| l.pop_from_isr(&cs))
        {
            self.count.set(&cs, self.count.get(&cs) - 1);
            let scheduler_says_higher = S::notify_give_from_isr(taker);
            debug_assert_eq!(
                higher_priority, scheduler_says_higher,
                "WaitList and Scheduler disagree on whether the woken task outranks the interrupted one"
            );
            *woken |= scheduler_says_higher;
        }

        Ok(())
    }

    /// Probe, from ISR context, whether `take_from_isr` would succeed
    /// right now, without performing it. Used by [`crate::Queue`]'s
    /// ISR path to avoid a half-committed mutation.
    pub fn can_take_from_isr(&self) -> bool {
        let cs = S::enter_critical_from_isr();
        self.count.get(&cs) > 0
    }

    /// Probe, from ISR context, whether `give_from_isr` would succeed
    /// right now, without performing it.
    pub fn can_give_from_isr(&self) -> bool {
        let cs = S::enter_critical_from_isr();
        self.count.get(&cs) < self.max_count
    }

    /// The current count, for diagnostics/tests. Not part of the
    /// operational contract: a caller can't act on a snapshot that's
    /// already stale the moment it's returned.
    pub fn count(&self) -> u32 {
        let cs = S::enter_critical();
        self.count.get(&cs)
    }
}

impl<S: Scheduler> Drop for Semaphore<S> {
    /// `destroy` has no separate entry point here: a `Semaphore` is
    /// dropped the idiomatic Rust way, by its owner going out of scope
    /// or being freed. Destroying one with tasks still parked on
    /// either wait-list is caller misuse per §4.2.7/§7
    /// (`ContractViolation`): in a release build the parked tasks are
    /// simply never woken (no UB, since nothing here holds raw
    /// pointers into freed memory), but a debug build flags it loudly
    /// rather than silently leaving tasks asleep forever.
    fn drop(&mut self) {
        let cs = S::enter_critical();
        debug_assert!(
            self.waiting_takers.with_mut(&cs, |l| l.is_empty(&cs)),
            "semaphore destroyed with tasks still parked in take()"
        );
        debug_assert!(
            self.waiting_givers.with_mut(&cs, |l| l.is_empty(&cs)),
            "semaphore destroyed with tasks still parked in give()"
        );
    }
}
