//! The bounded message queue (component C3): a fixed-capacity ring
//! buffer of fixed-size items, built entirely out of three
//! [`Semaphore`]s.
//!
//! `empty_slots` counts free slots (starts at `capacity`), `full_slots`
//! counts occupied ones (starts at `0`), and `modify` is a binary
//! semaphore serializing access to `head`/`tail`/the byte buffer. A
//! sender acquires an empty slot and the write lock, copies in, and
//! releases both in the order that makes the copy visible to a
//! receiver before the slot it claims is reported full. `receive` is
//! the same protocol with `empty_slots` and `full_slots` swapped.
use alloc::vec;
use alloc::vec::Vec;
use core::cell::UnsafeCell;

use log::trace;

use crate::error::{CreateError, QueueEmptyError, QueueFullError};
use crate::scheduler::Scheduler;
use crate::semaphore::Semaphore;
use crate::ticks::Ticks;

/// The ring buffer itself, plus cursors. Mutated only by whoever holds
/// the queue's `modify` permit.
struct RingBuf {
    bytes: Vec<u8>,
    /// Byte offset of the next item a `receive` will take.
    head: usize,
    /// Byte offset where the next `send_to_back` will write.
    tail: usize,
}

impl RingBuf {
    fn push(&mut self, item_size: usize, item: &[u8]) {
        self.bytes[self.tail..self.tail + item_size].copy_from_slice(item);
        self.tail += item_size;
        if self.tail == self.bytes.len() {
            self.tail = 0;
        }
    }

    fn pop(&mut self, item_size: usize, out: &mut [u8]) {
        out.copy_from_slice(&self.bytes[self.head..self.head + item_size]);
        self.head += item_size;
        if self.head == self.bytes.len() {
            self.head = 0;
        }
    }
}

/// `RingBuf` behind a cell that isn't gated by [`crate::lock::CsProof`]:
/// unlike a semaphore's own count and wait-lists, the byte copy here
/// can be long enough that holding a critical section across it would
/// block every other task and ISR in the system. Exclusivity instead
/// comes from holding the `modify` semaphore's single permit — the
/// same "holding a proof of exclusivity licenses the unsafe cell"
/// relationship as [`crate::lock::Cell`], generalized from a
/// critical-section guard to a semaphore permit.
struct RawBuf(UnsafeCell<RingBuf>);

// Safety: every access goes through `with_mut`, called only while the
// caller holds `modify`, which this queue never lets two holders share.
unsafe impl Sync for RawBuf {}

impl RawBuf {
    fn new(buf: RingBuf) -> Self {
        Self(UnsafeCell::new(buf))
    }

    /// Safety: the caller must hold this queue's `modify` permit for
    /// the duration of `f`.
    unsafe fn with_mut<R>(&self, f: impl FnOnce(&mut RingBuf) -> R) -> R {
        f(&mut *self.0.get())
    }
}

/// A fixed-capacity queue of fixed-size items.
///
/// `S` is the [`Scheduler`] shared by this queue's three internal
/// semaphores.
pub struct Queue<S: Scheduler> {
    item_size: usize,
    empty_slots: Semaphore<S>,
    full_slots: Semaphore<S>,
    modify: Semaphore<S>,
    buf: RawBuf,
}

impl<S: Scheduler> Queue<S> {
    /// Create a queue holding up to `capacity` items of `item_size`
    /// bytes each.
    ///
    /// Returns `Err(InvalidArgs)` if either is zero or their product
    /// overflows `usize`.
    pub fn create(capacity: usize, item_size: usize) -> Result<Self, CreateError> {
        if capacity == 0 || item_size == 0 {
            return Err(CreateError::InvalidArgs);
        }
        let capacity_u32 = u32::try_from(capacity).map_err(|_| CreateError::InvalidArgs)?;
        let total_bytes = capacity
            .checked_mul(item_size)
            .ok_or(CreateError::InvalidArgs)?;

        Ok(Self {
            item_size,
            empty_slots: Semaphore::create(capacity_u32, capacity_u32)?,
            full_slots: Semaphore::create(capacity_u32, 0)?,
            modify: Semaphore::create(1, 1)?,
            buf: RawBuf::new(RingBuf {
                bytes: vec![0u8; total_bytes],
                head: 0,
                tail: 0,
            }),
        })
    }

    /// Append `item` to the back of the queue, blocking for up to
    /// `ticks` if the queue is full.
    ///
    /// `item.len()` must equal the `item_size` this queue was created
    /// with.
    pub fn send_to_back(&self, item: &[u8], ticks: Ticks) -> Result<(), QueueFullError> {
        debug_assert_eq!(item.len(), self.item_size);
        let half = ticks.halve();

        trace!("queue: send_to_back() waiting for an empty slot");
        self.empty_slots.take(half).map_err(|_| QueueFullError)?;

        if self.modify.take(half).is_err() {
            trace!("queue: send_to_back() timed out waiting for `modify`, restoring empty slot");
            self.empty_slots
                .give(Ticks::FOREVER)
                .expect("give(forever) cannot time out");
            return Err(QueueFullError);
        }

        // Safety: we hold `modify`.
        unsafe {
            self.buf.with_mut(|b| b.push(self.item_size, item));
        }

        self.modify
            .give(Ticks::FOREVER)
            .expect("give(forever) cannot time out");
        self.full_slots
            .give(Ticks::FOREVER)
            .expect("give(forever) cannot time out");

        Ok(())
    }

    /// Remove the item at the front of the queue into `out`, blocking
    /// for up to `ticks` if the queue is empty.
    ///
    /// `out.len()` must equal the `item_size` this queue was created
    /// with.
    pub fn receive(&self, out: &mut [u8], ticks: Ticks) -> Result<(), QueueEmptyError> {
        debug_assert_eq!(out.len(), self.item_size);
        let half = ticks.halve();

        trace!("queue: receive() waiting for a full slot");
        self.full_slots.take(half).map_err(|_| QueueEmptyError)?;

        if self.modify.take(half).is_err() {
            trace!("queue: receive() timed out waiting for `modify`, restoring full slot");
            self.full_slots
                .give(Ticks::FOREVER)
                .expect("give(forever) cannot time out");
            return Err(QueueEmptyError);
        }

        // Safety: we hold `modify`.
        unsafe {
            self.buf.with_mut(|b| b.pop(self.item_size, out));
        }

        self.modify
            .give(Ticks::FOREVER)
            .expect("give(forever) cannot time out");
        self.empty_slots
            .give(Ticks::FOREVER)
            .expect("give(forever) cannot time out");

        Ok(())
    }

    /// Non-blocking `send_to_back` for ISR context. `*woken` is
    /// OR-accumulated; left untouched if `modify` itself couldn't be
    /// taken (nothing was unblocked in that case).
    pub fn send_to_back_from_isr(&self, item: &[u8], woken: &mut bool) -> Result<(), QueueFullError> {
        debug_assert_eq!(item.len(), self.item_size);

        let mut modify_woken = false;
        self.modify
            .take_from_isr(&mut modify_woken)
            .map_err(|_| QueueFullError)?;
        debug_assert!(!modify_woken, "modify has no giver wait-list to wake");

        if !(self.empty_slots.can_take_from_isr() && self.full_slots.can_give_from_isr()) {
            trace!("queue: send_to_back_from_isr() rejected, queue full");
            let mut discard = false;
            self.modify
                .give_from_isr(&mut discard)
                .expect("give_from_isr cannot fail: we just took the only permit");
            return Err(QueueFullError);
        }

        let mut a = false;
        let mut b = false;
        self.empty_slots
            .take_from_isr(&mut a)
            .expect("can_take_from_isr just confirmed this would succeed");

        // Safety: we hold `modify`.
        unsafe {
            self.buf.with_mut(|buf| buf.push(self.item_size, item));
        }

        self.full_slots
            .give_from_isr(&mut b)
            .expect("can_give_from_isr just confirmed this would succeed");

        let mut discard = false;
        self.modify
            .give_from_isr(&mut discard)
            .expect("give_from_isr cannot fail: we just took the only permit");

        *woken |= a | b;
        Ok(())
    }

    /// Non-blocking `receive` for ISR context. `*woken` is
    /// OR-accumulated, with the same "left untouched on early `modify`
    /// failure" rule as [`Self::send_to_back_from_isr`].
    pub fn receive_from_isr(&self, out: &mut [u8], woken: &mut bool) -> Result<(), QueueEmptyError> {
        debug_assert_eq!(out.len(), self.item_size);

        let mut modify_woken = false;
        self.modify
            .take_from_isr(&mut modify_woken)
            .map_err(|_| QueueEmptyError)?;
        debug_assert!(!modify_woken, "modify has no giver wait-list to wake");

        if !(self.full_slots.can_take_from_isr() && self.empty_slots.can_give_from_isr()) {
            trace!("queue: receive_from_isr() rejected, queue empty");
            let mut discard = false;
            self.modify
                .give_from_isr(&mut discard)
                .expect("give_from_isr cannot fail: we just took the only permit");
            return Err(QueueEmptyError);
        }

        let mut a = false;
        let mut b = false;
        self.full_slots
            .take_from_isr(&mut a)
            .expect("can_take_from_isr just confirmed this would succeed");

        // Safety: we hold `modify`.
        unsafe {
            self.buf.with_mut(|buf| buf.pop(self.item_size, out));
        }

        self.empty_slots
            .give_from_isr(&mut b)
            .expect("can_give_from_isr just confirmed this would succeed");

        let mut discard = false;
        self.modify
            .give_from_isr(&mut discard)
            .expect("give_from_isr cannot fail: we just took the only permit");

        *woken |= a | b;
        Ok(())
    }

    /// Number of items currently queued, for diagnostics/tests. Like
    /// [`Semaphore::count`], this is a stale snapshot the instant it's
    /// returned.
    pub fn len(&self) -> u32 {
        self.full_slots.count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::Sim;
    use std::sync::Arc;

    /// S1: a single send/receive round-trips a 4-byte item.
    #[test]
    fn simple_send_and_receive_round_trip() {
        let q: Queue<Sim> = Queue::create(8, 4).unwrap();
        let (_t, h) = Sim::spawn_task(5, move || {
            q.send_to_back(&5u32.to_ne_bytes(), Ticks::FOREVER).unwrap();
            let mut out = [0u8; 4];
            q.receive(&mut out, Ticks::FOREVER).unwrap();
            assert_eq!(u32::from_ne_bytes(out), 5);
        });
        h.join().unwrap();
    }

    #[test]
    fn create_rejects_invalid_args() {
        assert_eq!(Queue::<Sim>::create(0, 4), Err(CreateError::InvalidArgs));
        assert_eq!(Queue::<Sim>::create(4, 0), Err(CreateError::InvalidArgs));
    }

    #[test]
    fn send_times_out_when_full_and_restores_empty_slots() {
        let q: Arc<Queue<Sim>> = Arc::new(Queue::create(1, 4).unwrap());
        let (_t, h) = Sim::spawn_task(5, {
            let q = q.clone();
            move || {
                q.send_to_back(&1u32.to_ne_bytes(), Ticks::FOREVER).unwrap();
                let r = q.send_to_back(&2u32.to_ne_bytes(), Ticks::new(10));
                assert_eq!(r, Err(QueueFullError));
                assert_eq!(q.empty_slots.count(), 0);
            }
        });
        h.join().unwrap();
    }

    /// S3: fill a capacity-3 queue from an ISR, then five more ISR
    /// sends are all rejected while it stays full, then drain it from
    /// a task in the order the items were sent.
    #[test]
    fn isr_fill_then_task_drain_preserves_order() {
        let q: Queue<Sim> = Queue::create(3, 4).unwrap();
        let mut woken = false;
        for v in [490u32, 491, 492] {
            Sim::run_isr(1, || {
                q.send_to_back_from_isr(&v.to_ne_bytes(), &mut woken).unwrap();
            });
        }
        assert!(!woken);

        for _ in 0..5 {
            Sim::run_isr(1, || {
                assert_eq!(
                    q.send_to_back_from_isr(&999u32.to_ne_bytes(), &mut woken),
                    Err(QueueFullError)
                );
            });
        }

        for v in [490u32, 491, 492] {
            let mut out = [0u8; 4];
            q.receive(&mut out, Ticks::ZERO).unwrap();
            assert_eq!(u32::from_ne_bytes(out), v);
        }
    }
}
