//! Error kinds returned by this crate's operations.
//!
//! These map 1:1 onto the failure modes of `create`, `take`/`give`,
//! and the ISR variants: allocation/argument failure is reported as
//! `None` from `create` rather than one of these (see
//! [`crate::Semaphore::create`]), everything else gets a typed error
//! so the caller never has to guess which of several reasons a call
//! failed for.
use core::fmt;

/// Why [`crate::Semaphore::create`] or [`crate::Queue::create`]
/// declined to produce a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateError {
    /// The global allocator could not satisfy the allocation request.
    AllocFailed,
    /// `max_count == 0`, `initial_count > max_count`, `capacity == 0`,
    /// `item_size == 0`, or `capacity * item_size` overflows.
    InvalidArgs,
}

impl fmt::Display for CreateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllocFailed => f.write_str("allocation failed"),
            Self::InvalidArgs => f.write_str("invalid arguments"),
        }
    }
}

/// A blocking `take`/`give` did not complete within its tick budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutError;

impl fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("timed out waiting on semaphore")
    }
}

/// [`crate::Semaphore::take_from_isr`] found the semaphore empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsrTakeError;

impl fmt::Display for IsrTakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("semaphore empty")
    }
}

/// [`crate::Semaphore::give_from_isr`] found the semaphore saturated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsrGiveError;

impl fmt::Display for IsrGiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("semaphore full")
    }
}

/// A `send_to_back` did not complete because the queue stayed full for
/// the whole tick budget (task context) or was full at the moment of
/// the call (ISR context).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFullError;

impl fmt::Display for QueueFullError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("queue full")
    }
}

/// A `receive` did not complete because the queue stayed empty for the
/// whole tick budget (task context) or was empty at the moment of the
/// call (ISR context).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueEmptyError;

impl fmt::Display for QueueEmptyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("queue empty")
    }
}
