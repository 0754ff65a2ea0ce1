//! A symmetric-blocking counting semaphore and a bounded message queue
//! built on top of it, for a single-processor, pre-emptive,
//! priority-based real-time kernel.
//!
//! This crate does not schedule anything itself. It consumes a small
//! [`Scheduler`] trait (critical sections, per-task notification
//! inboxes, priority queries) from whatever kernel embeds it, and in
//! return provides two primitives:
//!
//! - [`Semaphore`], a counting semaphore that blocks symmetrically on
//!   both `take` (when empty) and `give` (when full), unlike a classic
//!   semaphore which only blocks on `take`.
//! - [`Queue`], a fixed-capacity ring buffer of fixed-size items,
//!   composed from three `Semaphore`s (empty-slot count, full-slot
//!   count, and a binary write-serializing semaphore).
//!
//! Both have interrupt-context variants (`_from_isr`) that never block
//! and report whether they unblocked a task of higher priority than
//! the interrupted one, so the caller can request a context switch on
//! ISR exit.
// Link `std` when building tests or when the host-thread `sim` scheduler
// (which needs threads, mutexes, and a heap-backed task registry) is enabled.
#![cfg_attr(not(any(test, feature = "sim")), no_std)]
extern crate alloc;

pub mod error;
pub mod lock;
pub mod queue;
pub mod scheduler;
pub mod semaphore;
mod ticks;
mod wait;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use error::{CreateError, IsrGiveError, IsrTakeError, QueueEmptyError, QueueFullError, TimeoutError};
pub use queue::Queue;
pub use scheduler::Scheduler;
pub use semaphore::Semaphore;
pub use ticks::Ticks;
