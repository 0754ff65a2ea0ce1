//! The scheduler façade (component C4) consumed by this crate.
//!
//! Everything in this module is a *contract*: the embedding kernel
//! implements [`Scheduler`], and [`crate::Semaphore`]/[`crate::Queue`]
//! only ever call through it. This crate never touches a ready queue,
//! a tick ISR, or a context switch directly.
use crate::lock::CsProof;
use crate::ticks::Ticks;

/// Capabilities a kernel must expose for [`crate::Semaphore`] and
/// [`crate::Queue`] to operate.
///
/// # Safety
///
/// Implementors must uphold the single-processor, pre-emptive,
/// priority-based scheduling model described in the crate
/// documentation:
///
/// - [`Self::enter_critical`]/[`Self::enter_critical_from_isr`] must
///   provide mutual exclusion against every other task and ISR that
///   might call back into this crate; nesting must be supported
///   (re-entrant by nesting count) and release must happen exactly
///   once, when the returned guard is dropped.
/// - A task-level critical section must never be entered from an ISR,
///   nor vice versa.
/// - [`Self::notify_take`] must be the *only* suspension point: it
///   blocks the calling task until its own inbox is written to (via
///   [`Self::notify_give_from_task`]/[`Self::notify_give_from_isr`]) or
///   `ticks` elapses, then returns the prior inbox value (`0` means
///   "timed out") and clears the inbox if requested.
pub unsafe trait Scheduler: 'static {
    /// Opaque identifier for a task, stable for the task's lifetime.
    type TaskId: Copy + Eq + core::fmt::Debug;

    /// A task's scheduling priority. Numerically larger must mean
    /// "more urgent" is up to the implementor; this crate only ever
    /// compares priorities with [`Ord`], never inspects their values.
    type Priority: Copy + Ord + core::fmt::Debug;

    /// RAII guard for a task-level critical section. Dropping it must
    /// release the critical section.
    type CriticalSectionGuard: CsProof;

    /// RAII guard for an ISR-level critical section (saves/restores
    /// the interrupt mask). Dropping it must release the section.
    type IsrCriticalSectionGuard: CsProof;

    /// Disable pre-emption. Must nest.
    fn enter_critical() -> Self::CriticalSectionGuard;

    /// Disable interrupts at or below the current priority. Must
    /// nest. Only callable from an ISR.
    fn enter_critical_from_isr() -> Self::IsrCriticalSectionGuard;

    /// The task currently executing. Only callable from task context.
    fn current_task() -> Self::TaskId;

    /// The priority of `task`.
    fn priority_of(task: Self::TaskId) -> Self::Priority;

    /// The priority of the task that was running when the current ISR
    /// was entered. Only callable from ISR context.
    fn priority_of_interrupted_task() -> Self::Priority;

    /// Block the current task until its notification inbox is
    /// non-zero or `ticks` elapses. Returns the prior inbox value (`0`
    /// on timeout). If `clear_on_exit`, the inbox is reset to `0`
    /// before returning.
    fn notify_take(clear_on_exit: bool, ticks: Ticks) -> u32;

    /// Write a non-zero value to `task`'s inbox from task context,
    /// waking it if it is blocked in [`Self::notify_take`].
    fn notify_give_from_task(task: Self::TaskId);

    /// Write a non-zero value to `task`'s inbox from ISR context.
    /// Returns whether `task` outranks the interrupted task, i.e.
    /// whether the caller should request a context switch on ISR
    /// exit.
    fn notify_give_from_isr(task: Self::TaskId) -> bool;

    /// Request a reschedule at the next safe point.
    fn yield_now();
}
