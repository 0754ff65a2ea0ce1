//! A host-thread-backed [`Scheduler`] implementation.
//!
//! This is **not** part of the crate's stable surface: it exists only
//! so this crate's own tests can exercise [`crate::Semaphore`] and
//! [`crate::Queue`] under real concurrent blocking, the same way the
//! teacher workspace ships a standalone, OS-thread-backed port crate
//! (`r3_port_std`) purely to run its kernel test suite on a developer's
//! machine instead of real hardware.
//!
//! Tasks are OS threads. "Interrupts" are simulated by calling an
//! `_from_isr` function directly on whatever thread wants to pretend
//! an interrupt fired, after entering an ISR scope with
//! [`Sim::run_isr`] to record the priority of the task it claims to
//! have interrupted. There's no real pre-emption here; the crate's
//! `take`/`give` algorithms don't need it; they only need a critical
//! section, a notification inbox per task, and priority comparisons,
//! all of which this module provides faithfully.
use std::cell::Cell as StdCell;
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crate::lock::CsProof;
use crate::scheduler::Scheduler;
use crate::ticks::Ticks;

/// A simulated task handle. Carries its priority inline so
/// [`Scheduler::priority_of`] never needs to consult shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimTask {
    id: u64,
    priority: u8,
}

impl SimTask {
    /// Construct a task handle directly, for tests that only need a
    /// priority-bearing identity (e.g. wait-list ordering tests) and
    /// never block or get notified.
    pub fn for_test(id: u64, priority: u8) -> Self {
        Self { id, priority }
    }

    pub fn priority(self) -> u8 {
        self.priority
    }
}

struct Inbox {
    value: Mutex<u32>,
    cv: Condvar,
}

impl Inbox {
    fn new() -> Self {
        Self {
            value: Mutex::new(0),
            cv: Condvar::new(),
        }
    }
}

fn inboxes() -> &'static Mutex<HashMap<u64, Arc<Inbox>>> {
    static INBOXES: OnceLock<Mutex<HashMap<u64, Arc<Inbox>>>> = OnceLock::new();
    INBOXES.get_or_init(|| Mutex::new(HashMap::new()))
}

fn inbox_for(id: u64) -> Arc<Inbox> {
    inboxes()
        .lock()
        .unwrap()
        .entry(id)
        .or_insert_with(|| Arc::new(Inbox::new()))
        .clone()
}

thread_local! {
    static CURRENT_TASK: StdCell<Option<SimTask>> = const { StdCell::new(None) };
    static INTERRUPTED_PRIORITY: StdCell<Option<u8>> = const { StdCell::new(None) };
}

struct ReentrantLock {
    owner: Mutex<Option<(ThreadId, u32)>>,
    cv: Condvar,
}

static LOCK: ReentrantLock = ReentrantLock {
    owner: Mutex::new(None),
    cv: Condvar::new(),
};

impl ReentrantLock {
    fn acquire(&self) {
        let me = thread::current().id();
        let mut owner = self.owner.lock().unwrap();
        loop {
            match *owner {
                None => {
                    *owner = Some((me, 1));
                    return;
                }
                Some((holder, depth)) if holder == me => {
                    *owner = Some((holder, depth + 1));
                    return;
                }
                Some(_) => {
                    owner = self.cv.wait(owner).unwrap();
                }
            }
        }
    }

    fn release(&self) {
        let me = thread::current().id();
        let mut owner = self.owner.lock().unwrap();
        match *owner {
            Some((holder, depth)) if holder == me => {
                if depth <= 1 {
                    *owner = None;
                    self.cv.notify_all();
                } else {
                    *owner = Some((holder, depth - 1));
                }
            }
            _ => panic!("releasing a critical section this thread doesn't hold"),
        }
    }
}

/// RAII guard for [`Sim`]'s task-level critical section.
#[must_use]
pub struct SimCsGuard(());

impl Drop for SimCsGuard {
    fn drop(&mut self) {
        LOCK.release();
    }
}

impl CsProof for SimCsGuard {}

/// RAII guard for [`Sim`]'s (simulated) ISR-level critical section.
#[must_use]
pub struct SimIsrCsGuard(());

impl Drop for SimIsrCsGuard {
    fn drop(&mut self) {
        LOCK.release();
    }
}

impl CsProof for SimIsrCsGuard {}

/// Host-thread-backed [`Scheduler`] used by this crate's tests.
pub struct Sim;

impl Sim {
    /// Spawn a task as an OS thread with the given priority. The
    /// closure runs with [`Scheduler::current_task`] resolving to the
    /// returned handle.
    pub fn spawn_task<F>(priority: u8, body: F) -> (SimTask, JoinHandle<()>)
    where
        F: FnOnce() + Send + 'static,
    {
        // `is_test(true)` would drop log messages from other threads.
        let _ = env_logger::try_init();

        static NEXT_ID: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(1);
        let id = NEXT_ID.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let task = SimTask { id, priority };
        // Ensure the inbox exists before the thread starts, so a giver
        // racing against thread startup always finds it.
        let _ = inbox_for(id);

        let handle = thread::Builder::new()
            .name(format!("sim-task-{id}"))
            .spawn(move || {
                CURRENT_TASK.with(|c| c.set(Some(task)));
                body();
            })
            .expect("failed to spawn simulated task thread");

        (task, handle)
    }

    /// Run `f` pretending an interrupt fired while a task of
    /// `interrupted_priority` was running, so that
    /// [`Scheduler::priority_of_interrupted_task`] resolves correctly
    /// for any `_from_isr` call `f` makes.
    pub fn run_isr<R>(interrupted_priority: u8, f: impl FnOnce() -> R) -> R {
        let prev = INTERRUPTED_PRIORITY.with(|c| c.replace(Some(interrupted_priority)));
        let result = f();
        INTERRUPTED_PRIORITY.with(|c| c.set(prev));
        result
    }
}

unsafe impl Scheduler for Sim {
    type TaskId = SimTask;
    type Priority = u8;
    type CriticalSectionGuard = SimCsGuard;
    type IsrCriticalSectionGuard = SimIsrCsGuard;

    fn enter_critical() -> Self::CriticalSectionGuard {
        LOCK.acquire();
        SimCsGuard(())
    }

    fn enter_critical_from_isr() -> Self::IsrCriticalSectionGuard {
        LOCK.acquire();
        SimIsrCsGuard(())
    }

    fn current_task() -> Self::TaskId {
        CURRENT_TASK
            .with(|c| c.get())
            .expect("current_task() called outside a sim task")
    }

    fn priority_of(task: Self::TaskId) -> Self::Priority {
        task.priority
    }

    fn priority_of_interrupted_task() -> Self::Priority {
        INTERRUPTED_PRIORITY
            .with(|c| c.get())
            .expect("priority_of_interrupted_task() called outside Sim::run_isr")
    }

    fn notify_take(clear_on_exit: bool, ticks: Ticks) -> u32 {
        let task = Self::current_task();
        let inbox = inbox_for(task.id);
        let mut value = inbox.value.lock().unwrap();

        let deadline = ticks.as_finite().map(|t| Instant::now() + Duration::from_millis(t.into()));

        loop {
            if *value != 0 {
                let v = *value;
                if clear_on_exit {
                    *value = 0;
                }
                return v;
            }
            match deadline {
                None => {
                    value = inbox.cv.wait(value).unwrap();
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return 0;
                    }
                    let (guard, timeout) = inbox.cv.wait_timeout(value, deadline - now).unwrap();
                    value = guard;
                    if timeout.timed_out() && *value == 0 {
                        return 0;
                    }
                }
            }
        }
    }

    fn notify_give_from_task(task: Self::TaskId) {
        let inbox = inbox_for(task.id);
        let mut value = inbox.value.lock().unwrap();
        *value = 1;
        inbox.cv.notify_all();
    }

    fn notify_give_from_isr(task: Self::TaskId) -> bool {
        Self::notify_give_from_task(task);
        task.priority > Self::priority_of_interrupted_task()
    }

    fn yield_now() {
        thread::yield_now();
    }
}
