//! Background draining of deferred sort queues.
//!
//! Tables built in deferred mode park their secondary-key maintenance in
//! per-index queues. The [`SortScheduler`] drains those queues on worker
//! threads while a transaction is open, so that by the time readers come
//! back most indexes are already sorted and `ensure_ready` finds nothing
//! left to do.
//!
//! The scheduler is a small state machine: `Idle` until a mutation pokes
//! it, `Scheduled` once a coordinator thread is on its way, `Running`
//! while workers sweep the task list. Each task carries a claim flag so
//! two workers never drain the same index at once. The coordinator waits
//! for the transaction depth to fall back to zero, then returns the
//! machine to `Idle`; workers notice the state change and exit after
//! their current sweep.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use tabula_storage::SortTask;

const IDLE: u8 = 0;
const SCHEDULED: u8 = 1;
const RUNNING: u8 = 2;

struct SchedulerCore {
    state: AtomicU8,
    tasks: Vec<Arc<dyn SortTask>>,
    claims: Vec<AtomicBool>,
    live_workers: AtomicUsize,
    cursor: AtomicUsize,
    max_parallelism: usize,
    tx_depth: Arc<AtomicU32>,
    cancelled: AtomicBool,
}

/// Schedules worker threads that drain deferred sort queues.
pub(crate) struct SortScheduler {
    core: Arc<SchedulerCore>,
}

impl SortScheduler {
    pub(crate) fn new(
        tasks: Vec<Arc<dyn SortTask>>,
        max_parallelism: usize,
        tx_depth: Arc<AtomicU32>,
    ) -> Self {
        let claims = tasks.iter().map(|_| AtomicBool::new(false)).collect();
        Self {
            core: Arc::new(SchedulerCore {
                state: AtomicU8::new(IDLE),
                tasks,
                claims,
                live_workers: AtomicUsize::new(0),
                cursor: AtomicUsize::new(0),
                max_parallelism: max_parallelism.max(1),
                tx_depth,
                cancelled: AtomicBool::new(false),
            }),
        }
    }

    /// Starts a drain pass unless one is already scheduled or running.
    pub(crate) fn try_schedule(&self) {
        let core = &self.core;
        if core.tasks.is_empty() || core.cancelled.load(Ordering::Acquire) {
            return;
        }
        if core
            .state
            .compare_exchange(IDLE, SCHEDULED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let core = self.core.clone();
            thread::spawn(move || coordinate(core));
        }
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.core.state.load(Ordering::Acquire) == IDLE
            && self.core.live_workers.load(Ordering::Acquire) == 0
    }

    /// Stops the current pass and refuses future ones.
    pub(crate) fn cancel(&self) {
        self.core.cancelled.store(true, Ordering::Release);
    }
}

fn coordinate(core: Arc<SchedulerCore>) {
    if core
        .state
        .compare_exchange(SCHEDULED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return;
    }

    // Top workers up to the cap. A racing stale worker from a previous
    // pass still counts; over-claiming is handed back immediately.
    while core.live_workers.load(Ordering::Acquire) < core.max_parallelism {
        let claimed = core.live_workers.fetch_add(1, Ordering::AcqRel);
        if claimed >= core.max_parallelism {
            core.live_workers.fetch_sub(1, Ordering::AcqRel);
            break;
        }
        let worker = core.clone();
        thread::spawn(move || run_worker(worker));
    }

    while core.tx_depth.load(Ordering::Acquire) > 0 && !core.cancelled.load(Ordering::Acquire) {
        thread::yield_now();
    }

    core.state.store(IDLE, Ordering::Release);
}

fn run_worker(core: Arc<SchedulerCore>) {
    let start = core.cursor.fetch_add(1, Ordering::AcqRel);
    loop {
        for offset in 0..core.tasks.len() {
            let at = (start + offset) % core.tasks.len();
            if core.tasks[at].has_pending()
                && core.claims[at]
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
            {
                core.tasks[at].drain();
                core.claims[at].store(false, Ordering::Release);
            }
        }
        if core.state.load(Ordering::Acquire) != RUNNING || core.cancelled.load(Ordering::Acquire)
        {
            break;
        }
        thread::yield_now();
    }
    core.live_workers.fetch_sub(1, Ordering::AcqRel);
}
