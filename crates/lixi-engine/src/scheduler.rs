//! [`Scheduler`] implementations.
//!
//! [`TokioScheduler`] runs delayed tasks on a tokio runtime and gives each
//! actor its own serialized lane. [`ManualScheduler`] (tests and the
//! `testing` feature) holds delayed tasks until the test advances its clock.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use lixi_core::error::SchedulerError;
use lixi_core::traits::{Scheduler, Task};
use lixi_core::types::AccountId;

/// Scheduler backed by a tokio runtime.
///
/// Delayed tasks sleep on the runtime, then run on the blocking pool since
/// they call into currency providers. Actor tasks go through one unbounded
/// mpsc lane per actor, drained by a single worker, so they run in order.
/// A lane removes itself once its queue is empty; the next task for that
/// actor opens a new one.
pub struct TokioScheduler {
    handle: Handle,
    lanes: Arc<DashMap<AccountId, Lane>>,
    next_lane: AtomicU64,
    closed: AtomicBool,
}

struct Lane {
    id: u64,
    tx: mpsc::UnboundedSender<Task>,
}

impl fmt::Debug for TokioScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioScheduler")
            .field("lanes", &self.lanes.len())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            lanes: Arc::new(DashMap::new()),
            next_lane: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Bind to the runtime of the calling context.
    pub fn current() -> Result<Self, SchedulerError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| SchedulerError::Rejected(e.to_string()))
    }

    /// Number of actor lanes with queued or running work.
    pub fn active_lanes(&self) -> usize {
        self.lanes.len()
    }

    /// Refuse new work and drop every actor lane.
    ///
    /// Tasks already queued on a lane still run; pending delays still fire.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.lanes.clear();
    }

    fn ensure_open(&self) -> Result<(), SchedulerError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SchedulerError::Shutdown);
        }
        Ok(())
    }

    fn spawn_lane(&self, actor: AccountId) -> Lane {
        let id = self.next_lane.fetch_add(1, Ordering::Relaxed);
        let (tx, mut rx) = mpsc::unbounded_channel::<Task>();
        let lanes = Arc::clone(&self.lanes);
        self.handle.spawn(async move {
            while let Some(task) = rx.recv().await {
                if let Err(e) = tokio::task::spawn_blocking(task).await {
                    warn!(%actor, error = %e, "actor task panicked");
                }
                // Senders hold the shard lock while sending, so the emptiness
                // check inside `remove_if` cannot miss a queued task.
                if rx.is_empty()
                    && lanes
                        .remove_if(&actor, |_, lane| lane.id == id && rx.is_empty())
                        .is_some()
                {
                    break;
                }
            }
            debug!(%actor, "actor lane closed");
        });
        Lane { id, tx }
    }
}

impl Scheduler for TokioScheduler {
    fn after(&self, delay: Duration, task: Task) -> Result<(), SchedulerError> {
        self.ensure_open()?;
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = tokio::task::spawn_blocking(task).await {
                warn!(error = %e, "delayed task panicked");
            }
        });
        Ok(())
    }

    fn on_actor(&self, actor: &AccountId, task: Task) -> Result<(), SchedulerError> {
        self.ensure_open()?;
        let mut lane = self
            .lanes
            .entry(*actor)
            .or_insert_with(|| self.spawn_lane(*actor));

        // A lane whose worker died hands the task back; replace it once.
        if let Err(mpsc::error::SendError(task)) = lane.tx.send(task) {
            *lane = self.spawn_lane(*actor);
            lane.tx
                .send(task)
                .map_err(|_| SchedulerError::Rejected(format!("actor lane for {actor} closed")))?;
        }
        Ok(())
    }
}

/// Deterministic scheduler for tests.
///
/// Delayed tasks wait until [`advance`](Self::advance) moves the virtual clock
/// past their deadline. Actor tasks run inline on the calling thread.
#[cfg(any(test, feature = "testing"))]
pub struct ManualScheduler {
    state: parking_lot::Mutex<ManualState>,
}

#[cfg(any(test, feature = "testing"))]
#[derive(Default)]
struct ManualState {
    now: Duration,
    next_seq: u64,
    pending: Vec<(Duration, u64, Task)>,
    closed: bool,
}

#[cfg(any(test, feature = "testing"))]
impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ManualScheduler")
            .field("now", &state.now)
            .field("pending", &state.pending.len())
            .finish()
    }
}

#[cfg(any(test, feature = "testing"))]
impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "testing"))]
impl ManualScheduler {
    pub fn new() -> Self {
        Self {
            state: parking_lot::Mutex::new(ManualState::default()),
        }
    }

    /// Number of delayed tasks not yet run.
    pub fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Make every later `after`/`on_actor` call fail with `Shutdown`.
    pub fn close(&self) {
        self.state.lock().closed = true;
    }

    /// Move the clock forward by `by` and run every task now due, in
    /// deadline order. Returns how many ran.
    pub fn advance(&self, by: Duration) -> usize {
        let due = {
            let mut state = self.state.lock();
            state.now += by;
            let now = state.now;
            let (due, later): (Vec<_>, Vec<_>) = std::mem::take(&mut state.pending)
                .into_iter()
                .partition(|(deadline, _, _)| *deadline <= now);
            state.pending = later;
            due
        };
        Self::run(due)
    }

    /// Run every pending task regardless of deadline.
    pub fn fire_all(&self) -> usize {
        let due = std::mem::take(&mut self.state.lock().pending);
        Self::run(due)
    }

    fn run(mut due: Vec<(Duration, u64, Task)>) -> usize {
        due.sort_by_key(|(deadline, seq, _)| (*deadline, *seq));
        let count = due.len();
        // The lock is released here, so tasks may schedule more work.
        for (_, _, task) in due {
            task();
        }
        count
    }
}

#[cfg(any(test, feature = "testing"))]
impl Scheduler for ManualScheduler {
    fn after(&self, delay: Duration, task: Task) -> Result<(), SchedulerError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(SchedulerError::Shutdown);
        }
        let deadline = state.now + delay;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.pending.push((deadline, seq, task));
        Ok(())
    }

    fn on_actor(&self, _actor: &AccountId, task: Task) -> Result<(), SchedulerError> {
        if self.state.lock().closed {
            return Err(SchedulerError::Shutdown);
        }
        task();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use parking_lot::Mutex;

    #[test]
    fn manual_runs_in_deadline_order() {
        let scheduler = ManualScheduler::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for (delay, tag) in [(30, "c"), (10, "a"), (20, "b")] {
            let log = Arc::clone(&log);
            scheduler
                .after(Duration::from_secs(delay), Box::new(move || log.lock().push(tag)))
                .unwrap();
        }

        assert_eq!(scheduler.advance(Duration::from_secs(15)), 1);
        assert_eq!(scheduler.advance(Duration::from_secs(100)), 2);
        assert_eq!(*log.lock(), vec!["a", "b", "c"]);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn manual_tasks_run_once() {
        let scheduler = ManualScheduler::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        scheduler
            .after(Duration::from_secs(1), Box::new(move || {
                h.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        scheduler.fire_all();
        scheduler.fire_all();
        scheduler.advance(Duration::from_secs(10));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn manual_close_rejects() {
        let scheduler = ManualScheduler::new();
        scheduler.close();
        assert_eq!(
            scheduler.after(Duration::ZERO, Box::new(|| {})),
            Err(SchedulerError::Shutdown)
        );
        assert_eq!(
            scheduler.on_actor(&AccountId::new(), Box::new(|| {})),
            Err(SchedulerError::Shutdown)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn tokio_after_fires_once() {
        let scheduler = TokioScheduler::current().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        scheduler
            .after(Duration::from_millis(20), Box::new(move || {
                let _ = tx.send(());
            }))
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        // The sender was dropped with the task; nothing else arrives.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn tokio_actor_lane_preserves_order() {
        let scheduler = TokioScheduler::current().unwrap();
        let actor = AccountId::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();

        for i in 0..20 {
            let log = Arc::clone(&log);
            let done_tx = done_tx.clone();
            scheduler
                .on_actor(&actor, Box::new(move || {
                    log.lock().push(i);
                    let _ = done_tx.send(());
                }))
                .unwrap();
        }
        for _ in 0..20 {
            tokio::time::timeout(Duration::from_secs(5), done_rx.recv())
                .await
                .unwrap()
                .unwrap();
        }
        assert_eq!(*log.lock(), (0..20).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn tokio_idle_lanes_are_dropped() {
        let scheduler = TokioScheduler::current().unwrap();
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let actors: Vec<AccountId> = (0..500).map(|_| AccountId::new()).collect();

        for actor in &actors {
            let done_tx = done_tx.clone();
            scheduler
                .on_actor(actor, Box::new(move || {
                    let _ = done_tx.send(());
                }))
                .unwrap();
        }
        for _ in 0..actors.len() {
            tokio::time::timeout(Duration::from_secs(5), done_rx.recv())
                .await
                .unwrap()
                .unwrap();
        }

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while scheduler.active_lanes() > 0 {
            assert!(tokio::time::Instant::now() < deadline, "lanes never drained");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        // A returning actor gets a fresh lane.
        let done = done_tx.clone();
        scheduler
            .on_actor(&actors[0], Box::new(move || {
                let _ = done.send(());
            }))
            .unwrap();
        tokio::time::timeout(Duration::from_secs(5), done_rx.recv())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn tokio_shutdown_rejects_new_work() {
        let scheduler = TokioScheduler::current().unwrap();
        scheduler.shutdown();
        assert_eq!(
            scheduler.after(Duration::ZERO, Box::new(|| {})),
            Err(SchedulerError::Shutdown)
        );
    }

    #[test]
    fn tokio_current_outside_runtime_fails() {
        assert!(matches!(
            TokioScheduler::current(),
            Err(SchedulerError::Rejected(_))
        ));
    }
}
