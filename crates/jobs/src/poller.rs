//! Polling lifecycle for one remote job.
//!
//! A [`JobPoller`] owns the fetch → derive → schedule loop of exactly one job:
//!
//! ```text
//!            start()                 terminal state / stop()
//!   Idle ───────────────▶ Polling ─────────────────────────▶ Stopped
//!                           ▲  │ non-terminal: sleep(interval), fetch again      │
//!                           │  └──────────────────────────────┘                  │
//!                           └────────────────────── start() ─────────────────────┘
//!
//!   any state ── dispose() / drop ──▶ Disposed (permanent)
//! ```
//!
//! ## Invariants
//!
//! - At most one scheduled polling task per session (the session owns its
//!   `JoinHandle`).
//! - At most one fetch in flight: scheduled fetches and manual refreshes both
//!   hold the fetch gate for the whole request.
//! - Subscribers see events in fetch-completion order; events are pushed onto
//!   channels while the session lock is held.
//! - After `dispose()` no fetch result reaches a subscriber, no callback
//!   listener is invoked and no timer is re-armed. Disposal never waits for
//!   an in-flight fetch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use atelier_core::JobId;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

use crate::fetch::{FetchError, SnapshotFetcher};
use crate::snapshot::JobSnapshot;
use crate::status::{JobState, progress};

/// Interval of the product's detail pages.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Poller configuration.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Fixed delay between the end of one scheduled fetch and the next.
    /// Transport failures retry on the same interval (no backoff).
    pub poll_interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl PollerConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Lifecycle state of a polling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, `start()` not called yet.
    Idle,
    /// A scheduled polling task is alive.
    Polling,
    /// No automatic fetches; `refresh()` still allowed.
    Stopped,
    /// Permanently inert.
    Disposed,
}

/// Notification delivered to subscribers.
#[derive(Debug, Clone)]
pub enum PollEvent {
    /// A fetch succeeded.
    Snapshot(Arc<JobSnapshot>),
    /// A fetch failed at the transport level. The job state is unchanged and
    /// polling continues.
    TransientError(FetchError),
}

#[derive(Debug, Error)]
pub enum PollerError {
    /// The session was disposed; lifecycle misuse.
    #[error("poller for job {0} has been disposed")]
    Disposed(JobId),

    /// `start()` or `subscribe_with()` was called outside a Tokio runtime.
    #[error("poller for job {0} cannot spawn tasks outside a Tokio runtime")]
    NoRuntime(JobId),

    /// A manual refresh failed at the transport level.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Channel-backed subscription to a poller.
///
/// Dropping it unsubscribes. The stream ends (`recv` returns `None`) once the
/// poller is disposed.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<PollEvent>,
}

impl Subscription {
    /// Wait for the next event; `None` when the poller has been disposed.
    pub async fn recv(&mut self) -> Option<PollEvent> {
        self.rx.recv().await
    }

    /// Next buffered event, if any.
    pub fn try_recv(&mut self) -> Option<PollEvent> {
        self.rx.try_recv().ok()
    }

    pub fn unsubscribe(self) {}
}

/// Handle for a callback subscription created by [`JobPoller::subscribe_with`].
#[derive(Debug)]
pub struct ListenerHandle {
    task: JoinHandle<()>,
    active: Arc<AtomicBool>,
}

impl ListenerHandle {
    /// Stop invoking the callbacks, including for events already queued.
    pub fn unsubscribe(self) {
        self.active.store(false, Ordering::SeqCst);
        self.task.abort();
    }

    /// True once the listener will never be called again.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Tracks one remote job until it settles.
///
/// Not `Clone`: share it behind an `Arc` when several tasks need it. Dropping
/// the poller disposes the session.
pub struct JobPoller<F: SnapshotFetcher> {
    inner: Arc<Inner<F>>,
}

struct Inner<F> {
    job_id: JobId,
    fetcher: F,
    config: PollerConfig,
    session: Mutex<Session>,
    fetch_gate: tokio::sync::Mutex<()>,
}

struct Session {
    state: SessionState,
    snapshot: Option<Arc<JobSnapshot>>,
    timer: Option<JoinHandle<()>>,
    // Bumped on every start/stop/dispose; a polling task only acts while its
    // epoch is current.
    epoch: u64,
    subscribers: Vec<mpsc::UnboundedSender<PollEvent>>,
    listeners: Vec<Listener>,
}

/// Session-side half of a callback listener.
struct Listener {
    active: Arc<AtomicBool>,
    task: AbortHandle,
}

impl Listener {
    fn silence(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.task.abort();
    }
}

impl Session {
    fn broadcast(&mut self, event: PollEvent) {
        // Drop subscribers whose receiving half is gone.
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn timer_is_live(&self) -> bool {
        self.timer.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Origin {
    Scheduled { epoch: u64 },
    Manual,
}

impl Origin {
    fn accepts(self, session: &Session) -> bool {
        match self {
            Origin::Scheduled { epoch } => {
                session.state == SessionState::Polling && session.epoch == epoch
            }
            Origin::Manual => session.state != SessionState::Disposed,
        }
    }
}

enum FetchOutcome {
    Fetched(Arc<JobSnapshot>),
    Failed(FetchError),
    Discarded,
}

impl<F: SnapshotFetcher> Inner<F> {
    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn accepts(&self, origin: Origin) -> bool {
        let session = self.lock_session();
        origin.accepts(&session)
    }

    async fn fetch_once(&self, origin: Origin) -> FetchOutcome {
        let _in_flight = self.fetch_gate.lock().await;

        // The session may have moved on while this fetch waited for the gate.
        if !self.accepts(origin) {
            return FetchOutcome::Discarded;
        }

        let result = self
            .fetcher
            .fetch_snapshot(&self.job_id)
            .await
            .and_then(|snapshot| self.check_job(snapshot));

        let mut session = self.lock_session();
        if !origin.accepts(&session) {
            debug!(job_id = %self.job_id, ?origin, "discarding late fetch result");
            return FetchOutcome::Discarded;
        }

        match result {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                session.snapshot = Some(Arc::clone(&snapshot));
                session.broadcast(PollEvent::Snapshot(Arc::clone(&snapshot)));

                if matches!(origin, Origin::Scheduled { .. }) && snapshot.state().is_terminal() {
                    session.state = SessionState::Stopped;
                    // Our own handle; dropping it detaches this task.
                    session.timer = None;
                }

                FetchOutcome::Fetched(snapshot)
            }
            Err(error) => {
                session.broadcast(PollEvent::TransientError(error.clone()));
                FetchOutcome::Failed(error)
            }
        }
    }

    fn check_job(&self, snapshot: JobSnapshot) -> Result<JobSnapshot, FetchError> {
        if snapshot.job_id() != self.job_id {
            return Err(FetchError::invalid(format!(
                "expected snapshot of job {}, got job {}",
                self.job_id,
                snapshot.job_id()
            )));
        }
        Ok(snapshot)
    }
}

async fn poll_loop<F: SnapshotFetcher>(inner: Arc<Inner<F>>, epoch: u64) {
    let origin = Origin::Scheduled { epoch };

    loop {
        match inner.fetch_once(origin).await {
            FetchOutcome::Fetched(snapshot) => {
                let state = snapshot.state();
                let p = progress(&snapshot);
                if state.is_terminal() {
                    info!(
                        job_id = %inner.job_id,
                        state = %state,
                        produced = p.produced,
                        requested = p.requested,
                        "job settled; polling stopped"
                    );
                    return;
                }
                debug!(
                    job_id = %inner.job_id,
                    state = %state,
                    produced = p.produced,
                    requested = p.requested,
                    "job still running"
                );
            }
            FetchOutcome::Failed(error) => {
                warn!(
                    job_id = %inner.job_id,
                    error = %error,
                    "snapshot fetch failed; retrying on next tick"
                );
            }
            FetchOutcome::Discarded => return,
        }

        tokio::time::sleep(inner.config.poll_interval).await;
    }
}

impl<F: SnapshotFetcher> JobPoller<F> {
    /// Create an idle poller. Nothing is fetched until `start()` or `refresh()`.
    pub fn new(job_id: JobId, fetcher: F, config: PollerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                job_id,
                fetcher,
                config,
                session: Mutex::new(Session {
                    state: SessionState::Idle,
                    snapshot: None,
                    timer: None,
                    epoch: 0,
                    subscribers: Vec::new(),
                    listeners: Vec::new(),
                }),
                fetch_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn job_id(&self) -> JobId {
        self.inner.job_id
    }

    pub fn session_state(&self) -> SessionState {
        self.inner.lock_session().state
    }

    /// Latest successfully fetched snapshot.
    pub fn snapshot(&self) -> Option<Arc<JobSnapshot>> {
        self.inner.lock_session().snapshot.clone()
    }

    /// State derived from the latest snapshot.
    pub fn job_state(&self) -> Option<JobState> {
        self.snapshot().map(|s| s.state())
    }

    /// True while a scheduled polling task is alive.
    pub fn has_pending_timer(&self) -> bool {
        self.inner.lock_session().timer_is_live()
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        let mut session = self.inner.lock_session();
        session.subscribers.retain(|tx| !tx.is_closed());
        session.subscribers.len()
    }

    /// Begin polling: fetch immediately, then every `poll_interval` until the
    /// job reaches a terminal state.
    ///
    /// Idempotent while polling. Restarts polling from `Stopped`.
    pub fn start(&self) -> Result<(), PollerError> {
        let job_id = self.inner.job_id;
        let mut session = self.inner.lock_session();

        match session.state {
            SessionState::Disposed => return Err(PollerError::Disposed(job_id)),
            SessionState::Polling if session.timer_is_live() => {
                debug!(job_id = %job_id, "start ignored; already polling");
                return Ok(());
            }
            SessionState::Polling => {
                warn!(job_id = %job_id, "polling task ended unexpectedly; re-arming");
            }
            SessionState::Idle | SessionState::Stopped => {}
        }

        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| PollerError::NoRuntime(job_id))?;

        session.cancel_timer();
        session.epoch += 1;
        session.state = SessionState::Polling;
        // Spawned under the session lock: the task cannot observe the session
        // before its handle is stored.
        let task = runtime.spawn(poll_loop(Arc::clone(&self.inner), session.epoch));
        session.timer = Some(task);

        info!(
            job_id = %job_id,
            interval_ms = self.inner.config.poll_interval.as_millis() as u64,
            "polling started"
        );
        Ok(())
    }

    /// Stop automatic polling; a fetch in flight is dropped.
    pub fn stop(&self) -> Result<(), PollerError> {
        let mut session = self.inner.lock_session();
        match session.state {
            SessionState::Disposed => Err(PollerError::Disposed(self.inner.job_id)),
            SessionState::Polling => {
                session.epoch += 1;
                session.state = SessionState::Stopped;
                session.cancel_timer();
                info!(job_id = %self.inner.job_id, "polling stopped");
                Ok(())
            }
            SessionState::Idle | SessionState::Stopped => Ok(()),
        }
    }

    /// Fetch once, out of band, without changing the session state.
    ///
    /// Waits for a scheduled fetch already in flight. Subscribers are notified
    /// as for any other fetch; a transport failure is also returned here.
    pub async fn refresh(&self) -> Result<Arc<JobSnapshot>, PollerError> {
        let job_id = self.inner.job_id;
        if self.session_state() == SessionState::Disposed {
            return Err(PollerError::Disposed(job_id));
        }

        match self.inner.fetch_once(Origin::Manual).await {
            FetchOutcome::Fetched(snapshot) => Ok(snapshot),
            FetchOutcome::Failed(error) => Err(PollerError::Fetch(error)),
            FetchOutcome::Discarded => Err(PollerError::Disposed(job_id)),
        }
    }

    /// Subscribe to every future snapshot and transient error.
    ///
    /// The channel is unbounded: a subscription that is kept alive must be
    /// drained, or it buffers one event per fetch until dropped. Subscribing
    /// to a disposed poller yields an already-closed subscription.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut session = self.inner.lock_session();
        if session.state != SessionState::Disposed {
            session.subscribers.push(tx);
        }
        Subscription { rx }
    }

    /// Callback form of [`subscribe`](Self::subscribe).
    ///
    /// Callbacks run on a spawned task, in event order. Once `dispose()` or
    /// [`ListenerHandle::unsubscribe`] returns, they are never invoked again,
    /// even for events still queued; a callback already running completes.
    pub fn subscribe_with<S, E>(
        &self,
        mut on_snapshot: S,
        mut on_transient_error: E,
    ) -> Result<ListenerHandle, PollerError>
    where
        S: FnMut(&Arc<JobSnapshot>) + Send + 'static,
        E: FnMut(&FetchError) + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| PollerError::NoRuntime(self.inner.job_id))?;

        let mut subscription = self.subscribe();
        let active = Arc::new(AtomicBool::new(true));
        let task = {
            let active = Arc::clone(&active);
            runtime.spawn(async move {
                while let Some(event) = subscription.recv().await {
                    if !active.load(Ordering::SeqCst) {
                        break;
                    }
                    match &event {
                        PollEvent::Snapshot(snapshot) => on_snapshot(snapshot),
                        PollEvent::TransientError(error) => on_transient_error(error),
                    }
                }
            })
        };

        let listener = Listener {
            active: Arc::clone(&active),
            task: task.abort_handle(),
        };
        let mut session = self.inner.lock_session();
        if session.state == SessionState::Disposed {
            listener.silence();
        } else {
            session.listeners.retain(|l| !l.task.is_finished());
            session.listeners.push(listener);
        }

        Ok(ListenerHandle { task, active })
    }

    /// Tear the session down: cancel the timer, drop in-flight results,
    /// close every subscription. Safe to call repeatedly and from any state.
    pub fn dispose(&self) {
        let mut session = self.inner.lock_session();
        if session.state == SessionState::Disposed {
            return;
        }

        session.state = SessionState::Disposed;
        session.epoch += 1;
        session.cancel_timer();
        session.subscribers.clear();
        for listener in session.listeners.drain(..) {
            listener.silence();
        }
        info!(job_id = %self.inner.job_id, "poller disposed");
    }
}

impl<F: SnapshotFetcher> Drop for JobPoller<F> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<F: SnapshotFetcher> core::fmt::Debug for JobPoller<F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("JobPoller")
            .field("job_id", &self.inner.job_id)
            .field("state", &self.session_state())
            .finish()
    }
}
