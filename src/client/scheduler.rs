//! Token refresh scheduler for long-lived clients.
//!
//! Keeps a session alive with two independent timers:
//! - a periodic timer (default every 12 hours) that always refreshes
//! - an idle timer that fires once activity has been quiet for a while (default 10 minutes) and
//!   only refreshes if the last successful refresh is older than the minimum interval
//!   (default 1 hour)
//!
//! Refreshes are single-flight: concurrent callers share the one in-flight request. Transient
//! failures are logged and retried on the next tick; only a definitive "session invalid"
//! moves the scheduler to `Failed`, cancels both timers and notifies observers.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use continuity::client::{HttpSessionRefresher, RefreshScheduler, RefreshSchedulerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let refresher = HttpSessionRefresher::new("https://app.example.com", "continuity_session", "token")?;
//! let mut scheduler = RefreshScheduler::new(Arc::new(refresher), RefreshSchedulerConfig::default());
//!
//! scheduler.start()?;
//! scheduler.record_activity();
//! // ... application runs ...
//! scheduler.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::client::error::{RefreshError, SchedulerError, SchedulerResult};
use crate::settings::RefreshSettings;
use crate::store::lock;

/// Performs one session refresh against the server
#[async_trait]
pub trait SessionRefresher: Send + Sync {
    /// # Errors
    ///
    /// `RefreshError::SessionInvalid` when the server rejects the session,
    /// `RefreshError::Transient` for anything worth retrying
    async fn refresh_session(&self) -> Result<(), RefreshError>;
}

/// Observable scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Scheduled,
    Refreshing,
    /// The session was rejected; the user must re-authenticate
    Failed,
}

/// What a `refresh` call ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed,
    /// Idle refresh skipped because the last one is recent enough
    Skipped,
    TransientFailure,
    SessionInvalid,
}

type InFlight = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Mutable refresh bookkeeping, always updated under one lock
#[derive(Default)]
struct RefreshState {
    last_refresh: Option<Instant>,
    in_flight: Option<InFlight>,
}

/// Configuration for the refresh scheduler
#[derive(Debug, Clone)]
pub struct RefreshSchedulerConfig {
    pub periodic_interval: Duration,
    /// Quiet period after the last activity before an idle refresh is considered
    pub idle_quiet_period: Duration,
    /// Idle refreshes are skipped if the last success is more recent than this
    pub min_refresh_interval: Duration,
    /// How long `stop()` waits for the timer tasks
    pub join_timeout: Duration,
}

impl Default for RefreshSchedulerConfig {
    fn default() -> Self {
        Self {
            periodic_interval: Duration::from_secs(12 * 60 * 60),
            idle_quiet_period: Duration::from_secs(10 * 60),
            min_refresh_interval: Duration::from_secs(60 * 60),
            join_timeout: Duration::from_secs(5),
        }
    }
}

impl RefreshSchedulerConfig {
    #[must_use]
    pub fn from_settings(settings: &RefreshSettings) -> Self {
        Self {
            periodic_interval: Duration::from_secs(
                settings.periodic_interval_hours.saturating_mul(60 * 60),
            ),
            idle_quiet_period: Duration::from_secs(settings.idle_quiet_minutes.saturating_mul(60)),
            min_refresh_interval: Duration::from_secs(
                settings.min_refresh_interval_minutes.saturating_mul(60),
            ),
            ..Self::default()
        }
    }
}

/// State shared between the scheduler handle and its timer tasks
struct Core {
    refresher: Arc<dyn SessionRefresher>,
    config: RefreshSchedulerConfig,
    refresh: Mutex<RefreshState>,
    state_tx: watch::Sender<SchedulerState>,
    running: AtomicBool,
    activity: Notify,
    cancel: Mutex<CancellationToken>,
}

impl Core {
    /// Join the in-flight refresh or start one
    fn begin_refresh(self: &Arc<Self>) -> InFlight {
        let mut state = lock(&self.refresh);
        if let Some(in_flight) = &state.in_flight {
            log::debug!("Joining in-flight session refresh");
            return in_flight.clone();
        }

        let core = Arc::clone(self);
        let future = async move { core.run_refresh().await }.boxed().shared();
        state.in_flight = Some(future.clone());
        future
    }

    async fn run_refresh(self: Arc<Self>) -> RefreshOutcome {
        self.state_tx.send_replace(SchedulerState::Refreshing);
        let result = self.refresher.refresh_session().await;

        let outcome = {
            let mut state = lock(&self.refresh);
            state.in_flight = None;
            match result {
                Ok(()) => {
                    state.last_refresh = Some(Instant::now());
                    RefreshOutcome::Refreshed
                }
                Err(RefreshError::Transient(reason)) => {
                    log::warn!("Session refresh failed, retrying on next tick: {reason}");
                    RefreshOutcome::TransientFailure
                }
                Err(RefreshError::SessionInvalid) => RefreshOutcome::SessionInvalid,
            }
        };

        if outcome == RefreshOutcome::SessionInvalid {
            log::info!("Session rejected by server; re-authentication required");
            self.running.store(false, Ordering::SeqCst);
            lock(&self.cancel).cancel();
            self.state_tx.send_replace(SchedulerState::Failed);
        } else {
            if outcome == RefreshOutcome::Refreshed {
                log::debug!("Session refreshed");
            }
            self.state_tx.send_replace(self.resting_state());
        }
        outcome
    }

    async fn refresh(self: &Arc<Self>) -> RefreshOutcome {
        self.begin_refresh().await
    }

    async fn refresh_if_stale(self: &Arc<Self>) -> RefreshOutcome {
        let in_flight = {
            let state = lock(&self.refresh);
            let stale = match state.last_refresh {
                Some(at) => at.elapsed() >= self.config.min_refresh_interval,
                None => true,
            };
            if !stale && state.in_flight.is_none() {
                log::debug!("Idle refresh skipped; last refresh is recent");
                return RefreshOutcome::Skipped;
            }
            state.in_flight.clone()
        };

        match in_flight {
            Some(in_flight) => in_flight.await,
            None => self.refresh().await,
        }
    }

    fn resting_state(&self) -> SchedulerState {
        if self.running.load(Ordering::SeqCst) {
            SchedulerState::Scheduled
        } else {
            SchedulerState::Idle
        }
    }
}

/// Keeps one client session alive
pub struct RefreshScheduler {
    core: Arc<Core>,
    tasks: Vec<JoinHandle<()>>,
}

impl RefreshScheduler {
    #[must_use]
    pub fn new(refresher: Arc<dyn SessionRefresher>, config: RefreshSchedulerConfig) -> Self {
        let (state_tx, _) = watch::channel(SchedulerState::Idle);
        Self {
            core: Arc::new(Core {
                refresher,
                config,
                refresh: Mutex::new(RefreshState::default()),
                state_tx,
                running: AtomicBool::new(false),
                activity: Notify::new(),
                cancel: Mutex::new(CancellationToken::new()),
            }),
            tasks: Vec::new(),
        }
    }

    /// Start both timers
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::AlreadyRunning` if the timers are active
    pub fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        log::info!("Starting session refresh scheduler");

        // Fresh token so the scheduler can be restarted after stop or failure
        let cancel = CancellationToken::new();
        *lock(&self.core.cancel) = cancel.clone();
        self.tasks.clear();

        // The session presented at start is treated as freshly refreshed
        lock(&self.core.refresh)
            .last_refresh
            .get_or_insert_with(Instant::now);

        self.core.running.store(true, Ordering::SeqCst);
        self.core.state_tx.send_replace(SchedulerState::Scheduled);

        self.tasks.push(tokio::spawn(Self::periodic_loop(
            Arc::clone(&self.core),
            cancel.clone(),
        )));
        self.tasks
            .push(tokio::spawn(Self::idle_loop(Arc::clone(&self.core), cancel)));

        Ok(())
    }

    /// Cancel both timers and wait for them to finish
    ///
    /// # Errors
    ///
    /// - `SchedulerError::NotRunning` if the scheduler was never started
    /// - `SchedulerError::JoinTimeout` if the tasks outlive the join timeout
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if self.tasks.is_empty() {
            return Err(SchedulerError::NotRunning);
        }

        log::info!("Stopping session refresh scheduler");
        self.core.running.store(false, Ordering::SeqCst);
        lock(&self.core.cancel).cancel();

        let join_timeout = self.core.config.join_timeout;
        for handle in self.tasks.drain(..) {
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|_| SchedulerError::JoinTimeout(join_timeout))?
                .map_err(|e| SchedulerError::TaskJoinFailed(e.to_string()))?;
        }

        if self.state() != SchedulerState::Failed {
            self.core.state_tx.send_replace(SchedulerState::Idle);
        }
        Ok(())
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.core.running.load(Ordering::SeqCst)
    }

    /// Report user activity; restarts the idle quiet period
    ///
    /// No-op while the scheduler is not running.
    pub fn record_activity(&self) {
        if self.is_running() {
            self.core.activity.notify_one();
        }
    }

    /// Refresh now, or join the refresh already in flight
    pub async fn refresh(&self) -> RefreshOutcome {
        self.core.refresh().await
    }

    #[must_use]
    pub fn state(&self) -> SchedulerState {
        *self.core.state_tx.borrow()
    }

    /// Observe state transitions, e.g. to redirect to login on `Failed`
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.core.state_tx.subscribe()
    }

    #[must_use]
    pub fn last_refresh(&self) -> Option<Instant> {
        lock(&self.core.refresh).last_refresh
    }

    async fn periodic_loop(core: Arc<Core>, cancel: CancellationToken) {
        let period = core.config.periodic_interval;
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    log::debug!("Periodic refresh timer cancelled");
                    break;
                }
                _ = interval.tick() => {
                    // A cancelled stop must not wait on a slow request
                    tokio::select! {
                        () = cancel.cancelled() => {
                            log::debug!("Periodic refresh timer cancelled mid-refresh");
                            break;
                        }
                        _ = core.refresh() => {}
                    }
                }
            }
        }
    }

    async fn idle_loop(core: Arc<Core>, cancel: CancellationToken) {
        let quiet = core.config.idle_quiet_period;

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                () = core.activity.notified() => {}
            }

            // Debounce: every new activity restarts the quiet period
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        log::debug!("Idle refresh timer cancelled");
                        return;
                    }
                    () = core.activity.notified() => {}
                    () = tokio::time::sleep(quiet) => break,
                }
            }

            tokio::select! {
                () = cancel.cancelled() => {
                    log::debug!("Idle refresh timer cancelled mid-refresh");
                    return;
                }
                _ = core.refresh_if_stale() => {}
            }
        }
        log::debug!("Idle refresh timer cancelled");
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.core.running.store(false, Ordering::SeqCst);
        lock(&self.core.cancel).cancel();
    }
}
