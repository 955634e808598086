//! The per-route coordinator task.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveTime, Utc};
use rand::Rng;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, warn};

use crate::board::{NormalizeError, normalize};
use crate::classify::{ClassifyError, classify};
use crate::config::RouteConfig;
use crate::ldb::{BoardFetcher, BoardQuery, StationBoard};
use crate::schedule::{self, OFF_PEAK_INTERVAL, PollPlan};
use crate::snapshot::Snapshot;
use crate::subscriber::RouteSubscriber;

use super::{RouteError, RouteId};

/// Cap on the backoff exponent so the doubling cannot overflow.
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Runtime tuning for a coordinator, independent of route configuration.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// First backoff delay after a transient failure.
    pub backoff_base: Duration,

    /// Upper bound on the backoff delay.
    pub backoff_cap: Duration,

    /// Command channel depth per route.
    pub command_buffer: usize,

    /// Source of the local time of day fed to the schedule policy.
    pub local_time: fn() -> NaiveTime,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            backoff_base: Duration::from_secs(10),
            backoff_cap: Duration::from_secs(15 * 60),
            command_buffer: 8,
            local_time: || chrono::Local::now().time(),
        }
    }
}

/// Capped exponential backoff.
#[derive(Debug, Clone, Copy)]
struct BackoffPolicy {
    base: Duration,
    cap: Duration,
}

impl BackoffPolicy {
    /// Delay before the next attempt, given the failures seen so far.
    /// Doubles per failure and caps; jitter is added when arming.
    fn delay_for(&self, consecutive_failures: u32) -> Duration {
        let exponent = consecutive_failures.min(MAX_BACKOFF_EXPONENT);
        self.base.saturating_mul(1u32 << exponent).min(self.cap)
    }
}

/// Add up to 25% uniform jitter so synchronized routes fan out.
fn jittered(delay: Duration) -> Duration {
    let quarter = delay / 4;
    if quarter.is_zero() {
        return delay;
    }
    delay + rand::thread_rng().gen_range(Duration::ZERO..=quarter)
}

/// Commands a handle can send to its coordinator task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Refresh,
    Shutdown,
}

/// How well the route is currently observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// No cycle has ever succeeded; there is nothing to serve.
    Unavailable,

    /// The snapshot is within its freshness window.
    Fresh,

    /// The snapshot outlived its interval by more than one full cycle.
    Stale,
}

/// Externally observable coordinator state, published on every cycle.
#[derive(Debug, Clone)]
pub struct RouteStatus {
    /// Last successful snapshot, if any cycle has ever succeeded.
    pub snapshot: Option<Arc<Snapshot>>,

    /// Currently scheduled refresh interval.
    pub interval: Duration,

    /// Transient failures since the last success.
    pub consecutive_failures: u32,

    /// Whether the schedule policy has suspended polling.
    pub suspended: bool,

    /// Whether the route is parked on an authentication failure.
    pub auth_failed: bool,
}

impl RouteStatus {
    /// Availability of the served snapshot at `now`.
    pub fn availability(&self, now: chrono::DateTime<Utc>) -> Availability {
        match &self.snapshot {
            None => Availability::Unavailable,
            Some(snapshot) if snapshot.is_stale(now, self.interval) => Availability::Stale,
            Some(_) => Availability::Fresh,
        }
    }

    /// Whether the served snapshot has gone stale. A route with no
    /// snapshot at all is unavailable, not stale.
    pub fn is_stale(&self, now: chrono::DateTime<Utc>) -> bool {
        self.availability(now) == Availability::Stale
    }
}

/// Handle to a running route coordinator.
#[derive(Debug, Clone)]
pub struct RouteHandle {
    id: RouteId,
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<RouteStatus>,
}

impl RouteHandle {
    /// The route this handle controls.
    pub fn id(&self) -> &RouteId {
        &self.id
    }

    /// Force an immediate refresh, bypassing backoff and schedule.
    ///
    /// Coalesces with any cycle already in flight. Returns `false` if
    /// the coordinator has already shut down.
    pub async fn refresh(&self) -> bool {
        self.commands.send(Command::Refresh).await.is_ok()
    }

    /// Current coordinator state.
    pub fn status(&self) -> RouteStatus {
        self.status.borrow().clone()
    }

    /// Last successful snapshot, `None` while the route has never
    /// completed a cycle.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.status.borrow().snapshot.clone()
    }

    /// Wait until the coordinator publishes a state change.
    pub async fn changed(&mut self) -> bool {
        self.status.changed().await.is_ok()
    }

    /// Ask the coordinator to stop. Delivery failure means it already has.
    pub(super) async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }
}

/// What the run loop should wait for next.
enum Wait {
    /// Re-enter `Fetching` after this delay, unless a command arrives.
    After(Duration),

    /// Wait for a command only (suspended or auth-parked).
    Forever,
}

/// Why a fetched board could not become a snapshot.
#[derive(Debug, thiserror::Error)]
enum CycleError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Classify(#[from] ClassifyError),
}

/// Mutable per-route coordinator state.
struct PollState {
    interval: Duration,
    consecutive_failures: u32,
    snapshot: Option<Arc<Snapshot>>,
    suspended: bool,
    auth_failed: bool,
}

impl PollState {
    fn to_status(&self) -> RouteStatus {
        RouteStatus {
            snapshot: self.snapshot.clone(),
            interval: self.interval,
            consecutive_failures: self.consecutive_failures,
            suspended: self.suspended,
            auth_failed: self.auth_failed,
        }
    }
}

/// The coordinator task for one route.
pub(super) struct RouteCoordinator<F> {
    id: RouteId,
    config: RouteConfig,
    runtime: CoordinatorConfig,
    backoff: BackoffPolicy,
    fetcher: Arc<F>,
    subscribers: Vec<Arc<dyn RouteSubscriber>>,
    commands: mpsc::Receiver<Command>,
    status_tx: watch::Sender<RouteStatus>,
    state: PollState,
}

impl<F: BoardFetcher + Send + Sync + 'static> RouteCoordinator<F> {
    /// Build a coordinator and the handle controlling it.
    pub(super) fn new(
        config: RouteConfig,
        runtime: CoordinatorConfig,
        fetcher: Arc<F>,
        subscribers: Vec<Arc<dyn RouteSubscriber>>,
    ) -> (Self, RouteHandle) {
        let id = RouteId::for_route(config.origin, config.destination);

        let state = PollState {
            interval: OFF_PEAK_INTERVAL,
            consecutive_failures: 0,
            snapshot: None,
            suspended: false,
            auth_failed: false,
        };

        let (command_tx, command_rx) = mpsc::channel(runtime.command_buffer.max(1));
        let (status_tx, status_rx) = watch::channel(state.to_status());

        let handle = RouteHandle {
            id: id.clone(),
            commands: command_tx,
            status: status_rx,
        };

        let backoff = BackoffPolicy {
            base: runtime.backoff_base,
            cap: runtime.backoff_cap,
        };

        let coordinator = Self {
            id,
            config,
            runtime,
            backoff,
            fetcher,
            subscribers,
            commands: command_rx,
            status_tx,
            state,
        };

        (coordinator, handle)
    }

    /// Drive the route until shutdown. The first cycle runs immediately.
    pub(super) async fn run(mut self) {
        let mut wait = self.cycle().await;

        loop {
            if self.coalesce_pending_refreshes() {
                break;
            }

            let command = match wait {
                Wait::After(delay) => {
                    tokio::select! {
                        command = self.commands.recv() => command,
                        _ = tokio::time::sleep(delay) => {
                            wait = self.cycle().await;
                            continue;
                        }
                    }
                }
                Wait::Forever => self.commands.recv().await,
            };

            match command {
                // Manual refresh: run now, bypassing any pending wait
                Some(Command::Refresh) => wait = self.cycle().await,
                Some(Command::Shutdown) | None => break,
            }
        }

        debug!(route = %self.id, "coordinator stopped");
    }

    /// Drop refresh requests that arrived while a cycle was in flight;
    /// they are satisfied by the cycle that just ran. Returns true when
    /// a shutdown was queued instead.
    fn coalesce_pending_refreshes(&mut self) -> bool {
        loop {
            match self.commands.try_recv() {
                Ok(Command::Refresh) => continue,
                Ok(Command::Shutdown) => return true,
                Err(_) => return false,
            }
        }
    }

    /// One fetch-classify-publish cycle.
    async fn cycle(&mut self) -> Wait {
        let query = BoardQuery {
            origin: self.config.origin,
            destination: self.config.destination,
            time_window_minutes: self.config.time_window_minutes,
            num_services: self.config.num_services,
        };

        debug!(route = %self.id, "fetching departure board");

        // Every cycle wants a live answer; a manual refresh must never
        // see a transport-cached body.
        match self.fetcher.fetch_departure_board(&query, true).await {
            Ok(raw) => match self.build_snapshot(&raw) {
                Ok(snapshot) => self.on_success(snapshot),
                Err(e) => self.on_transient_failure(e.to_string()),
            },
            Err(e) if e.is_transient() => self.on_transient_failure(e.to_string()),
            Err(_) => self.on_auth_failure(),
        }
    }

    /// Normalize and classify a fetched board.
    fn build_snapshot(&self, raw: &StationBoard) -> Result<Arc<Snapshot>, CycleError> {
        let previous = self.state.snapshot.as_deref().map(|s| s.facts.as_slice());

        let mut board = normalize(raw, previous)?;
        board.facts.truncate(usize::from(self.config.num_services));

        let classification = classify(&board.facts, &self.config.thresholds)?;

        Ok(Arc::new(Snapshot::assemble(
            &self.config,
            board,
            classification,
            Utc::now(),
        )))
    }

    fn on_success(&mut self, snapshot: Arc<Snapshot>) -> Wait {
        self.state.consecutive_failures = 0;
        self.state.auth_failed = false;
        self.state.snapshot = Some(snapshot.clone());

        let plan = schedule::next_interval((self.runtime.local_time)(), self.config.night_updates);
        let wait = match plan {
            PollPlan::Every(interval) => {
                self.state.interval = interval;
                self.state.suspended = false;
                Wait::After(interval)
            }
            PollPlan::Suspend => {
                self.state.suspended = true;
                Wait::Forever
            }
        };

        self.publish_status();
        for subscriber in &self.subscribers {
            subscriber.on_snapshot_updated(&self.id, &snapshot);
        }

        debug!(
            route = %self.id,
            status = %snapshot.status,
            suspended = self.state.suspended,
            "cycle complete"
        );

        wait
    }

    fn on_transient_failure(&mut self, message: String) -> Wait {
        let delay = self.backoff.delay_for(self.state.consecutive_failures);
        self.state.consecutive_failures += 1;

        warn!(
            route = %self.id,
            failures = self.state.consecutive_failures,
            retry_in = ?delay,
            "cycle failed: {message}"
        );

        let error = RouteError::Transient {
            consecutive_failures: self.state.consecutive_failures,
            message,
        };

        self.publish_status();
        for subscriber in &self.subscribers {
            subscriber.on_route_error(&self.id, &error);
        }

        Wait::After(jittered(delay))
    }

    fn on_auth_failure(&mut self) -> Wait {
        error!(route = %self.id, "authentication rejected; route parked until manual refresh");

        self.state.auth_failed = true;

        self.publish_status();
        for subscriber in &self.subscribers {
            subscriber.on_route_error(&self.id, &RouteError::Auth);
        }

        Wait::Forever
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(self.state.to_status());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(base_secs: u64, cap_secs: u64) -> BackoffPolicy {
        BackoffPolicy {
            base: Duration::from_secs(base_secs),
            cap: Duration::from_secs(cap_secs),
        }
    }

    #[test]
    fn backoff_doubles_per_failure() {
        let backoff = policy(10, 900);

        assert_eq!(backoff.delay_for(0), Duration::from_secs(10));
        assert_eq!(backoff.delay_for(1), Duration::from_secs(20));
        assert_eq!(backoff.delay_for(2), Duration::from_secs(40));
        assert_eq!(backoff.delay_for(3), Duration::from_secs(80));
    }

    #[test]
    fn backoff_caps() {
        let backoff = policy(10, 900);

        assert_eq!(backoff.delay_for(7), Duration::from_secs(900));
        assert_eq!(backoff.delay_for(30), Duration::from_secs(900));
    }

    #[test]
    fn backoff_strictly_increases_below_cap() {
        let backoff = policy(10, 900);
        let mut previous = Duration::ZERO;
        for failures in 0..6 {
            let delay = backoff.delay_for(failures);
            assert!(delay > previous, "delay should grow at {failures} failures");
            previous = delay;
        }
    }

    #[test]
    fn jitter_bounded_by_a_quarter() {
        let delay = Duration::from_secs(100);
        for _ in 0..50 {
            let sample = jittered(delay);
            assert!(sample >= delay);
            assert!(sample <= delay + Duration::from_secs(25));
        }
    }

    #[test]
    fn jitter_on_zero_delay() {
        assert_eq!(jittered(Duration::ZERO), Duration::ZERO);
    }
}
