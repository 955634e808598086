//! Explicit ownership of route coordinators.
//!
//! One `RouteTracker` owns every coordinator task it started, keyed by
//! route ID. There is no ambient registry: whoever bootstraps tracking
//! holds the tracker and drives the start/stop lifecycle.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::{ConfigError, RouteConfig};
use crate::ldb::BoardFetcher;
use crate::subscriber::RouteSubscriber;

use super::RouteId;
use super::route::{CoordinatorConfig, RouteCoordinator, RouteHandle};

/// Errors from tracker lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// The route is already being tracked.
    #[error("route {0} is already tracked")]
    AlreadyTracked(RouteId),

    /// The route is not being tracked.
    #[error("route {0} is not tracked")]
    NotTracked(RouteId),

    /// The configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

struct TrackedRoute {
    handle: RouteHandle,
    task: JoinHandle<()>,
}

/// Owner of all route coordinators.
pub struct RouteTracker<F> {
    fetcher: Arc<F>,
    runtime: CoordinatorConfig,
    routes: HashMap<RouteId, TrackedRoute>,
}

impl<F: BoardFetcher + Send + Sync + 'static> RouteTracker<F> {
    /// Create a tracker over the given fetcher.
    pub fn new(fetcher: Arc<F>) -> Self {
        Self {
            fetcher,
            runtime: CoordinatorConfig::default(),
            routes: HashMap::new(),
        }
    }

    /// Override the coordinator runtime tuning.
    pub fn with_runtime(mut self, runtime: CoordinatorConfig) -> Self {
        self.runtime = runtime;
        self
    }

    /// Start tracking a route. The first cycle runs immediately.
    ///
    /// The configuration is re-validated here so a hand-assembled
    /// `RouteConfig` cannot smuggle broken values past the builders.
    pub fn start(
        &mut self,
        config: RouteConfig,
        subscribers: Vec<Arc<dyn RouteSubscriber>>,
    ) -> Result<RouteHandle, TrackerError> {
        config.validate().map_err(TrackerError::Config)?;

        let id = RouteId::for_route(config.origin, config.destination);
        if self.routes.contains_key(&id) {
            return Err(TrackerError::AlreadyTracked(id));
        }

        info!(route = %id, label = %config.label, "starting route tracking");

        let (coordinator, handle) = RouteCoordinator::new(
            config,
            self.runtime.clone(),
            self.fetcher.clone(),
            subscribers,
        );
        let task = tokio::spawn(coordinator.run());

        self.routes.insert(
            id,
            TrackedRoute {
                handle: handle.clone(),
                task,
            },
        );

        Ok(handle)
    }

    /// Handle for a tracked route.
    pub fn handle(&self, id: &RouteId) -> Option<&RouteHandle> {
        self.routes.get(id).map(|r| &r.handle)
    }

    /// IDs of all tracked routes.
    pub fn route_ids(&self) -> impl Iterator<Item = &RouteId> {
        self.routes.keys()
    }

    /// Number of tracked routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether no routes are tracked.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Stop tracking a route: cancel any pending wake-up and wait for
    /// the coordinator task to finish.
    pub async fn stop(&mut self, id: &RouteId) -> Result<(), TrackerError> {
        let route = self
            .routes
            .remove(id)
            .ok_or_else(|| TrackerError::NotTracked(id.clone()))?;

        info!(route = %id, "stopping route tracking");

        route.handle.shutdown().await;
        let _ = route.task.await;

        Ok(())
    }

    /// Stop every tracked route.
    pub async fn shutdown_all(&mut self) {
        let routes: Vec<TrackedRoute> = self.routes.drain().map(|(_, route)| route).collect();

        join_all(routes.into_iter().map(|route| async move {
            route.handle.shutdown().await;
            let _ = route.task.await;
        }))
        .await;
    }
}
