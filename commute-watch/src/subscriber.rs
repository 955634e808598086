//! Subscriber interface for route state changes.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::coordinator::{RouteError, RouteId};
use crate::snapshot::Snapshot;

/// Receiver of coordinator notifications.
///
/// Both callbacks run on the coordinator task and must return promptly;
/// a subscriber that needs to do real work should hand the `Arc` off to
/// its own task or channel. Snapshots are immutable once published, so
/// holding them needs no locking.
pub trait RouteSubscriber: Send + Sync {
    /// A new snapshot replaced the previous one.
    fn on_snapshot_updated(&self, route: &RouteId, snapshot: &Arc<Snapshot>);

    /// A cycle failed. The previous snapshot, if any, is still served.
    fn on_route_error(&self, route: &RouteId, error: &RouteError);
}

/// Subscriber that logs every notification via `tracing`.
#[derive(Debug, Default)]
pub struct LogSubscriber;

impl RouteSubscriber for LogSubscriber {
    fn on_snapshot_updated(&self, route: &RouteId, snapshot: &Arc<Snapshot>) {
        info!(
            route = %route,
            status = %snapshot.status,
            max_delay = snapshot.max_delay_minutes,
            "{}",
            snapshot.summary
        );

        if let Ok(json) = serde_json::to_string(snapshot.as_ref()) {
            debug!(route = %route, "snapshot: {json}");
        }
    }

    fn on_route_error(&self, route: &RouteId, error: &RouteError) {
        warn!(route = %route, "route error: {error}");
    }
}
