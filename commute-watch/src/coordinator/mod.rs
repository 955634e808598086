//! Per-route update coordination.
//!
//! Each tracked route runs one independent coordinator task that cycles
//! fetch → normalize → classify → publish, re-arming its own timer from
//! the schedule policy. Transient upstream failures back off
//! exponentially with jitter while the last-good snapshot keeps being
//! served; authentication failures park the route until a manual
//! refresh after reconfiguration. The [`RouteTracker`] owns the tasks
//! and their explicit start/stop lifecycle.

mod route;
#[cfg(test)]
mod route_tests;
mod tracker;

use std::fmt;

use crate::domain::Crs;

pub use route::{Availability, CoordinatorConfig, RouteHandle, RouteStatus};
pub use tracker::{RouteTracker, TrackerError};

/// Identifier for a tracked route, derived from the station pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteId(String);

impl RouteId {
    /// Build the identifier for an origin/destination pair.
    pub fn for_route(origin: Crs, destination: Crs) -> Self {
        RouteId(format!("{origin}-{destination}"))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Failure surfaced to subscribers after a failed cycle.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RouteError {
    /// Upstream rejected the API key. Terminal for the route: no
    /// automatic retry until configuration changes and a manual
    /// refresh wakes it.
    #[error("authentication rejected; check the API key")]
    Auth,

    /// A retryable failure; the coordinator is backing off.
    #[error("transient upstream failure ({consecutive_failures} consecutive): {message}")]
    Transient {
        consecutive_failures: u32,
        message: String,
    },
}
