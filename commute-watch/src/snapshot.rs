//! Immutable per-cycle snapshots.
//!
//! One successful fetch-classify cycle produces one `Snapshot`, handed
//! to subscribers behind an `Arc` and never mutated afterwards. A failed
//! cycle keeps the previous snapshot in place; it only ages into
//! staleness, it is never edited.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::board::{NormalizedBoard, ServiceFact};
use crate::classify::{AggregateStatus, Classification, StatusCounts};
use crate::config::RouteConfig;
use crate::domain::{BoardTime, Crs};

/// Immutable result of one successful classification cycle.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    /// Origin station.
    pub origin: Crs,

    /// Destination station.
    pub destination: Crs,

    /// Display name of the origin, as reported upstream.
    pub origin_name: String,

    /// Display name of the destination.
    pub destination_name: String,

    /// Tracked services in upstream departure order, truncated to the
    /// configured count.
    pub facts: Vec<ServiceFact>,

    /// Services on the raw board before truncation and dropping.
    pub total_services_found: usize,

    /// Aggregate route status.
    pub status: AggregateStatus,

    /// Per-category counts over the tracked services.
    pub counts: StatusCounts,

    /// Largest delay among non-cancelled tracked services.
    pub max_delay_minutes: u32,

    /// Distinct disruption reasons, first-occurrence order.
    pub reasons: Vec<String>,

    /// Upstream operational messages.
    pub messages: Vec<String>,

    /// Human-readable one-line summary.
    pub summary: String,

    /// When the underlying board was fetched.
    pub fetched_at: DateTime<Utc>,
}

impl Snapshot {
    /// Assemble a snapshot from a normalized board and its classification.
    ///
    /// `classification` must have been computed over exactly
    /// `board.facts`, already truncated by the coordinator.
    pub fn assemble(
        config: &RouteConfig,
        board: NormalizedBoard,
        classification: Classification,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        let summary = summary_line(&classification.counts);

        Self {
            origin: config.origin,
            destination: config.destination,
            origin_name: board
                .origin_name
                .unwrap_or_else(|| config.origin.to_string()),
            destination_name: board
                .destination_name
                .unwrap_or_else(|| config.destination.to_string()),
            facts: board.facts,
            total_services_found: board.total_found,
            status: classification.status,
            counts: classification.counts,
            max_delay_minutes: classification.max_delay_minutes,
            reasons: classification.reasons,
            messages: board.messages,
            summary,
            fetched_at,
        }
    }

    /// Whether this snapshot has gone stale: its age exceeds the current
    /// scheduled interval by more than one full cycle.
    pub fn is_stale(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        let age = now.signed_duration_since(self.fetched_at);
        match chrono::Duration::from_std(interval.saturating_mul(2)) {
            Ok(allowed) => age > allowed,
            // An interval too large for chrono means the snapshot can't age out
            Err(_) => false,
        }
    }

    /// Services for display: everything that has not yet departed.
    ///
    /// The departed filter applies only here. Aggregate classification
    /// already ran over the unfiltered list, so counts stay consistent
    /// within the active time window.
    pub fn departure_list(&self, now: BoardTime) -> Vec<&ServiceFact> {
        self.facts.iter().filter(|f| !f.has_departed(now)).collect()
    }

    /// The next service a passenger could still catch: first fact that
    /// is neither departed nor cancelled.
    pub fn next_service(&self, now: BoardTime) -> Option<&ServiceFact> {
        self.facts
            .iter()
            .find(|f| !f.is_cancelled && !f.has_departed(now))
    }
}

/// One-line human summary of the counts.
fn summary_line(counts: &StatusCounts) -> String {
    let total = counts.on_time + counts.delayed + counts.cancelled;
    let trains = |n: usize| if n == 1 { "train" } else { "trains" };

    if total == 0 {
        return "No trains found".to_string();
    }

    if counts.cancelled > 0 && counts.delayed > 0 {
        return "Severe disruptions".to_string();
    }

    if counts.cancelled > 0 {
        if counts.cancelled == total {
            return "All trains cancelled".to_string();
        }
        return format!("{} {} cancelled", counts.cancelled, trains(counts.cancelled));
    }

    if counts.delayed > 0 {
        if counts.delayed == total {
            return "All trains delayed".to_string();
        }
        let running = counts.on_time + counts.delayed;
        return format!(
            "{} {} running, {} delayed",
            running,
            trains(running),
            counts.delayed
        );
    }

    format!("{} {} on time", counts.on_time, trains(counts.on_time))
}
