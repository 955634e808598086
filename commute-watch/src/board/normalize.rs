//! Normalization of raw departure boards into service facts.
//!
//! Individual entries that are missing required fields are dropped with
//! a warning; the batch only fails when a non-empty board yields no
//! usable entry at all, which the coordinator treats as a transient
//! upstream failure.

use tracing::warn;

use crate::domain::BoardTime;
use crate::ldb::{ServiceItem, StationBoard};

use super::fact::ServiceFact;

/// Error for a board that could not be normalized at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    /// Every entry on a non-empty board was malformed.
    #[error("no usable entries on the board ({dropped} of {total} dropped)")]
    MalformedBoard { total: usize, dropped: usize },
}

/// Error for a single board entry, logged and counted, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
enum MalformedEntry {
    #[error("missing service ID")]
    MissingServiceId,

    #[error("missing scheduled departure")]
    MissingDeparture,

    #[error("unparseable scheduled departure {0:?}")]
    BadDeparture(String),
}

/// A normalized departure board.
#[derive(Debug, Clone)]
pub struct NormalizedBoard {
    /// Usable services in upstream (departure) order.
    pub facts: Vec<ServiceFact>,

    /// Display name of the origin station, as reported upstream.
    pub origin_name: Option<String>,

    /// Display name of the destination station.
    pub destination_name: Option<String>,

    /// Operational messages attached to the board.
    pub messages: Vec<String>,

    /// Entry count before any dropping.
    pub total_found: usize,

    /// Entries dropped as malformed.
    pub dropped: usize,
}

/// Normalize a raw board into service facts.
///
/// `previous` is the fact list of the coordinator's still-valid previous
/// snapshot, used for platform-change detection: a service whose platform
/// differs from the one observed for the same `service_id` last cycle is
/// flagged, with the old platform retained. A service seen for the first
/// time is never flagged.
pub fn normalize(
    raw: &StationBoard,
    previous: Option<&[ServiceFact]>,
) -> Result<NormalizedBoard, NormalizeError> {
    let items = raw.services();
    let total_found = items.len();

    let mut facts = Vec::with_capacity(items.len());
    let mut dropped = 0usize;

    for item in items {
        match normalize_entry(item) {
            Ok(mut fact) => {
                detect_platform_change(&mut fact, previous);
                facts.push(fact);
            }
            Err(reason) => {
                warn!(
                    service_id = item.service_id.as_deref().unwrap_or("<unknown>"),
                    %reason,
                    "dropping malformed board entry"
                );
                dropped += 1;
            }
        }
    }

    if total_found > 0 && facts.is_empty() {
        return Err(NormalizeError::MalformedBoard {
            total: total_found,
            dropped,
        });
    }

    let messages = raw
        .nrcc_messages
        .iter()
        .flatten()
        .filter_map(|m| m.value.clone())
        .collect();

    Ok(NormalizedBoard {
        facts,
        origin_name: raw.location_name.clone(),
        destination_name: raw.filter_location_name.clone(),
        messages,
        total_found,
        dropped,
    })
}

/// Normalize one board entry.
fn normalize_entry(item: &ServiceItem) -> Result<ServiceFact, MalformedEntry> {
    let service_id = item
        .service_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or(MalformedEntry::MissingServiceId)?
        .to_string();

    let std_str = item
        .std
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(MalformedEntry::MissingDeparture)?;
    let scheduled_departure = BoardTime::parse(std_str)
        .map_err(|_| MalformedEntry::BadDeparture(std_str.to_string()))?;

    let etd = item.etd.as_deref().unwrap_or("On time");
    let is_cancelled = item.is_cancelled.unwrap_or(false) || etd.eq_ignore_ascii_case("cancelled");

    // "On time", "Delayed" (no estimate yet) and "Cancelled" all fall
    // back to the scheduled time; only a parseable "HH:MM" moves it.
    let expected_departure = BoardTime::parse(etd).unwrap_or(scheduled_departure);

    let (scheduled_arrival, estimated_arrival, calling_points) = parse_calling_points(item);

    let cancellation_reason = if is_cancelled {
        non_empty(item.cancel_reason.as_deref()).or(non_empty(item.delay_reason.as_deref()))
    } else {
        None
    };
    let delay_reason = if is_cancelled {
        None
    } else {
        non_empty(item.delay_reason.as_deref())
    };

    let destination = item
        .destination
        .iter()
        .flatten()
        .next()
        .map(|loc| loc.location_name.clone())
        .unwrap_or_else(|| "Unknown".to_string());

    Ok(ServiceFact {
        service_id,
        scheduled_departure,
        expected_departure,
        scheduled_arrival,
        estimated_arrival,
        platform: non_empty(item.platform.as_deref()),
        platform_changed: false,
        previous_platform: None,
        operator: item.operator.clone().unwrap_or_default(),
        destination,
        is_cancelled,
        cancellation_reason,
        delay_reason,
        calling_points,
    })
}

/// Extract arrival times and stop names from the calling-point list.
///
/// The final calling point is the destination, so its times are the
/// arrival pair. An "On time" estimate maps to the scheduled time.
fn parse_calling_points(
    item: &ServiceItem,
) -> (Option<BoardTime>, Option<BoardTime>, Vec<String>) {
    let calls = match item.subsequent_calling_points.as_deref() {
        Some([first, ..]) => &first.calling_point,
        _ => return (None, None, Vec::new()),
    };

    let names = calls.iter().map(|cp| cp.location_name.clone()).collect();

    let Some(last) = calls.last() else {
        return (None, None, names);
    };

    let scheduled = last.st.as_deref().and_then(|s| BoardTime::parse(s).ok());
    let estimated = last
        .et
        .as_deref()
        .and_then(|s| BoardTime::parse(s).ok())
        .or(scheduled);

    (scheduled, estimated, names)
}

/// Flag a platform change against the previous snapshot's facts.
fn detect_platform_change(fact: &mut ServiceFact, previous: Option<&[ServiceFact]>) {
    let Some(previous) = previous else { return };
    let Some(seen) = previous.iter().find(|p| p.service_id == fact.service_id) else {
        return;
    };

    if seen.platform != fact.platform {
        fact.platform_changed = true;
        fact.previous_platform = seen.platform.clone();
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.filter(|s| !s.is_empty()).map(str::to_string)
}
