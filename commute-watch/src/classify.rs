//! Disruption classification.
//!
//! A pure function from service facts and thresholds to an aggregate
//! status plus derived counts and reasons. Deterministic: identical
//! input yields identical output, and reordering the input can only
//! reorder the reasons list, never change a count or the status.

use serde::Serialize;

use crate::board::ServiceFact;
use crate::config::ThresholdConfig;

/// Aggregate route status, totally ordered by severity.
///
/// `Critical` is reserved for cancellations and outranks any
/// delay-derived level regardless of delay magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum AggregateStatus {
    Normal,
    Minor,
    Major,
    Severe,
    Critical,
}

impl AggregateStatus {
    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            AggregateStatus::Normal => "Normal",
            AggregateStatus::Minor => "Minor delays",
            AggregateStatus::Major => "Major delays",
            AggregateStatus::Severe => "Severe delays",
            AggregateStatus::Critical => "Cancellations",
        }
    }
}

impl std::fmt::Display for AggregateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-category service counts.
///
/// The threshold bands are cumulative: a service whose delay crosses the
/// major threshold also counts toward `minor`. `delayed` is independent
/// of thresholds entirely: any non-cancelled service a minute or more
/// late counts, which keeps it from undercounting when thresholds sit
/// above one minute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    /// Non-cancelled services with zero delay.
    pub on_time: usize,

    /// Non-cancelled services with any delay at all (≥ 1 minute).
    pub delayed: usize,

    /// Non-cancelled services at or past the minor threshold.
    pub minor: usize,

    /// Non-cancelled services at or past the major threshold.
    pub major: usize,

    /// Cancelled services.
    pub cancelled: usize,
}

/// Result of one classification pass.
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    /// Aggregate status for the route.
    pub status: AggregateStatus,

    /// Per-category counts.
    pub counts: StatusCounts,

    /// Largest delay among non-cancelled services, zero when none.
    pub max_delay_minutes: u32,

    /// Distinct cancellation and delay reasons, first-occurrence order.
    pub reasons: Vec<String>,
}

/// Error from classification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifyError {
    /// The threshold hierarchy does not hold. Broken configurations are
    /// rejected here rather than silently clamped.
    #[error("invalid threshold hierarchy: severe {severe} >= major {major} >= minor {minor} >= 1 must hold")]
    InvalidThresholds { severe: u32, major: u32, minor: u32 },
}

/// Classify a list of service facts against the thresholds.
///
/// Cancellation is orthogonal to delay: cancelled services contribute to
/// `cancelled` (and force `Critical`) but are never consulted for delay.
pub fn classify(
    facts: &[ServiceFact],
    thresholds: &ThresholdConfig,
) -> Result<Classification, ClassifyError> {
    if !thresholds.is_valid() {
        return Err(ClassifyError::InvalidThresholds {
            severe: thresholds.severe_minutes,
            major: thresholds.major_minutes,
            minor: thresholds.minor_minutes,
        });
    }

    fn note_reason(reason: &Option<String>, reasons: &mut Vec<String>) {
        if let Some(reason) = reason {
            if !reasons.iter().any(|r| r == reason) {
                reasons.push(reason.clone());
            }
        }
    }

    let mut counts = StatusCounts::default();
    let mut max_delay_minutes = 0u32;
    let mut reasons: Vec<String> = Vec::new();

    for fact in facts {
        if fact.is_cancelled {
            counts.cancelled += 1;
            note_reason(&fact.cancellation_reason, &mut reasons);
            continue;
        }

        let delay = fact.delay_minutes();
        max_delay_minutes = max_delay_minutes.max(delay);

        if delay >= 1 {
            counts.delayed += 1;
        } else {
            counts.on_time += 1;
        }
        if delay >= thresholds.minor_minutes {
            counts.minor += 1;
        }
        if delay >= thresholds.major_minutes {
            counts.major += 1;
        }

        note_reason(&fact.delay_reason, &mut reasons);
    }

    let status = if counts.cancelled > 0 {
        AggregateStatus::Critical
    } else if max_delay_minutes >= thresholds.severe_minutes {
        AggregateStatus::Severe
    } else if max_delay_minutes >= thresholds.major_minutes {
        AggregateStatus::Major
    } else if max_delay_minutes >= thresholds.minor_minutes {
        AggregateStatus::Minor
    } else {
        AggregateStatus::Normal
    };

    Ok(Classification {
        status,
        counts,
        max_delay_minutes,
        reasons,
    })
}
