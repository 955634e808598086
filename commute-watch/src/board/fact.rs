//! Normalized per-service facts.

use serde::Serialize;

use crate::domain::BoardTime;

/// Grace period after the expected departure before a service counts as
/// departed, covering update lag.
pub const DEPARTED_GRACE_MINUTES: i64 = 2;

/// Per-service status derived from cancellation and computed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    OnTime,
    Delayed,
    Cancelled,
}

/// One scheduled run between the tracked origin and destination.
///
/// Delay is never stored: it is always computed from the scheduled and
/// expected departure pair, so the two can never diverge.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceFact {
    /// Opaque upstream service ID, unique within one snapshot.
    pub service_id: String,

    /// Scheduled departure from the origin.
    pub scheduled_departure: BoardTime,

    /// Expected departure; equals scheduled when running on time.
    pub expected_departure: BoardTime,

    /// Scheduled arrival at the destination, from the final calling point.
    pub scheduled_arrival: Option<BoardTime>,

    /// Estimated arrival at the destination.
    pub estimated_arrival: Option<BoardTime>,

    /// Platform at the origin; `None` while still to be advised.
    pub platform: Option<String>,

    /// Whether the platform differs from the one observed for this
    /// service in the previous snapshot.
    pub platform_changed: bool,

    /// The previously observed platform, present only on a change.
    pub previous_platform: Option<String>,

    /// Train operating company name.
    pub operator: String,

    /// Display name of the service's destination.
    pub destination: String,

    /// Whether the service is cancelled.
    pub is_cancelled: bool,

    /// Reason for cancellation; only ever set on a cancelled service.
    pub cancellation_reason: Option<String>,

    /// Reason for delay; never set on a cancelled service.
    pub delay_reason: Option<String>,

    /// Stops after the origin, in calling order.
    pub calling_points: Vec<String>,
}

impl ServiceFact {
    /// Delay in whole minutes, computed from the departure time pair.
    ///
    /// Meaningless for cancelled services; callers treat cancellation as
    /// orthogonal to delay and must not consult this when
    /// `is_cancelled` is set.
    pub fn delay_minutes(&self) -> u32 {
        self.expected_departure
            .delay_minutes_from(self.scheduled_departure)
    }

    /// Status of this service.
    pub fn status(&self) -> ServiceStatus {
        if self.is_cancelled {
            ServiceStatus::Cancelled
        } else if self.delay_minutes() >= 1 {
            ServiceStatus::Delayed
        } else {
            ServiceStatus::OnTime
        }
    }

    /// Whether the service left more than the grace period ago.
    ///
    /// Cancelled services never count as departed; they stay visible on
    /// display lists regardless of time.
    pub fn has_departed(&self, now: BoardTime) -> bool {
        if self.is_cancelled {
            return false;
        }
        now.signed_minutes_since(self.expected_departure) > DEPARTED_GRACE_MINUTES
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{cancelled, fact};
    use super::*;

    fn t(s: &str) -> BoardTime {
        BoardTime::parse(s).unwrap()
    }

    #[test]
    fn delay_is_computed_from_times() {
        assert_eq!(fact("a", "08:35", "08:35").delay_minutes(), 0);
        assert_eq!(fact("a", "08:35", "08:47").delay_minutes(), 12);
        // Early running floors at zero
        assert_eq!(fact("a", "08:35", "08:33").delay_minutes(), 0);
    }

    #[test]
    fn status_derivation() {
        assert_eq!(fact("a", "08:35", "08:35").status(), ServiceStatus::OnTime);
        assert_eq!(fact("a", "08:35", "08:36").status(), ServiceStatus::Delayed);
        assert_eq!(
            cancelled("a", "08:35", None).status(),
            ServiceStatus::Cancelled
        );
    }

    #[test]
    fn departed_after_grace_period() {
        let service = fact("a", "08:35", "08:35");
        assert!(!service.has_departed(t("08:35")));
        assert!(!service.has_departed(t("08:37")));
        assert!(service.has_departed(t("08:38")));
    }

    #[test]
    fn departed_tracks_expected_not_scheduled() {
        let service = fact("a", "08:35", "08:50");
        // Past scheduled but the service is still expected to leave
        assert!(!service.has_departed(t("08:45")));
        assert!(service.has_departed(t("08:53")));
    }

    #[test]
    fn cancelled_never_departs() {
        let service = cancelled("a", "08:35", None);
        assert!(!service.has_departed(t("10:00")));
    }
}
