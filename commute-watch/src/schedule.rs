//! Adaptive refresh scheduling.
//!
//! A pure function from local time-of-day to the next refresh delay.
//! Commuter peaks poll fast, off-peak slower, and overnight the route
//! either drops to a long interval or suspends entirely until a manual
//! refresh, depending on configuration. All windows are half-open:
//! 10:00 itself is already off-peak.

use std::time::Duration;

use chrono::{NaiveTime, Timelike};

/// Polling interval during morning and evening peaks.
pub const PEAK_INTERVAL: Duration = Duration::from_secs(2 * 60);

/// Polling interval outside the peaks.
pub const OFF_PEAK_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Polling interval overnight, when night updates are enabled.
pub const NIGHT_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Peak windows as half-open hour ranges `[start, end)`.
const PEAK_HOURS: [(u32, u32); 2] = [(6, 10), (16, 20)];

/// Night window: from 23:00, and before 05:00.
const NIGHT_START_HOUR: u32 = 23;
const NIGHT_END_HOUR: u32 = 5;

/// What the coordinator should do after the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPlan {
    /// Re-arm the timer with this delay.
    Every(Duration),

    /// Do not re-arm; only a manual refresh wakes the route.
    Suspend,
}

/// Compute the next refresh delay for the given local time of day.
///
/// Rules, first match wins:
/// 1. peak hours (06:00-10:00, 16:00-20:00) poll every 2 minutes;
/// 2. night (23:00-05:00) polls every 15 minutes, or suspends when
///    night updates are disabled;
/// 3. otherwise every 5 minutes.
pub fn next_interval(now: NaiveTime, night_updates_enabled: bool) -> PollPlan {
    let hour = now.hour();

    if hour >= NIGHT_START_HOUR || hour < NIGHT_END_HOUR {
        return if night_updates_enabled {
            PollPlan::Every(NIGHT_INTERVAL)
        } else {
            PollPlan::Suspend
        };
    }

    if PEAK_HOURS
        .iter()
        .any(|&(start, end)| hour >= start && hour < end)
    {
        return PollPlan::Every(PEAK_INTERVAL);
    }

    PollPlan::Every(OFF_PEAK_INTERVAL)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    #[test]
    fn peak_hours_poll_fast() {
        assert_eq!(next_interval(at(6, 0), false), PollPlan::Every(PEAK_INTERVAL));
        assert_eq!(next_interval(at(9, 59), false), PollPlan::Every(PEAK_INTERVAL));
        assert_eq!(next_interval(at(16, 0), false), PollPlan::Every(PEAK_INTERVAL));
        assert_eq!(next_interval(at(19, 59), false), PollPlan::Every(PEAK_INTERVAL));
    }

    #[test]
    fn peak_upper_bounds_are_exclusive() {
        assert_eq!(
            next_interval(at(10, 0), false),
            PollPlan::Every(OFF_PEAK_INTERVAL)
        );
        assert_eq!(
            next_interval(at(20, 0), false),
            PollPlan::Every(OFF_PEAK_INTERVAL)
        );
    }

    #[test]
    fn off_peak_hours() {
        assert_eq!(
            next_interval(at(12, 30), false),
            PollPlan::Every(OFF_PEAK_INTERVAL)
        );
        assert_eq!(
            next_interval(at(22, 59), false),
            PollPlan::Every(OFF_PEAK_INTERVAL)
        );
        assert_eq!(
            next_interval(at(5, 0), false),
            PollPlan::Every(OFF_PEAK_INTERVAL)
        );
    }

    #[test]
    fn night_suspends_without_night_updates() {
        assert_eq!(next_interval(at(23, 0), false), PollPlan::Suspend);
        assert_eq!(next_interval(at(0, 0), false), PollPlan::Suspend);
        assert_eq!(next_interval(at(4, 59), false), PollPlan::Suspend);
    }

    #[test]
    fn night_polls_slowly_with_night_updates() {
        assert_eq!(
            next_interval(at(23, 0), true),
            PollPlan::Every(NIGHT_INTERVAL)
        );
        assert_eq!(
            next_interval(at(2, 15), true),
            PollPlan::Every(NIGHT_INTERVAL)
        );
    }

    #[test]
    fn night_window_takes_precedence_over_nothing_else() {
        // 05:00 is the first minute of early off-peak, not night
        assert_eq!(
            next_interval(at(5, 0), true),
            PollPlan::Every(OFF_PEAK_INTERVAL)
        );
        // 06:00 starts the morning peak
        assert_eq!(next_interval(at(6, 0), true), PollPlan::Every(PEAK_INTERVAL));
    }
}
