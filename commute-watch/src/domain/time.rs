//! Departure-board time handling.
//!
//! The upstream board reports times as bare "HH:MM" strings with no date
//! attached. `BoardTime` keeps that time-of-day representation and does
//! duration arithmetic with a 12-hour wrap heuristic, so a service whose
//! estimate slips past midnight still reads as a short delay rather than
//! a 23-hour one.

use std::fmt;

use chrono::{NaiveTime, Timelike};
use serde::{Serialize, Serializer};

/// Half a day in minutes, the pivot for the midnight wrap heuristic.
const HALF_DAY_MINUTES: i64 = 12 * 60;

/// Error returned when parsing an invalid "HH:MM" string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid board time {input:?}")]
pub struct InvalidBoardTime {
    input: String,
}

/// A time of day as shown on a departure board.
///
/// # Examples
///
/// ```
/// use commute_watch::domain::BoardTime;
///
/// let scheduled = BoardTime::parse("08:35").unwrap();
/// let expected = BoardTime::parse("08:47").unwrap();
/// assert_eq!(expected.signed_minutes_since(scheduled), 12);
/// assert_eq!(scheduled.to_string(), "08:35");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoardTime(NaiveTime);

impl BoardTime {
    /// Parse a strict "HH:MM" string (zero-padded, 24-hour clock).
    pub fn parse(s: &str) -> Result<Self, InvalidBoardTime> {
        let invalid = || InvalidBoardTime {
            input: s.to_string(),
        };

        let (hh, mm) = match s.as_bytes() {
            [h1, h2, b':', m1, m2] => {
                let digit = |b: u8| (b as char).to_digit(10);
                let hh = digit(*h1).zip(digit(*h2)).map(|(a, b)| a * 10 + b);
                let mm = digit(*m1).zip(digit(*m2)).map(|(a, b)| a * 10 + b);
                (hh.ok_or_else(invalid)?, mm.ok_or_else(invalid)?)
            }
            _ => return Err(invalid()),
        };

        NaiveTime::from_hms_opt(hh, mm, 0)
            .map(BoardTime)
            .ok_or_else(invalid)
    }

    /// Construct from hour and minute components. Returns `None` if out of range.
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(BoardTime)
    }

    /// The underlying time of day.
    pub fn time(&self) -> NaiveTime {
        self.0
    }

    /// Minutes since midnight.
    fn minutes_of_day(&self) -> i64 {
        i64::from(self.0.hour()) * 60 + i64::from(self.0.minute())
    }

    /// Signed whole minutes from `earlier` to `self`, normalized into
    /// `(-12h, +12h]`.
    ///
    /// A difference of more than 12 hours in either direction is assumed
    /// to cross midnight: "23:55" to "00:10" is +15 minutes, not -23:45.
    pub fn signed_minutes_since(&self, earlier: BoardTime) -> i64 {
        let mut diff = self.minutes_of_day() - earlier.minutes_of_day();
        if diff > HALF_DAY_MINUTES {
            diff -= 24 * 60;
        } else if diff <= -HALF_DAY_MINUTES {
            diff += 24 * 60;
        }
        diff
    }

    /// Delay in whole minutes of this (expected) time against `scheduled`,
    /// floored at zero. Early running is not a negative delay.
    pub fn delay_minutes_from(&self, scheduled: BoardTime) -> u32 {
        self.signed_minutes_since(scheduled).max(0) as u32
    }
}

impl fmt::Debug for BoardTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BoardTime({self})")
    }
}

impl fmt::Display for BoardTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0.hour(), self.0.minute())
    }
}

impl Serialize for BoardTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
