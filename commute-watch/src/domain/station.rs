//! Station code types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Error returned when parsing an invalid CRS code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid CRS code {input:?}: {reason}")]
pub struct InvalidCrs {
    input: String,
    reason: &'static str,
}

/// A valid 3-letter CRS (Computer Reservation System) station code.
///
/// CRS codes are always 3 uppercase ASCII letters. Any `Crs` value is
/// valid by construction, so downstream code never re-validates.
///
/// # Examples
///
/// ```
/// use commute_watch::domain::Crs;
///
/// let pad: Crs = "PAD".parse().unwrap();
/// assert_eq!(pad.as_str(), "PAD");
///
/// assert!("pad".parse::<Crs>().is_err());
/// assert!("PADD".parse::<Crs>().is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Crs([u8; 3]);

impl Crs {
    /// Parse a CRS code. The input must be exactly 3 uppercase ASCII letters.
    pub fn parse(s: &str) -> Result<Self, InvalidCrs> {
        let bytes: [u8; 3] = s.as_bytes().try_into().map_err(|_| InvalidCrs {
            input: s.to_string(),
            reason: "must be exactly 3 characters",
        })?;

        if bytes.iter().any(|b| !b.is_ascii_uppercase()) {
            return Err(InvalidCrs {
                input: s.to_string(),
                reason: "must be uppercase ASCII letters A-Z",
            });
        }

        Ok(Crs(bytes))
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        // Only uppercase ASCII is ever stored
        std::str::from_utf8(&self.0).unwrap()
    }
}

impl FromStr for Crs {
    type Err = InvalidCrs;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Crs::parse(s)
    }
}

impl fmt::Debug for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Crs({})", self.as_str())
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Crs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Crs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Crs::parse(&s).map_err(serde::de::Error::custom)
    }
}
