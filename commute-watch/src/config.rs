//! Per-route configuration.
//!
//! All range and hierarchy validation happens here, synchronously, so
//! invalid values never reach a coordinator. Stored configuration is a
//! versioned document; version 1 used a two-axis disruption scheme
//! (single-delay / multiple-delay thresholds plus a train-count
//! requirement) which is upgraded to the three-tier scheme on load.

use serde::{Deserialize, Serialize};

use crate::domain::Crs;

/// Allowed range for the lookahead window, in minutes.
pub const TIME_WINDOW_RANGE: std::ops::RangeInclusive<u16> = 15..=120;

/// Allowed range for the number of tracked services.
pub const NUM_SERVICES_RANGE: std::ops::RangeInclusive<u8> = 1..=10;

/// Default lookahead window in minutes.
pub const DEFAULT_TIME_WINDOW: u16 = 60;

/// Default number of tracked services.
pub const DEFAULT_NUM_SERVICES: u8 = 3;

/// Default delay thresholds in minutes: severe / major / minor.
pub const DEFAULT_THRESHOLDS: (u32, u32, u32) = (15, 10, 3);

/// Configuration errors, rejected before tracking starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A station code failed to parse.
    #[error(transparent)]
    InvalidStation(#[from] crate::domain::InvalidCrs),

    /// Origin and destination are the same station.
    #[error("origin and destination must differ (both {0})")]
    SameStation(Crs),

    /// Lookahead window out of range.
    #[error("time window {0} outside allowed range 15-120 minutes")]
    TimeWindowOutOfRange(u16),

    /// Tracked-service count out of range.
    #[error("number of services {0} outside allowed range 1-10")]
    NumServicesOutOfRange(u8),

    /// Threshold hierarchy broken.
    #[error("invalid thresholds: severe {severe} >= major {major} >= minor {minor} >= 1 must hold")]
    InvalidThresholds { severe: u32, major: u32, minor: u32 },

    /// Stored document carries a version this build does not know.
    #[error("unsupported configuration version {0}")]
    UnsupportedVersion(u32),

    /// Stored document failed to parse.
    #[error("malformed configuration document: {0}")]
    MalformedDocument(String),
}

/// Delay thresholds for the three severity bands, in minutes.
///
/// The hierarchy `severe >= major >= minor >= 1` is enforced at
/// construction and re-checked by the classifier; a violating
/// configuration is rejected, never clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub severe_minutes: u32,
    pub major_minutes: u32,
    pub minor_minutes: u32,
}

impl ThresholdConfig {
    /// Create a validated threshold set.
    pub fn new(severe: u32, major: u32, minor: u32) -> Result<Self, ConfigError> {
        let config = Self {
            severe_minutes: severe,
            major_minutes: major,
            minor_minutes: minor,
        };
        if !config.is_valid() {
            return Err(ConfigError::InvalidThresholds {
                severe,
                major,
                minor,
            });
        }
        Ok(config)
    }

    /// Whether the hierarchy `severe >= major >= minor >= 1` holds.
    pub fn is_valid(&self) -> bool {
        self.severe_minutes >= self.major_minutes
            && self.major_minutes >= self.minor_minutes
            && self.minor_minutes >= 1
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        let (severe, major, minor) = DEFAULT_THRESHOLDS;
        Self {
            severe_minutes: severe,
            major_minutes: major,
            minor_minutes: minor,
        }
    }
}

/// Configuration for one tracked route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Origin station.
    pub origin: Crs,

    /// Destination station. Must differ from the origin.
    pub destination: Crs,

    /// Display label for the route.
    pub label: String,

    /// Lookahead window in minutes (15-120).
    pub time_window_minutes: u16,

    /// Number of services to track (1-10).
    pub num_services: u8,

    /// Delay thresholds for classification.
    pub thresholds: ThresholdConfig,

    /// Whether to keep polling overnight.
    pub night_updates: bool,
}

impl RouteConfig {
    /// Create a configuration for the given station pair with defaults
    /// for everything else.
    pub fn new(origin: &str, destination: &str) -> Result<Self, ConfigError> {
        let origin = Crs::parse(origin)?;
        let destination = Crs::parse(destination)?;

        if origin == destination {
            return Err(ConfigError::SameStation(origin));
        }

        Ok(Self {
            origin,
            destination,
            label: format!("{origin} to {destination}"),
            time_window_minutes: DEFAULT_TIME_WINDOW,
            num_services: DEFAULT_NUM_SERVICES,
            thresholds: ThresholdConfig::default(),
            night_updates: false,
        })
    }

    /// Set the lookahead window, validating the range.
    pub fn with_time_window(mut self, minutes: u16) -> Result<Self, ConfigError> {
        if !TIME_WINDOW_RANGE.contains(&minutes) {
            return Err(ConfigError::TimeWindowOutOfRange(minutes));
        }
        self.time_window_minutes = minutes;
        Ok(self)
    }

    /// Set the number of tracked services, validating the range.
    pub fn with_num_services(mut self, count: u8) -> Result<Self, ConfigError> {
        if !NUM_SERVICES_RANGE.contains(&count) {
            return Err(ConfigError::NumServicesOutOfRange(count));
        }
        self.num_services = count;
        Ok(self)
    }

    /// Set the delay thresholds.
    pub fn with_thresholds(mut self, thresholds: ThresholdConfig) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Enable or disable overnight polling.
    pub fn with_night_updates(mut self, enabled: bool) -> Self {
        self.night_updates = enabled;
        self
    }

    /// Set the display label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Re-run every check the builder path enforces. Fields are public,
    /// so a hand-assembled configuration is revalidated before use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.origin == self.destination {
            return Err(ConfigError::SameStation(self.origin));
        }
        if !TIME_WINDOW_RANGE.contains(&self.time_window_minutes) {
            return Err(ConfigError::TimeWindowOutOfRange(self.time_window_minutes));
        }
        if !NUM_SERVICES_RANGE.contains(&self.num_services) {
            return Err(ConfigError::NumServicesOutOfRange(self.num_services));
        }
        if !self.thresholds.is_valid() {
            return Err(ConfigError::InvalidThresholds {
                severe: self.thresholds.severe_minutes,
                major: self.thresholds.major_minutes,
                minor: self.thresholds.minor_minutes,
            });
        }
        Ok(())
    }
}

/// Version 1 stored route document, with the retired two-axis
/// disruption scheme.
#[derive(Debug, Clone, Deserialize)]
struct LegacyRouteDocument {
    origin: String,
    destination: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default = "default_time_window")]
    time_window_minutes: u16,
    #[serde(default = "default_num_services")]
    num_services: u8,
    #[serde(default)]
    night_updates: bool,
    /// Delay that flagged disruption on a single service.
    disruption_single_delay: u32,
    /// Delay that flagged disruption across multiple services.
    disruption_multiple_delay: u32,
    /// Train count required for the multiple-delay axis. Retired;
    /// carried only so old documents still parse.
    #[serde(default)]
    #[allow(dead_code)]
    disruption_multiple_count: u32,
}

fn default_time_window() -> u16 {
    DEFAULT_TIME_WINDOW
}

fn default_num_services() -> u8 {
    DEFAULT_NUM_SERVICES
}

#[derive(Debug, Deserialize)]
struct VersionProbe {
    #[serde(default = "latest_version")]
    version: u32,
}

fn latest_version() -> u32 {
    2
}

/// Map the retired two-axis thresholds onto the three-tier scheme.
///
/// The single-service delay becomes severe, the multiple-service delay
/// becomes major, and minor takes the default floor (capped so the
/// hierarchy holds). The train-count axis is dropped.
pub fn migrate_legacy_thresholds(
    single_delay: u32,
    multiple_delay: u32,
) -> Result<ThresholdConfig, ConfigError> {
    let minor = DEFAULT_THRESHOLDS.2.min(multiple_delay);
    ThresholdConfig::new(single_delay, multiple_delay, minor)
}

/// Load a route configuration from a stored JSON document, upgrading
/// legacy versions as needed.
pub fn load_route_document(json: &str) -> Result<RouteConfig, ConfigError> {
    let probe: VersionProbe = serde_json::from_str(json)
        .map_err(|e| ConfigError::MalformedDocument(e.to_string()))?;

    match probe.version {
        1 => {
            let doc: LegacyRouteDocument = serde_json::from_str(json)
                .map_err(|e| ConfigError::MalformedDocument(e.to_string()))?;

            let thresholds = migrate_legacy_thresholds(
                doc.disruption_single_delay,
                doc.disruption_multiple_delay,
            )?;

            let mut config = RouteConfig::new(&doc.origin, &doc.destination)?
                .with_time_window(doc.time_window_minutes)?
                .with_num_services(doc.num_services)?
                .with_thresholds(thresholds)
                .with_night_updates(doc.night_updates);
            if let Some(label) = doc.label {
                config = config.with_label(label);
            }
            Ok(config)
        }
        2 => {
            let config: RouteConfig = serde_json::from_str(json)
                .map_err(|e| ConfigError::MalformedDocument(e.to_string()))?;
            config.validate()?;
            Ok(config)
        }
        other => Err(ConfigError::UnsupportedVersion(other)),
    }
}
