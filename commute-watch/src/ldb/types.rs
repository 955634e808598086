//! Live Departure Boards response DTOs.
//!
//! These types map directly to the upstream JSON. `Option` is used
//! liberally because the API omits fields rather than sending nulls.

use serde::Deserialize;

/// Response from `GetDepBoardWithDetails` filtered to a destination.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationBoard {
    /// When this response was generated (ISO 8601 datetime).
    pub generated_at: Option<String>,

    /// Human-readable name of the origin station.
    pub location_name: Option<String>,

    /// CRS code of the origin station.
    pub crs: Option<String>,

    /// Human-readable name of the filter (destination) station.
    pub filter_location_name: Option<String>,

    /// Train services on the board, in departure order.
    pub train_services: Option<Vec<ServiceItem>>,

    /// Network Rail operational messages.
    pub nrcc_messages: Option<Vec<NrccMessage>>,
}

impl StationBoard {
    /// The services list, empty when the board carries none.
    pub fn services(&self) -> &[ServiceItem] {
        self.train_services.as_deref().unwrap_or(&[])
    }
}

/// A single service on the departure board.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceItem {
    /// Ephemeral service ID, only valid while on the board.
    #[serde(rename = "serviceID")]
    pub service_id: Option<String>,

    /// Scheduled time of departure, "HH:MM".
    pub std: Option<String>,

    /// Estimated time of departure. May be "On time", "Delayed",
    /// "Cancelled", or a time like "10:15".
    pub etd: Option<String>,

    /// Platform number/letter. Absent while still to be advised.
    pub platform: Option<String>,

    /// Train operating company name.
    pub operator: Option<String>,

    /// Whether this service is cancelled.
    pub is_cancelled: Option<bool>,

    /// Reason for cancellation, when cancelled.
    pub cancel_reason: Option<String>,

    /// Reason for delay, when running late.
    pub delay_reason: Option<String>,

    /// Destination station(s).
    pub destination: Option<Vec<ServiceLocation>>,

    /// Stops still to be made after the board station.
    pub subsequent_calling_points: Option<Vec<CallingPointList>>,
}

/// Wrapper for a list of calling points (split/join portions).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallingPointList {
    pub calling_point: Vec<CallingPoint>,
}

/// A single stop a service makes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallingPoint {
    /// Human-readable station name.
    pub location_name: String,

    /// CRS code of the station.
    pub crs: Option<String>,

    /// Scheduled time at this stop, "HH:MM".
    pub st: Option<String>,

    /// Estimated time at this stop.
    pub et: Option<String>,
}

/// Origin or destination of a service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLocation {
    pub location_name: String,
    pub crs: Option<String>,
    pub via: Option<String>,
}

/// Network Rail operational message. May contain HTML.
#[derive(Debug, Clone, Deserialize)]
pub struct NrccMessage {
    #[serde(rename = "Value")]
    pub value: Option<String>,
}
