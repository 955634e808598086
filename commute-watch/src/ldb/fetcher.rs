//! Fetch boundary: the contract the coordinator holds against upstream.

use std::future::Future;

use crate::domain::Crs;

use super::types::StationBoard;

/// Parameters of one departure-board request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoardQuery {
    /// Origin station.
    pub origin: Crs,

    /// Destination station; the board is filtered to services calling here.
    pub destination: Crs,

    /// How far ahead to look, in minutes.
    pub time_window_minutes: u16,

    /// Maximum number of services to request.
    pub num_services: u8,
}

/// Errors from a departure-board fetch.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Invalid or rejected API key. Terminal until configuration changes.
    #[error("unauthorized (invalid API key)")]
    Auth,

    /// Rate limited by the upstream API.
    #[error("rate limited by the departure board API")]
    RateLimited,

    /// Upstream returned a non-success status.
    #[error("upstream error {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// Transport-level failure (DNS, connection reset, TLS, ...).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Body was not parseable as a departure board.
    #[error("malformed response body: {message}")]
    MalformedBody { message: String },
}

impl FetchError {
    /// Whether a retry with backoff is worthwhile. Only authentication
    /// failures are terminal; everything else may clear up on its own.
    pub fn is_transient(&self) -> bool {
        !matches!(self, FetchError::Auth)
    }
}

/// Source of departure boards.
///
/// Implemented by the HTTP client, the caching wrapper, and the mock.
/// `force_fresh` must bypass any transport-level cache; a caller that
/// sets it is guaranteed a newly fetched answer.
pub trait BoardFetcher {
    fn fetch_departure_board(
        &self,
        query: &BoardQuery,
        force_fresh: bool,
    ) -> impl Future<Output = Result<StationBoard, FetchError>> + Send;
}
