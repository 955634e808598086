//! HTTP client for the Live Departure Boards API.
//!
//! Queries `GetDepBoardWithDetails` for the origin station, filtered to
//! services calling at the destination. Authentication is an `x-apikey`
//! header. Responses are mapped into the [`FetchError`] taxonomy so the
//! coordinator can tell terminal failures from retryable ones.

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};

use super::fetcher::{BoardFetcher, BoardQuery, FetchError};
use super::types::StationBoard;

/// Default base URL for the departure board API.
const DEFAULT_BASE_URL: &str =
    "https://api1.raildata.org.uk/1010-live-departure-board-dep1_2/LDBWS/api/20220120";

/// Configuration for the LDB client.
#[derive(Debug, Clone)]
pub struct LdbConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Base URL for the API (defaults to production).
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl LdbConfig {
    /// Create a new config with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }

    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Live Departure Boards API client.
#[derive(Debug, Clone)]
pub struct LdbClient {
    http: reqwest::Client,
    base_url: String,
}

impl LdbClient {
    /// Create a new client with the given configuration.
    pub fn new(config: LdbConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();

        let api_key = HeaderValue::from_str(&config.api_key).map_err(|_| FetchError::Auth)?;
        headers.insert("x-apikey", api_key);
        headers.insert("accept", HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url,
        })
    }
}

impl BoardFetcher for LdbClient {
    async fn fetch_departure_board(
        &self,
        query: &BoardQuery,
        force_fresh: bool,
    ) -> Result<StationBoard, FetchError> {
        let url = format!(
            "{}/GetDepBoardWithDetails/{}",
            self.base_url,
            query.origin.as_str()
        );

        let mut request = self.http.get(&url).query(&[
            ("filterCrs", query.destination.as_str().to_string()),
            ("filterType", "to".to_string()),
            ("timeWindow", query.time_window_minutes.to_string()),
            ("numRows", query.num_services.to_string()),
        ]);

        if force_fresh {
            // Ask intermediaries not to serve a cached body either
            request = request.header("cache-control", "no-cache");
        }

        let response = request.send().await.map_err(classify_transport_error)?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Auth);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FetchError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await.map_err(classify_transport_error)?;

        serde_json::from_str(&body).map_err(|e| FetchError::MalformedBody {
            message: format!("{e} (body: {})", truncate(&body, 200)),
        })
    }
}

/// Map a reqwest error to the fetch taxonomy, separating timeouts.
fn classify_transport_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(err)
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
