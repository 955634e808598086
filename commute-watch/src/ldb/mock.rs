//! Mock departure-board fetcher for development and tests.
//!
//! Serves scripted responses in FIFO order, falling back to per-station
//! fixture boards loaded from JSON files. Records call counts and the
//! `force_fresh` flags it saw so tests can assert on fetch behavior.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::domain::Crs;

use super::fetcher::{BoardFetcher, BoardQuery, FetchError};
use super::types::StationBoard;

/// Mock [`BoardFetcher`] with scripted responses.
#[derive(Default)]
pub struct MockFetcher {
    script: Mutex<VecDeque<Result<StationBoard, FetchError>>>,
    fixtures: Mutex<HashMap<Crs, StationBoard>>,
    calls: AtomicUsize,
    force_fresh_seen: Mutex<Vec<bool>>,
    latency: Mutex<Option<std::time::Duration>>,
}

impl MockFetcher {
    /// Create an empty mock. Push responses before fetching.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock from a directory of `{CRS}.json` fixture files,
    /// each holding one departure board keyed by its origin station.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, FetchError> {
        let dir = dir.as_ref();
        let mut fixtures = HashMap::new();

        let entries = std::fs::read_dir(dir).map_err(|e| FetchError::MalformedBody {
            message: format!("failed to read fixture directory {dir:?}: {e}"),
        })?;

        for entry in entries {
            let path = entry
                .map_err(|e| FetchError::MalformedBody {
                    message: format!("failed to read fixture entry: {e}"),
                })?
                .path();

            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default();
            let crs = Crs::parse(stem).map_err(|e| FetchError::MalformedBody {
                message: format!("fixture {path:?} is not named after a CRS code: {e}"),
            })?;

            let json = std::fs::read_to_string(&path).map_err(|e| FetchError::MalformedBody {
                message: format!("failed to read {path:?}: {e}"),
            })?;
            let board = serde_json::from_str(&json).map_err(|e| FetchError::MalformedBody {
                message: format!("failed to parse {path:?}: {e}"),
            })?;

            fixtures.insert(crs, board);
        }

        Ok(Self {
            fixtures: Mutex::new(fixtures),
            ..Self::default()
        })
    }

    /// Simulate upstream latency on every fetch.
    pub fn set_latency(&self, latency: std::time::Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    /// Queue a board to be served by the next fetch.
    pub fn push_board(&self, board: StationBoard) {
        self.script.lock().unwrap().push_back(Ok(board));
    }

    /// Queue an error to be served by the next fetch.
    pub fn push_error(&self, error: FetchError) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    /// Total number of fetches served (or failed).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The `force_fresh` flag of each fetch, in order.
    pub fn force_fresh_seen(&self) -> Vec<bool> {
        self.force_fresh_seen.lock().unwrap().clone()
    }
}

impl BoardFetcher for MockFetcher {
    async fn fetch_departure_board(
        &self,
        query: &BoardQuery,
        force_fresh: bool,
    ) -> Result<StationBoard, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.force_fresh_seen.lock().unwrap().push(force_fresh);

        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(scripted) = self.script.lock().unwrap().pop_front() {
            return scripted;
        }

        if let Some(board) = self.fixtures.lock().unwrap().get(&query.origin) {
            return Ok(board.clone());
        }

        Err(FetchError::Upstream {
            status: 404,
            message: format!("no scripted response or fixture for {}", query.origin),
        })
    }
}
