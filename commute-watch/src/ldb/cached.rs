//! Caching wrapper for departure-board fetches.
//!
//! A short-TTL cache keyed by the full query, for consumers that can
//! tolerate a slightly old board (configuration-time validation, ad-hoc
//! lookups). The coordinator never reads through it: every cycle passes
//! `force_fresh`, which bypasses the cache and repopulates it.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache as MokaCache;

use super::fetcher::{BoardFetcher, BoardQuery, FetchError};
use super::types::StationBoard;

/// Configuration for the response cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for cached boards.
    pub ttl: Duration,

    /// Maximum number of cached boards.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            max_capacity: 64,
        }
    }
}

/// A [`BoardFetcher`] with a TTL response cache in front of it.
pub struct CachedFetcher<F> {
    inner: F,
    cache: MokaCache<BoardQuery, Arc<StationBoard>>,
}

impl<F: BoardFetcher> CachedFetcher<F> {
    /// Wrap a fetcher with the given cache configuration.
    pub fn new(inner: F, config: &CacheConfig) -> Self {
        let cache = MokaCache::builder()
            .time_to_live(config.ttl)
            .max_capacity(config.max_capacity)
            .build();

        Self { inner, cache }
    }

    /// Access the wrapped fetcher.
    pub fn inner(&self) -> &F {
        &self.inner
    }

    /// Number of boards currently cached.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Drop all cached boards.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

impl<F: BoardFetcher + Send + Sync> BoardFetcher for CachedFetcher<F> {
    async fn fetch_departure_board(
        &self,
        query: &BoardQuery,
        force_fresh: bool,
    ) -> Result<StationBoard, FetchError> {
        if !force_fresh {
            if let Some(cached) = self.cache.get(query).await {
                return Ok((*cached).clone());
            }
        }

        let board = self
            .inner
            .fetch_departure_board(query, force_fresh)
            .await?;

        self.cache
            .insert(query.clone(), Arc::new(board.clone()))
            .await;

        Ok(board)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ldb::mock::MockFetcher;

    fn query() -> BoardQuery {
        BoardQuery {
            origin: "PAD".parse().unwrap(),
            destination: "RDG".parse().unwrap(),
            time_window_minutes: 60,
            num_services: 3,
        }
    }

    fn board(name: &str) -> StationBoard {
        serde_json::from_str(&format!(r#"{{"locationName": "{name}"}}"#)).unwrap()
    }

    #[tokio::test]
    async fn serves_from_cache_within_ttl() {
        let mock = MockFetcher::new();
        mock.push_board(board("first"));
        mock.push_board(board("second"));

        let cached = CachedFetcher::new(mock, &CacheConfig::default());

        let a = cached.fetch_departure_board(&query(), false).await.unwrap();
        let b = cached.fetch_departure_board(&query(), false).await.unwrap();

        assert_eq!(a.location_name.as_deref(), Some("first"));
        // Second read is a cache hit, not the second scripted response
        assert_eq!(b.location_name.as_deref(), Some("first"));
        assert_eq!(cached.inner().calls(), 1);
    }

    #[tokio::test]
    async fn force_fresh_bypasses_cache() {
        let mock = MockFetcher::new();
        mock.push_board(board("first"));
        mock.push_board(board("second"));

        let cached = CachedFetcher::new(mock, &CacheConfig::default());

        let a = cached.fetch_departure_board(&query(), false).await.unwrap();
        let b = cached.fetch_departure_board(&query(), true).await.unwrap();

        assert_eq!(a.location_name.as_deref(), Some("first"));
        assert_eq!(b.location_name.as_deref(), Some("second"));
        assert_eq!(cached.inner().calls(), 2);
    }

    #[tokio::test]
    async fn force_fresh_repopulates_cache() {
        let mock = MockFetcher::new();
        mock.push_board(board("first"));
        mock.push_board(board("second"));

        let cached = CachedFetcher::new(mock, &CacheConfig::default());

        cached.fetch_departure_board(&query(), false).await.unwrap();
        cached.fetch_departure_board(&query(), true).await.unwrap();

        // The forced fetch replaced the cached entry
        let c = cached.fetch_departure_board(&query(), false).await.unwrap();
        assert_eq!(c.location_name.as_deref(), Some("second"));
        assert_eq!(cached.inner().calls(), 2);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let mock = MockFetcher::new();
        mock.push_error(FetchError::RateLimited);
        mock.push_board(board("recovered"));

        let cached = CachedFetcher::new(mock, &CacheConfig::default());

        assert!(
            cached
                .fetch_departure_board(&query(), false)
                .await
                .is_err()
        );
        let b = cached.fetch_departure_board(&query(), false).await.unwrap();
        assert_eq!(b.location_name.as_deref(), Some("recovered"));
    }
}
