use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use commute_watch::config::{RouteConfig, ThresholdConfig};
use commute_watch::coordinator::RouteTracker;
use commute_watch::ldb::{CacheConfig, CachedFetcher, LdbClient, LdbConfig};
use commute_watch::subscriber::{LogSubscriber, RouteSubscriber};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Route and credentials come from the environment
    let api_key = std::env::var("COMMUTE_API_KEY").unwrap_or_else(|_| {
        eprintln!("Warning: COMMUTE_API_KEY not set. API calls will fail.");
        String::new()
    });
    let origin = std::env::var("COMMUTE_ORIGIN").unwrap_or_else(|_| "PAD".to_string());
    let destination = std::env::var("COMMUTE_DESTINATION").unwrap_or_else(|_| "RDG".to_string());

    let mut config = RouteConfig::new(&origin, &destination).expect("invalid route configuration");

    if let Some(window) = env_number("COMMUTE_TIME_WINDOW") {
        config = config
            .with_time_window(window)
            .expect("invalid time window");
    }
    if let Some(count) = env_number("COMMUTE_NUM_SERVICES") {
        config = config
            .with_num_services(count)
            .expect("invalid service count");
    }
    if let (Some(severe), Some(major), Some(minor)) = (
        env_number("COMMUTE_SEVERE_MINUTES"),
        env_number("COMMUTE_MAJOR_MINUTES"),
        env_number("COMMUTE_MINOR_MINUTES"),
    ) {
        let thresholds =
            ThresholdConfig::new(severe, major, minor).expect("invalid delay thresholds");
        config = config.with_thresholds(thresholds);
    }
    if std::env::var("COMMUTE_NIGHT_UPDATES").is_ok() {
        config = config.with_night_updates(true);
    }

    let client = LdbClient::new(LdbConfig::new(&api_key)).expect("failed to create LDB client");
    let fetcher = Arc::new(CachedFetcher::new(client, &CacheConfig::default()));

    let mut tracker = RouteTracker::new(fetcher);

    let subscribers: Vec<Arc<dyn RouteSubscriber>> = vec![Arc::new(LogSubscriber)];
    let handle = tracker
        .start(config, subscribers)
        .expect("failed to start route tracking");

    tracing::info!(route = %handle.id(), "tracking started; Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for Ctrl-C");

    tracing::info!("shutting down");
    tracker.shutdown_all().await;
}

fn env_number<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
