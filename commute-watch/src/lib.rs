//! Commute route watcher.
//!
//! Tracks scheduled rail services between a fixed origin/destination
//! pair, classifies disruption into a severity hierarchy, and pushes
//! immutable snapshots to subscribers. The adaptive coordinator polls
//! fast through commuter peaks, slower off-peak, and backs off with
//! jitter across upstream failures without dropping the last-good view.

pub mod board;
pub mod classify;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod ldb;
pub mod schedule;
pub mod snapshot;
pub mod subscriber;
