//! Domain primitives for route tracking.
//!
//! Validated station codes and board times. Both types enforce their
//! invariants at construction, so the rest of the crate can trust any
//! value it is handed.

mod station;
mod time;

pub use station::{Crs, InvalidCrs};
pub use time::{BoardTime, InvalidBoardTime};
