//! Service record model.
//!
//! Turns a raw departure-board payload into an ordered list of typed
//! [`ServiceFact`]s, detecting platform changes against the previous
//! snapshot along the way. Per-entry malformation is dropped with a
//! warning rather than failing the batch.

mod fact;
mod normalize;

pub use fact::{DEPARTED_GRACE_MINUTES, ServiceFact, ServiceStatus};
pub use normalize::{NormalizeError, NormalizedBoard, normalize};

#[cfg(test)]
pub(crate) use fact::test_support;
