//! Target address matching.
//!
//! The search checks every derived address for membership in a fixed,
//! read-only [`TargetSet`].

mod targets;

pub use targets::{TargetError, TargetSet};
