//! Analysis results returned by the scoring service.
//!
//! The statistics themselves are computed remotely; this module only models
//! and validates the payload.

mod types;

pub use types::*;
