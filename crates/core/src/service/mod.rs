//! Scoring service abstraction.
//!
//! This module provides a `ScoringService` trait over the remote endpoints
//! the job lifecycle consumes, plus an HTTP implementation.

mod http;
mod types;

pub use http::HttpScoringService;
pub use types::*;
