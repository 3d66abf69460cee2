//! TestRail integration.
//!
//! This module provides the API client and the publish pipeline that
//! sends aggregated case results to a run.

pub mod client;
pub mod publisher;

#[cfg(test)]
mod stub;

pub use client::TestRailClient;
pub use publisher::publish;
