//! Analysis modules.
//!
//! Turns the assertions of a finished run into per-case results.

pub mod aggregator;

pub use aggregator::*;
