//! General utilities
pub mod stats;
