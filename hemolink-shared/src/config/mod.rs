//! # Configuration
//!
//! Client configuration: backend location, unread reconciliation cadence,
//! request cache timings and logging.

pub mod client;
