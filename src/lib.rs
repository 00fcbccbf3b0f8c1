//! PUNTER: risk-controlled sportsbook wagering engine
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod driver;
pub mod engine;
pub mod storage;
pub mod types;
