//! Core engine: risk-gated placement, confirmation and session handling.

pub mod bankroll;
pub mod catalog;
pub mod ledger;
pub mod markets;
pub mod punter;
pub mod retry;
pub mod risk;
pub mod session;

pub use punter::Punter;
