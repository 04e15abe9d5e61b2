//! # Configuration Module
//!
//! Centralizes the on-disk geometry and file-layout constants for tabstore.
//! Interdependent values live together and are tied down with compile-time
//! assertions so a change to one cannot silently invalidate another.
//!
//! ## Module Organization
//!
//! - [`constants`]: page geometry, derived capacities, file-layout names

pub mod constants;
pub use constants::*;
