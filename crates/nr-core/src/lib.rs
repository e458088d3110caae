//! Core types for the NR cell scheduler
//!
//! This crate provides fundamental types used across the scheduler stack:
//! - SlotPoint for numerology-aware slot timing
//! - Typed identifiers (UeIndex, Rnti, LcId, ...)
//! - MAC subheader sizing arithmetic
//! - Logging setup and debug utilities

pub mod debug;
pub mod direction;
pub mod ids;
pub mod mac_sdu;
pub mod prb;
pub mod slot_time;

// Re-export commonly used items
pub use direction::Direction;
pub use ids::*;
pub use mac_sdu::{mac_sdu_header_size, mac_sdu_max_payload, mac_sdu_required_bytes};
pub use prb::PrbInterval;
pub use slot_time::SlotPoint;
