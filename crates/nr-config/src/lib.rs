//! Configuration types for the NR cell scheduler
//!
//! Cell-level configuration is an immutable snapshot shared by all UE
//! contexts on the cell; dynamic fields live in a separate RwLock'd state
//! that is only swapped at slot boundaries. UE configuration is a versioned
//! snapshot owned by the scheduler's configuration repository.

pub mod cell;
pub mod toml_config;
pub mod ue;

pub use cell::{CellConfig, CellState, FallbackConfig, HarqConfig, MAX_SCHED_AHEAD_SLOTS, SharedCellConfig, TaConfig};
pub use ue::{DrxConfig, LcConfig, UeConfig};
