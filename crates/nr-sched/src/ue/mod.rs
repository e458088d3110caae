pub mod repository;
pub mod ue_context;

pub use repository::UeRepository;
pub use ue_context::{UeCellContext, UeContext};

/// Minimal grant size handed to a UE with a pending Scheduling Request but no
/// reported uplink data, so it gets an opportunity to send a fresh BSR.
pub const SR_PLACEHOLDER_GRANT_BYTES: u32 = 512;
