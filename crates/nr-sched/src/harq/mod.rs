pub mod pool;
pub mod process;

pub use pool::HarqPool;
pub use process::{AckOutcome, HarqProcess, HarqState};

/// Redundancy version sequence across retransmissions
pub const RV_SEQUENCE: [u8; 4] = [0, 2, 3, 1];
