pub mod ce_queue;
pub mod dl_lc_manager;
pub mod ul_lc_manager;

pub use ce_queue::CeQueue;
pub use dl_lc_manager::{DlLcManager, SduAlloc};
pub use ul_lc_manager::UlLcManager;

/// Estimated RLC segmentation overhead added back to a channel's tracked
/// buffer when an allocation does not fully drain it, so the next grant is
/// not undersized.
pub const RLC_SEGMENT_OVERHEAD: u32 = 4;
