pub mod ta_manager;

pub use ta_manager::TaManager;

/// TA command value meaning "no timing adjustment" per TS 38.213
pub const TA_CMD_OFFSET_ZERO: i32 = 31;

/// Legal TA command range
pub const TA_CMD_MAX: i32 = 63;
