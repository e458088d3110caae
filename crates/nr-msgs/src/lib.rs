//! In-process interface contracts for the NR cell scheduler
//!
//! Feedback indications arriving from the lower MAC/PHY, UE lifecycle
//! requests from the upper MAC control procedures, and the per-slot
//! scheduling result handed back to the MAC/PHY boundary. No wire formats
//! live here; FAPI/F1AP packing belongs to the adaptor layers.

pub mod ce;
pub mod feedback;
pub mod lifecycle;
pub mod notifier;
pub mod results;

pub use ce::MacCe;
pub use feedback::*;
pub use lifecycle::{UeCreationRequest, UeReconfigurationRequest};
pub use notifier::SchedNotifier;
pub use results::{DlGrant, SchedResult, SubPdu, UlGrant};
