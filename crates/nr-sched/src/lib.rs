//! NR MAC cell scheduler
//!
//! Once per slot, decides which UEs are granted downlink and uplink
//! resources, on which PRBs, with which MCS and HARQ process, while
//! enforcing timing, retransmission and QoS constraints. Feedback (BSR, CRC,
//! UCI, SR, CSI, ...) arrives asynchronously on other execution contexts and
//! is applied exactly once at the owning cell's slot boundary.
//!
//! Layout, leaves first:
//! - `lc`: per-UE logical channel and MAC CE bookkeeping
//! - `ta`: per-UE timing-advance state machine
//! - `drx`: per-UE DRX power-saving windows
//! - `harq`: per-UE-cell HARQ process pools
//! - `ue`: UE context aggregation and repository
//! - `cfg`: UE configuration repository (control plane)
//! - `events`: per-cell feedback intake queues
//! - `grid`: per-slot PDCCH/PDSCH/PUSCH resource booking
//! - `fallback`: SRB/ConRes scheduler for UEs in fallback mode
//! - `cell`: per-cell slot pipeline and main allocators
//! - `scheduler`: top-level facade

pub mod cell;
pub mod cfg;
pub mod drx;
pub mod events;
pub mod fallback;
pub mod grid;
pub mod harq;
pub mod lc;
pub mod scheduler;
pub mod ta;
pub mod ue;

pub use cell::CellScheduler;
pub use scheduler::MacScheduler;
