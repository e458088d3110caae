pub mod cell_scheduler;
pub mod link_adapt;
pub mod tb_builder;

pub use cell_scheduler::CellScheduler;
