pub mod sched_config_manager;

pub use sched_config_manager::SchedConfigManager;
