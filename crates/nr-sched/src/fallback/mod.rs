pub mod fallback_scheduler;

pub use fallback_scheduler::FallbackScheduler;
