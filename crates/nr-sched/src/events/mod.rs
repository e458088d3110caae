pub mod event_manager;

pub use event_manager::{CellEventManager, EventResult, EventSender};
