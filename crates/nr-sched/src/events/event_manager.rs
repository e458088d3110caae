use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use nr_core::{SlotPoint, UeIndex};

use crate::ue::UeRepository;

/// Outcome of one drained event callback. Enqueue and drain happen at
/// different points in time, so callbacks re-check UE liveness instead of
/// assuming the UE still exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    Processed,
    /// The referenced UE no longer exists
    InvalidUe,
    /// The UE exists but has no context on this cell
    InvalidUeCell,
}

type EventCallback = Box<dyn FnOnce(&mut UeRepository) -> EventResult + Send>;

struct SchedEvent {
    name: &'static str,
    ue_index: Option<UeIndex>,
    callback: EventCallback,
}

/// Cloneable producer handle for one cell's event queue. Feedback handlers on
/// any execution context push through this; the owning cell drains.
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<SchedEvent>,
    stopped: Arc<AtomicBool>,
}

impl EventSender {
    /// Enqueue an event. Returns false when the queue is full or the cell is
    /// stopped; the single feedback sample is lost and the condition is
    /// expected to clear by the next slot.
    pub fn push<F>(&self, name: &'static str, ue_index: Option<UeIndex>, callback: F) -> bool
    where
        F: FnOnce(&mut UeRepository) -> EventResult + Send + 'static,
    {
        if self.stopped.load(Ordering::Acquire) {
            tracing::debug!("event {} dropped: cell stopped", name);
            return false;
        }
        let ev = SchedEvent {
            name,
            ue_index,
            callback: Box::new(callback),
        };
        match self.tx.try_send(ev) {
            Ok(()) => true,
            Err(TrySendError::Full(ev)) => {
                tracing::warn!("event queue full, dropping {}", ev.name);
                false
            }
            Err(TrySendError::Disconnected(ev)) => {
                tracing::debug!("event {} dropped: cell gone", ev.name);
                false
            }
        }
    }
}

/// Consumer side of one cell's feedback intake.
///
/// Multi-producer, single-consumer: feedback arrives from PHY/control
/// contexts and is applied exactly once, at the start of the owning cell's
/// slot processing, so the allocators see one consistent snapshot of UE
/// state for the whole slot.
pub struct CellEventManager {
    rx: Receiver<SchedEvent>,
    tx: Sender<SchedEvent>,
    stopped: Arc<AtomicBool>,
}

impl CellEventManager {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "event queue capacity must be positive");
        let (tx, rx) = bounded(capacity);
        Self {
            rx,
            tx,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn sender(&self) -> EventSender {
        EventSender {
            tx: self.tx.clone(),
            stopped: Arc::clone(&self.stopped),
        }
    }

    /// Drain and execute all queued events. Called exactly once per slot,
    /// before any allocation work.
    pub fn run_slot(&self, slot: SlotPoint, ues: &mut UeRepository) {
        while let Ok(ev) = self.rx.try_recv() {
            match (ev.callback)(ues) {
                EventResult::Processed => {}
                res => {
                    // Tolerated: the UE was deleted between enqueue and drain
                    tracing::debug!(
                        slot = ?slot,
                        "event {} for {:?} not applied: {:?}",
                        ev.name,
                        ev.ue_index.map(|u| u.value()),
                        res
                    );
                }
            }
        }
    }

    /// Stop accepting events (cell deactivation) and clear the backlog
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        let mut dropped = 0;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            tracing::info!("cell stop: cleared {} queued events", dropped);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn empty_repo() -> UeRepository {
        UeRepository::new(8)
    }

    #[test]
    fn test_events_drained_exactly_once() {
        let mgr = CellEventManager::new(16);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let c = Arc::clone(&counter);
            mgr.sender().push("test", None, move |_| {
                c.fetch_add(1, Ordering::SeqCst);
                EventResult::Processed
            });
        }

        let mut repo = empty_repo();
        let slot = SlotPoint::new(1, 0, 0);
        mgr.run_slot(slot, &mut repo);
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        // Nothing left for the next slot
        mgr.run_slot(slot.add_slots(1), &mut repo);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_capacity_exhaustion_drops() {
        let mgr = CellEventManager::new(2);
        let sender = mgr.sender();
        assert!(sender.push("a", None, |_| EventResult::Processed));
        assert!(sender.push("b", None, |_| EventResult::Processed));
        assert!(!sender.push("c", None, |_| EventResult::Processed));
    }

    #[test]
    fn test_invalid_ue_tolerated() {
        let mgr = CellEventManager::new(16);
        let ue = UeIndex::new(5);
        mgr.sender().push("bsr", Some(ue), move |repo| {
            if repo.get_mut(ue).is_none() {
                return EventResult::InvalidUe;
            }
            EventResult::Processed
        });
        // Drains without panicking even though UE 5 never existed
        mgr.run_slot(SlotPoint::new(1, 0, 0), &mut empty_repo());
    }

    #[test]
    fn test_stopped_cell_rejects_and_clears() {
        let mgr = CellEventManager::new(16);
        let sender = mgr.sender();
        sender.push("a", None, |_| EventResult::Processed);
        mgr.stop();
        assert!(!sender.push("b", None, |_| EventResult::Processed));

        let counter = Arc::new(AtomicUsize::new(0));
        mgr.run_slot(SlotPoint::new(1, 0, 0), &mut empty_repo());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cross_thread_producers() {
        let mgr = CellEventManager::new(64);
        let mut handles = Vec::new();
        for _ in 0..4 {
            let sender = mgr.sender();
            handles.push(std::thread::spawn(move || {
                for _ in 0..10 {
                    sender.push("x", None, |_| EventResult::Processed);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        mgr.sender().push("last", None, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            EventResult::Processed
        });
        mgr.run_slot(SlotPoint::new(1, 0, 0), &mut empty_repo());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
