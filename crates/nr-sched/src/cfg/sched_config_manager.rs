use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, RwLock};

use crossbeam_channel::{Receiver, Sender, unbounded};
use nr_config::{SharedCellConfig, UeConfig};
use nr_core::{CellIndex, MAX_NOF_UES, UeIndex};
use nr_msgs::{UeCreationRequest, UeReconfigurationRequest};

/// Per-index lifecycle state, held in an atomic so the control plane and the
/// scheduling plane agree on UE liveness without a mutex.
const STATE_FREE: u8 = 0;
const STATE_PENDING_CREATE: u8 = 1;
const STATE_LIVE: u8 = 2;
const STATE_PENDING_DELETE: u8 = 3;

struct UeSlot {
    state: AtomicU8,
    /// Authoritative configuration snapshot. Written by the control plane,
    /// read (cloned) by anyone; the RwLock is never taken on the per-slot
    /// allocation path, which works off the Arc clones held by UE contexts.
    cfg: RwLock<Option<Arc<UeConfig>>>,
}

/// Owner of all per-UE configuration snapshots and the UE-index lifecycle.
///
/// Index reservation uses compare-and-swap against the free state so two
/// concurrent creation requests for the same index cannot both succeed.
/// Validation happens before any state is published; a failed request leaves
/// nothing behind. Replaced and deleted snapshots are not freed on the caller
/// context; they go to a reclaim channel flushed off the hot path.
pub struct SchedConfigManager {
    cells: Vec<SharedCellConfig>,
    slots: Vec<UeSlot>,
    reclaim_tx: Sender<Arc<UeConfig>>,
    reclaim_rx: Receiver<Arc<UeConfig>>,
}

impl SchedConfigManager {
    pub fn new(cells: Vec<SharedCellConfig>) -> Self {
        assert!(!cells.is_empty(), "scheduler needs at least one cell");
        let (reclaim_tx, reclaim_rx) = unbounded();
        Self {
            cells,
            slots: (0..MAX_NOF_UES)
                .map(|_| UeSlot {
                    state: AtomicU8::new(STATE_FREE),
                    cfg: RwLock::new(None),
                })
                .collect(),
            reclaim_tx,
            reclaim_rx,
        }
    }

    pub fn cell(&self, cell_index: CellIndex) -> Option<&SharedCellConfig> {
        self.cells.get(cell_index.as_usize())
    }

    pub fn nof_cells(&self) -> usize {
        self.cells.len()
    }

    fn cell_exists(&self, cell_index: CellIndex) -> bool {
        cell_index.as_usize() < self.cells.len()
    }

    /// Reserve the UE index and publish a validated configuration in the
    /// pending-creation state. All-or-nothing: on any failure the reservation
    /// is released and no state remains.
    pub fn add_ue(&self, req: &UeCreationRequest) -> Result<Arc<UeConfig>, String> {
        let slot = &self.slots[req.ue_index.as_usize()];

        // Claim the index first so concurrent creations race on the CAS, not
        // on the validation outcome
        if slot
            .state
            .compare_exchange(STATE_FREE, STATE_PENDING_CREATE, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(format!("{} is already reserved", req.ue_index));
        }

        let cfg = UeConfig {
            ue_index: req.ue_index,
            crnti: req.crnti,
            pcell: req.pcell,
            scells: req.scells.clone(),
            lc_list: req.lc_list.clone(),
            tag: req.tag,
            drx: req.drx,
            version: 0,
        };
        if let Err(e) = cfg.validate(|c| self.cell_exists(c)) {
            slot.state.store(STATE_FREE, Ordering::Release);
            return Err(e);
        }

        let cfg = Arc::new(cfg);
        *slot.cfg.write().expect("ue cfg lock poisoned") = Some(Arc::clone(&cfg));
        Ok(cfg)
    }

    /// Creation stage in the cell context succeeded: the UE is live
    pub fn confirm_creation(&self, ue_index: UeIndex) {
        let prev = self.slots[ue_index.as_usize()]
            .state
            .swap(STATE_LIVE, Ordering::Release);
        assert!(prev == STATE_PENDING_CREATE, "{} confirm_creation in state {}", ue_index, prev);
    }

    /// Roll back a reserved index after a later creation stage failed
    pub fn abort_creation(&self, ue_index: UeIndex) {
        let slot = &self.slots[ue_index.as_usize()];
        if let Some(cfg) = slot.cfg.write().expect("ue cfg lock poisoned").take() {
            let _ = self.reclaim_tx.send(cfg);
        }
        let prev = slot.state.swap(STATE_FREE, Ordering::Release);
        assert!(prev == STATE_PENDING_CREATE, "{} abort_creation in state {}", ue_index, prev);
    }

    /// Build, validate and atomically swap in a delta-reconfigured snapshot.
    /// The previous snapshot goes to the reclaim channel.
    pub fn update_ue(&self, req: &UeReconfigurationRequest) -> Result<Arc<UeConfig>, String> {
        let slot = &self.slots[req.ue_index.as_usize()];
        if slot.state.load(Ordering::Acquire) != STATE_LIVE {
            return Err(format!("{} is not live", req.ue_index));
        }

        let mut guard = slot.cfg.write().expect("ue cfg lock poisoned");
        let old = guard.as_ref().expect("live ue without config");
        let mut cfg = (**old).clone();
        cfg.version += 1;
        if let Some(crnti) = req.new_crnti {
            cfg.crnti = crnti;
        }
        if let Some(ref lc_list) = req.new_lc_list {
            cfg.lc_list = lc_list.clone();
        }
        if let Some(drx) = req.new_drx {
            cfg.drx = drx;
        }
        cfg.validate(|c| self.cell_exists(c))?;

        let cfg = Arc::new(cfg);
        let old = guard.replace(Arc::clone(&cfg)).unwrap();
        let _ = self.reclaim_tx.send(old);
        Ok(cfg)
    }

    /// Begin deletion: the index stays reserved until `complete_deletion`,
    /// so it cannot be handed to a new UE while cell-side cleanup is in
    /// flight.
    pub fn start_deletion(&self, ue_index: UeIndex) -> Result<(), String> {
        let slot = &self.slots[ue_index.as_usize()];
        if slot
            .state
            .compare_exchange(STATE_LIVE, STATE_PENDING_DELETE, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(format!("{} is not live", ue_index));
        }
        Ok(())
    }

    /// Cell-side cleanup finished: release the configuration and the index
    pub fn complete_deletion(&self, ue_index: UeIndex) {
        let slot = &self.slots[ue_index.as_usize()];
        if let Some(cfg) = slot.cfg.write().expect("ue cfg lock poisoned").take() {
            let _ = self.reclaim_tx.send(cfg);
        }
        let prev = slot.state.swap(STATE_FREE, Ordering::Release);
        assert!(prev == STATE_PENDING_DELETE, "{} complete_deletion in state {}", ue_index, prev);
    }

    pub fn is_live(&self, ue_index: UeIndex) -> bool {
        self.slots[ue_index.as_usize()].state.load(Ordering::Acquire) == STATE_LIVE
    }

    pub fn get(&self, ue_index: UeIndex) -> Option<Arc<UeConfig>> {
        self.slots[ue_index.as_usize()]
            .cfg
            .read()
            .expect("ue cfg lock poisoned")
            .clone()
    }

    /// Drop snapshots queued for reclamation. Called from a control-plane
    /// context, never from slot processing. Returns how many were freed.
    pub fn flush_reclaimed(&self) -> usize {
        let mut n = 0;
        while self.reclaim_rx.try_recv().is_ok() {
            n += 1;
        }
        if n > 0 {
            tracing::trace!("flush_reclaimed: dropped {} stale ue config snapshots", n);
        }
        n
    }
}
