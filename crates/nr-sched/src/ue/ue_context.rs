use std::sync::Arc;

use nr_config::{CellConfig, UeConfig};
use nr_core::{CellIndex, Direction, LcId, Rnti, SlotPoint, UeIndex};

use super::SR_PLACEHOLDER_GRANT_BYTES;
use crate::drx::DrxController;
use crate::harq::HarqPool;
use crate::lc::{DlLcManager, UlLcManager};
use crate::ta::TaManager;

/// Per-cell sub-state of one UE: the HARQ pools for that serving cell
pub struct UeCellContext {
    pub cell_index: CellIndex,
    pub dl_harqs: HarqPool,
    pub ul_harqs: HarqPool,
}

impl UeCellContext {
    fn new(cell_index: CellIndex, cell_cfg: &CellConfig) -> Self {
        Self {
            cell_index,
            dl_harqs: HarqPool::new(Direction::Dl, cell_cfg.harq.nof_processes, cell_cfg.harq.max_retxs),
            ul_harqs: HarqPool::new(Direction::Ul, cell_cfg.harq.nof_processes, cell_cfg.harq.max_retxs),
        }
    }
}

/// Aggregated scheduling state of one admitted UE.
///
/// Owns the per-cell HARQ pools, logical channel managers, TA manager and
/// DRX controller, and exposes the scheduling-relevant queries the per-slot
/// allocators consume. The configuration snapshot is a cheap `Arc` clone;
/// the repository owns the authoritative copy.
pub struct UeContext {
    cfg: Arc<UeConfig>,
    pub dl_lc: DlLcManager,
    pub ul_lc: UlLcManager,
    pub ta: TaManager,
    pub drx: DrxController,
    pub cells: Vec<UeCellContext>,
    /// Last reported CQI, feeding link adaptation
    pub last_cqi: u8,
    /// Last reported power headroom, dB
    pub last_ph_db: Option<i16>,
    /// Slot of the most recent slot_indication tick
    last_sl_tx: SlotPoint,
    /// A reconfiguration was requested and the UE has not yet confirmed
    /// applying it
    reconfig_pending: bool,
}

impl UeContext {
    pub fn new(cfg: Arc<UeConfig>, cell_cfg: &CellConfig, starts_in_fallback: bool, con_res_id: Option<[u8; 6]>) -> Self {
        let mut dl_lc = DlLcManager::new(cell_cfg.ce_queue_capacity);
        dl_lc.configure(&cfg.lc_list);
        let mut ul_lc = UlLcManager::new();
        ul_lc.configure(&cfg.lc_list);

        let mut cells = vec![UeCellContext::new(cfg.pcell, cell_cfg)];
        for scell in &cfg.scells {
            cells.push(UeCellContext::new(*scell, cell_cfg));
        }

        let mut ue = Self {
            ta: TaManager::new(cell_cfg.ta.clone()),
            drx: DrxController::new(cfg.drx),
            dl_lc,
            ul_lc,
            cells,
            cfg,
            last_cqi: 6,
            last_ph_db: None,
            last_sl_tx: SlotPoint::new(cell_cfg.numerology, 0, 0),
            reconfig_pending: false,
        };
        if starts_in_fallback {
            ue.set_fallback(true);
        }
        if let Some(id) = con_res_id {
            ue.dl_lc.set_con_res_pending(id);
        }
        ue
    }

    pub fn ue_index(&self) -> UeIndex {
        self.cfg.ue_index
    }

    pub fn crnti(&self) -> Rnti {
        self.cfg.crnti
    }

    pub fn config(&self) -> &Arc<UeConfig> {
        &self.cfg
    }

    pub fn pcell(&mut self) -> &mut UeCellContext {
        &mut self.cells[0]
    }

    pub fn cell(&mut self, cell_index: CellIndex) -> Option<&mut UeCellContext> {
        self.cells.iter_mut().find(|c| c.cell_index == cell_index)
    }

    pub fn is_fallback(&self) -> bool {
        self.dl_lc.is_fallback()
    }

    pub fn set_fallback(&mut self, fallback: bool) {
        self.dl_lc.set_fallback(fallback);
        self.ul_lc.set_fallback(fallback);
    }

    /// Per-slot tick, called exactly once per slot. Order is fixed: the TA
    /// manager runs against the fresh CE queue state, DRX last.
    pub fn slot_indication(&mut self, slot: SlotPoint) {
        self.last_sl_tx = slot;
        self.ta.slot_indication(slot, &mut self.dl_lc);
        self.drx.slot_indication(slot);
        for cc in &mut self.cells {
            cc.dl_harqs.slot_indication(slot);
            cc.ul_harqs.slot_indication(slot);
        }
    }

    /// A reconfiguration was requested: re-enter fallback so the UE is not
    /// scheduled with a dedicated configuration it may not have applied yet.
    pub fn handle_reconfiguration_request(&mut self, new_cfg: Arc<UeConfig>) {
        tracing::debug!("{}: reconfiguration v{} -> v{}", self.cfg.ue_index, self.cfg.version, new_cfg.version);
        self.dl_lc.configure(&new_cfg.lc_list);
        self.ul_lc.configure(&new_cfg.lc_list);
        self.drx.reconfigure(new_cfg.drx);
        self.cfg = new_cfg;
        self.reconfig_pending = true;
        self.set_fallback(true);
    }

    /// UE confirmed applying the configuration: leave fallback
    pub fn handle_config_applied(&mut self) {
        if !self.reconfig_pending && !self.is_fallback() {
            tracing::debug!("{}: config_applied without pending reconfiguration", self.cfg.ue_index);
            return;
        }
        self.reconfig_pending = false;
        self.set_fallback(false);
    }

    /// Apply an upper-layer DL buffer report. The report lags the scheduler's
    /// own decisions, so bytes already committed to in-flight first
    /// transmissions scheduled after the last slot tick are subtracted before
    /// the occupancy is overwritten.
    pub fn handle_dl_buffer_state_indication(&mut self, lcid: LcId, bytes: u32) {
        let inflight: u32 = self
            .cells
            .iter()
            .map(|cc| cc.dl_harqs.inflight_newtx_sdu_bytes(lcid, self.last_sl_tx))
            .sum();
        self.dl_lc.handle_dl_buffer_status(lcid, bytes.saturating_sub(inflight));
    }

    /// Uplink bytes needing a new-tx grant: BSR-reported occupancy minus what
    /// outstanding UL HARQs already cover. A pending SR with an empty buffer
    /// yields a fixed placeholder so the UE can report a fresh BSR.
    pub fn pending_ul_newtx_bytes(&self) -> u32 {
        let outstanding: u32 = self.cells.iter().map(|cc| cc.ul_harqs.outstanding_bytes()).sum();
        let pending = self.ul_lc.pending_bytes().saturating_sub(outstanding);
        if pending == 0 && self.ul_lc.sr_pending() {
            return SR_PLACEHOLDER_GRANT_BYTES;
        }
        pending
    }
}
