use nr_config::SharedCellConfig;
use nr_core::{SlotPoint, assert_warn};
use nr_msgs::{DlGrant, SchedResult, UlGrant};

use super::link_adapt;
use super::tb_builder::fill_dl_tb;
use crate::events::{CellEventManager, EventSender};
use crate::fallback::FallbackScheduler;
use crate::fallback::fallback_scheduler::try_dl_retx;
use crate::grid::ResourceGrid;
use crate::ue::UeRepository;

/// Per-cell slot pipeline.
///
/// Logically single-threaded: all UE state mutation for this cell happens on
/// the context that calls `slot_indication`, either directly or via drained
/// feedback events. The struct is `Send` so each cell can live on its own
/// worker thread.
pub struct CellScheduler {
    cell: SharedCellConfig,
    ues: UeRepository,
    events: CellEventManager,
    grid: ResourceGrid,
    fallback: FallbackScheduler,
    last_slot: Option<SlotPoint>,
}

impl CellScheduler {
    pub fn new(cell: SharedCellConfig) -> Self {
        let cfg = cell.config();
        Self {
            ues: UeRepository::new(cfg.max_ues),
            events: CellEventManager::new(cfg.event_queue_capacity),
            grid: ResourceGrid::new(cfg.nof_prbs, cfg.nof_cces),
            fallback: FallbackScheduler::new(),
            cell,
            last_slot: None,
        }
    }

    pub fn event_sender(&self) -> EventSender {
        self.events.sender()
    }

    pub fn cell_config(&self) -> &SharedCellConfig {
        &self.cell
    }

    #[cfg(test)]
    pub fn ues(&mut self) -> &mut UeRepository {
        &mut self.ues
    }

    /// Stop the cell: feedback events are dropped from here on
    pub fn stop(&self) {
        self.events.stop();
        self.cell.state_write().active = false;
    }

    /// Produce the complete allocation decision for `slot`.
    ///
    /// Pipeline: drain feedback events, tick the per-UE state machines,
    /// serve fallback UEs, then DL retx, DL newtx, UL retx, UL newtx.
    pub fn slot_indication(&mut self, slot: SlotPoint) -> SchedResult {
        assert!(
            slot.numerology() == self.cell.config().numerology,
            "slot numerology {} does not match cell",
            slot.numerology()
        );
        if let Some(last) = self.last_slot {
            assert_warn!(slot.is_after(last), "non-monotonic slot {} after {}", slot, last);
        }
        self.last_slot = Some(slot);

        self.grid.advance(slot);
        self.events.run_slot(slot, &mut self.ues);
        for ue in self.ues.iter_mut() {
            ue.slot_indication(slot);
        }

        let mut res = SchedResult::empty(slot);
        let cfg = self.cell.config_arc();
        self.fallback.run_slot(slot, &cfg, &mut self.ues, &mut self.grid, &mut res);
        self.schedule_dl(slot, &mut res);
        self.schedule_ul(slot, &mut res);
        if !res.is_empty() {
            tracing::trace!(slot = ?slot, "{} dl / {} ul grants", res.dl.len(), res.ul.len());
        }
        res
    }

    /// Main DL allocator: retransmissions first, then new transmissions by
    /// logical channel priority. Fallback UEs are the fallback scheduler's
    /// business and skipped here.
    fn schedule_dl(&mut self, slot: SlotPoint, res: &mut SchedResult) {
        let cfg = self.cell.config_arc();
        let drb_cap = self.cell.state_read().max_drb_prbs;
        let ue_indexes = self.ues.ue_indexes();

        for &ue_index in &ue_indexes {
            let Some(ue) = self.ues.get_mut(ue_index) else { continue };
            if ue.is_fallback() || !ue.drx.is_active_time(slot) {
                continue;
            }
            try_dl_retx(ue, slot, &cfg, &mut self.grid, res);
        }

        for &ue_index in &ue_indexes {
            let Some(ue) = self.ues.get_mut(ue_index) else { continue };
            if ue.is_fallback() || !ue.drx.is_active_time(slot) {
                continue;
            }
            let pending = ue.dl_lc.pending_bytes();
            if pending == 0 {
                continue;
            }
            if ue.pcell().dl_harqs.find_empty().is_none() {
                tracing::debug!(slot = ?slot, "{}: no empty dl harq", ue_index);
                continue;
            }

            let (mcs, bpp) = link_adapt::link_params(ue.last_cqi);
            let max_prbs = pending.div_ceil(bpp).max(1) as u16;
            let min_prbs = (8u32.div_ceil(bpp)).max(1) as u16;
            // Pure-DRB transport blocks respect the slice policy's PRB cap
            let cap = if ue.dl_lc.has_srb_or_ce_pending() { None } else { Some(drb_cap) };

            let Some(prbs) = self.grid.try_alloc(slot, cfg.cces_per_grant, min_prbs, max_prbs, cap) else {
                continue;
            };
            let budget = prbs.len() as u32 * bpp;
            let (subpdus, used) = fill_dl_tb(&mut ue.dl_lc, budget);
            if used == 0 {
                continue;
            }

            let crnti = ue.crnti();
            let ack_wait = slot.add_slots((cfg.harq.k1 + cfg.harq.ack_timeout_slots) as i32);
            ue.drx.on_new_tx_grant(slot);
            let harq = ue.pcell().dl_harqs.find_empty().unwrap();
            harq.new_tx(slot, ack_wait, prbs, used, mcs, subpdus.clone());
            res.dl.push(DlGrant {
                ue_index,
                rnti: crnti,
                harq_id: harq.id,
                pdsch_slot: slot,
                prbs,
                tbs_bytes: used,
                mcs,
                rv: 0,
                nof_retxs: 0,
                subpdus,
            });
        }
    }

    /// Main UL allocator: retransmissions, then new grants sized from BSR
    /// state. The DCI occupies CCEs in the decision slot; the PUSCH lands k2
    /// slots later.
    fn schedule_ul(&mut self, slot: SlotPoint, res: &mut SchedResult) {
        let cfg = self.cell.config_arc();
        let pusch_slot = slot.add_slots(cfg.harq.k2 as i32);
        let ue_indexes = self.ues.ue_indexes();

        for &ue_index in &ue_indexes {
            let Some(ue) = self.ues.get_mut(ue_index) else { continue };
            if !ue.drx.is_active_time(slot) {
                continue;
            }
            let crnti = ue.crnti();
            let Some(harq) = ue.pcell().ul_harqs.find_pending_retx() else {
                continue;
            };
            let nof_prbs = harq.prbs.len();
            if !self.grid.try_alloc_cces(slot, cfg.cces_per_grant) {
                continue;
            }
            let Some(prbs) = self.grid.try_alloc(pusch_slot, 0, nof_prbs, nof_prbs, None) else {
                continue;
            };
            let ack_wait = pusch_slot.add_slots(cfg.harq.ack_timeout_slots as i32);
            harq.new_retx(pusch_slot, ack_wait, prbs);
            res.ul.push(UlGrant {
                ue_index,
                rnti: crnti,
                harq_id: harq.id,
                pusch_slot,
                prbs,
                tbs_bytes: harq.tbs_bytes,
                mcs: harq.mcs,
                rv: harq.rv,
                nof_retxs: harq.nof_retxs,
            });
        }

        for &ue_index in &ue_indexes {
            let Some(ue) = self.ues.get_mut(ue_index) else { continue };
            if !ue.drx.is_active_time(slot) {
                continue;
            }
            let pending = ue.pending_ul_newtx_bytes();
            if pending == 0 {
                continue;
            }
            if ue.pcell().ul_harqs.find_empty().is_none() {
                tracing::debug!(slot = ?slot, "{}: no empty ul harq", ue_index);
                continue;
            }

            let (mcs, bpp) = link_adapt::link_params(ue.last_cqi);
            let max_prbs = pending.div_ceil(bpp).max(1) as u16;
            let min_prbs = (8u32.div_ceil(bpp)).max(1) as u16;
            if !self.grid.try_alloc_cces(slot, cfg.cces_per_grant) {
                continue;
            }
            let Some(prbs) = self.grid.try_alloc(pusch_slot, 0, min_prbs, max_prbs, None) else {
                continue;
            };

            let crnti = ue.crnti();
            let tbs = prbs.len() as u32 * bpp;
            ue.ul_lc.on_grant_scheduled(tbs);
            ue.drx.on_new_tx_grant(slot);
            let ack_wait = pusch_slot.add_slots(cfg.harq.ack_timeout_slots as i32);
            let harq = ue.pcell().ul_harqs.find_empty().unwrap();
            harq.new_tx(pusch_slot, ack_wait, prbs, tbs, mcs, Vec::new());
            res.ul.push(UlGrant {
                ue_index,
                rnti: crnti,
                harq_id: harq.id,
                pusch_slot,
                prbs,
                tbs_bytes: tbs,
                mcs,
                rv: 0,
                nof_retxs: 0,
            });
        }
    }

    #[cfg(test)]
    pub fn get_ue(&mut self, ue_index: nr_core::UeIndex) -> Option<&mut crate::ue::UeContext> {
        self.ues.get_mut(ue_index)
    }
}
