use nr_config::CellConfig;
use nr_core::{LcId, SlotPoint};
use nr_msgs::{DlGrant, SchedResult};

use crate::cell::link_adapt;
use crate::cell::tb_builder::fill_dl_tb;
use crate::grid::ResourceGrid;
use crate::ue::{UeContext, UeRepository};

/// Ring of slots recently found without PDCCH/PDSCH room, skipped cheaply on
/// subsequent attempts instead of re-deriving the failure
const BLOCKED_RING_SIZE: usize = 16;

/// Scheduling stage of a fallback UE, in service order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FallbackStage {
    ConRes,
    Srb0,
    Srb1,
}

/// Allocator for UEs in fallback mode (random access / early attach, or
/// mid-reconfiguration).
///
/// Serves, in priority order, the Contention Resolution CE, then SRB0, then
/// SRB1 new transmissions and retransmissions. Work per slot is bounded by a
/// slot look-ahead window (worst-case scheduling latency) and a cap on
/// allocation attempts (worst-case CPU when many UEs are in fallback at
/// once).
pub struct FallbackScheduler {
    blocked: [Option<SlotPoint>; BLOCKED_RING_SIZE],
}

impl FallbackScheduler {
    pub fn new() -> Self {
        Self {
            blocked: [None; BLOCKED_RING_SIZE],
        }
    }

    fn is_blocked(&self, slot: SlotPoint) -> bool {
        self.blocked[slot.to_count() as usize % BLOCKED_RING_SIZE] == Some(slot)
    }

    fn mark_blocked(&mut self, slot: SlotPoint) {
        self.blocked[slot.to_count() as usize % BLOCKED_RING_SIZE] = Some(slot);
    }

    fn stage_of(ue: &UeContext) -> Option<FallbackStage> {
        if ue.dl_lc.con_res_pending() {
            Some(FallbackStage::ConRes)
        } else if ue.dl_lc.buffer_status(LcId::SRB0) > 0 {
            Some(FallbackStage::Srb0)
        } else if ue.dl_lc.buffer_status(LcId::SRB1) > 0 {
            Some(FallbackStage::Srb1)
        } else {
            None
        }
    }

    pub fn run_slot(
        &mut self,
        slot: SlotPoint,
        cfg: &CellConfig,
        ues: &mut UeRepository,
        grid: &mut ResourceGrid,
        res: &mut SchedResult,
    ) {
        let mut attempts = 0;
        for ue_index in ues.ue_indexes() {
            if attempts >= cfg.fallback.max_attempts_per_slot {
                tracing::debug!(slot = ?slot, "fallback attempt budget exhausted");
                break;
            }
            let Some(ue) = ues.get_mut(ue_index) else { continue };
            if !ue.is_fallback() {
                continue;
            }

            // Retransmissions first; they hold resources that must drain. A
            // failed fit is specific to this grant's PRB count; the slot
            // stays available for smaller allocations.
            if ue.pcell().dl_harqs.find_pending_retx().is_some() {
                attempts += 1;
                if !try_dl_retx(ue, slot, cfg, grid, res) {
                    tracing::debug!(slot = ?slot, "fallback retx for {} does not fit", ue_index);
                }
                continue;
            }

            let Some(stage) = Self::stage_of(ue) else { continue };
            let pending = ue.dl_lc.pending_bytes();
            if pending == 0 {
                continue;
            }
            if ue.pcell().dl_harqs.find_empty().is_none() {
                continue;
            }

            let (mcs, bpp) = link_adapt::fallback_params();
            let max_prbs = pending.div_ceil(bpp).max(1) as u16;
            let min_prbs = (8u32.div_ceil(bpp)).max(1) as u16;

            for ahead in 0..cfg.fallback.max_slots_ahead {
                if attempts >= cfg.fallback.max_attempts_per_slot {
                    break;
                }
                let cand = slot.add_slots(ahead as i32);
                if self.is_blocked(cand) {
                    continue;
                }
                attempts += 1;
                let Some(prbs) = grid.try_alloc(cand, cfg.cces_per_grant, min_prbs, max_prbs, None) else {
                    self.mark_blocked(cand);
                    continue;
                };

                let budget = prbs.len() as u32 * bpp;
                let (subpdus, used) = fill_dl_tb(&mut ue.dl_lc, budget);
                assert!(used > 0, "fallback tb empty despite {} pending bytes", pending);

                let crnti = ue.crnti();
                let ack_wait = cand.add_slots((cfg.harq.k1 + cfg.harq.ack_timeout_slots) as i32);
                let harq = ue.pcell().dl_harqs.find_empty().unwrap();
                harq.new_tx(cand, ack_wait, prbs, used, mcs, subpdus.clone());
                tracing::debug!(
                    slot = ?slot,
                    "fallback {:?} grant for {}: {} bytes in {} at {}",
                    stage,
                    ue_index,
                    used,
                    prbs,
                    cand
                );
                res.dl.push(DlGrant {
                    ue_index,
                    rnti: crnti,
                    harq_id: harq.id,
                    pdsch_slot: cand,
                    prbs,
                    tbs_bytes: used,
                    mcs,
                    rv: 0,
                    nof_retxs: 0,
                    subpdus,
                });
                break;
            }
        }
    }
}

impl Default for FallbackScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Allocate a DL retransmission in the current slot, reusing the original
/// grant's PRB count and subPDU layout. Shared with the main allocator.
pub fn try_dl_retx(
    ue: &mut UeContext,
    slot: SlotPoint,
    cfg: &CellConfig,
    grid: &mut ResourceGrid,
    res: &mut SchedResult,
) -> bool {
    let crnti = ue.crnti();
    let ue_index = ue.ue_index();
    let Some(harq) = ue.pcell().dl_harqs.find_pending_retx() else {
        return false;
    };
    let nof_prbs = harq.prbs.len();
    let Some(prbs) = grid.try_alloc(slot, cfg.cces_per_grant, nof_prbs, nof_prbs, None) else {
        return false;
    };
    let ack_wait = slot.add_slots((cfg.harq.k1 + cfg.harq.ack_timeout_slots) as i32);
    harq.new_retx(slot, ack_wait, prbs);
    res.dl.push(DlGrant {
        ue_index,
        rnti: crnti,
        harq_id: harq.id,
        pdsch_slot: slot,
        prbs,
        tbs_bytes: harq.tbs_bytes,
        mcs: harq.mcs,
        rv: harq.rv,
        nof_retxs: harq.nof_retxs,
        subpdus: harq.subpdus.clone(),
    });
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use nr_config::{LcConfig, UeConfig};
    use nr_core::{CellIndex, Rnti, TagId, UeIndex};
    use nr_msgs::{MacCe, SubPdu};

    fn fallback_ue(cfg: &CellConfig, index: u16, con_res: Option<[u8; 6]>) -> UeContext {
        let ue_cfg = Arc::new(UeConfig {
            ue_index: UeIndex::new(index),
            crnti: Rnti(0x4600 + index),
            pcell: CellIndex(0),
            scells: vec![],
            lc_list: vec![LcConfig::srb(LcId::SRB1)],
            tag: TagId::new(0),
            drx: None,
            version: 0,
        });
        UeContext::new(ue_cfg, cfg, true, con_res)
    }

    fn setup() -> (CellConfig, UeRepository, ResourceGrid, FallbackScheduler, SlotPoint) {
        let cfg = CellConfig::default();
        let repo = UeRepository::new(cfg.max_ues);
        let mut grid = ResourceGrid::new(cfg.nof_prbs, cfg.nof_cces);
        let slot = SlotPoint::new(cfg.numerology, 2, 0);
        grid.advance(slot);
        (cfg, repo, grid, FallbackScheduler::new(), slot)
    }

    #[test]
    fn test_conres_scheduled_first() {
        let (cfg, mut repo, mut grid, mut fb, slot) = setup();
        let mut ue = fallback_ue(&cfg, 0, Some([5; 6]));
        ue.dl_lc.handle_dl_buffer_status(LcId::SRB0, 40);
        repo.add_ue(ue).unwrap();

        let mut res = SchedResult::empty(slot);
        fb.run_slot(slot, &cfg, &mut repo, &mut grid, &mut res);

        assert_eq!(res.dl.len(), 1);
        let grant = &res.dl[0];
        assert!(matches!(grant.subpdus[0], SubPdu::Ce(MacCe::ConResId(_))));
        assert!(matches!(grant.subpdus[1], SubPdu::Sdu { lcid: LcId::SRB0, .. }));
        assert!(!repo.get(UeIndex::new(0)).unwrap().dl_lc.con_res_pending());
    }

    #[test]
    fn test_non_fallback_ue_ignored() {
        let (cfg, mut repo, mut grid, mut fb, slot) = setup();
        let mut ue = fallback_ue(&cfg, 0, None);
        ue.set_fallback(false);
        ue.dl_lc.handle_dl_buffer_status(LcId::SRB1, 100);
        repo.add_ue(ue).unwrap();

        let mut res = SchedResult::empty(slot);
        fb.run_slot(slot, &cfg, &mut repo, &mut grid, &mut res);
        assert!(res.dl.is_empty());
    }

    #[test]
    fn test_look_ahead_when_current_slot_full() {
        let (cfg, mut repo, mut grid, mut fb, slot) = setup();
        // Exhaust the current slot's CCEs
        assert!(grid.try_alloc_cces(slot, cfg.nof_cces));

        let mut ue = fallback_ue(&cfg, 0, None);
        ue.dl_lc.handle_dl_buffer_status(LcId::SRB1, 100);
        repo.add_ue(ue).unwrap();

        let mut res = SchedResult::empty(slot);
        fb.run_slot(slot, &cfg, &mut repo, &mut grid, &mut res);
        assert_eq!(res.dl.len(), 1);
        assert_eq!(res.dl[0].pdsch_slot, slot.add_slots(1));
        // The full slot was marked and is skipped without a grid probe
        assert!(fb.is_blocked(slot));
    }

    #[test]
    fn test_attempt_budget_bounds_work() {
        let (mut cfg, mut repo, mut grid, mut fb, slot) = setup();
        cfg.fallback.max_attempts_per_slot = 2;
        for i in 0..4 {
            let mut ue = fallback_ue(&cfg, i, None);
            ue.dl_lc.handle_dl_buffer_status(LcId::SRB1, 100);
            repo.add_ue(ue).unwrap();
        }

        let mut res = SchedResult::empty(slot);
        fb.run_slot(slot, &cfg, &mut repo, &mut grid, &mut res);
        assert_eq!(res.dl.len(), 2);
    }

    #[test]
    fn test_failed_retx_leaves_slot_usable_for_others() {
        let (cfg, mut repo, mut grid, mut fb, slot) = setup();
        let mut ue = fallback_ue(&cfg, 0, None);
        ue.dl_lc.handle_dl_buffer_status(LcId::SRB1, 600);
        repo.add_ue(ue).unwrap();
        repo.add_ue(fallback_ue(&cfg, 1, None)).unwrap();

        // UE 0 gets a wide grant and NACKs it
        let mut res = SchedResult::empty(slot);
        fb.run_slot(slot, &cfg, &mut repo, &mut grid, &mut res);
        assert_eq!(res.dl.len(), 1);
        let first = res.dl[0].clone();
        let ue0 = repo.get_mut(UeIndex::new(0)).unwrap();
        ue0.pcell().dl_harqs.get_mut(first.harq_id).unwrap().handle_ack(false, cfg.harq.max_retxs);

        // Next slot is too full for the retx, but not for a small SRB1 PDU
        let slot2 = slot.add_slots(1);
        grid.advance(slot2);
        assert!(grid.try_alloc(slot2, 0, 40, 40, None).is_some());
        repo.get_mut(UeIndex::new(1))
            .unwrap()
            .dl_lc
            .handle_dl_buffer_status(LcId::SRB1, 40);

        let mut res2 = SchedResult::empty(slot2);
        fb.run_slot(slot2, &cfg, &mut repo, &mut grid, &mut res2);
        assert_eq!(res2.dl.len(), 1);
        assert_eq!(res2.dl[0].ue_index, UeIndex::new(1));
        assert_eq!(res2.dl[0].pdsch_slot, slot2);
        assert!(!fb.is_blocked(slot2));
    }

    #[test]
    fn test_retx_served_before_newtx() {
        let (cfg, mut repo, mut grid, mut fb, slot) = setup();
        let mut ue = fallback_ue(&cfg, 0, None);
        ue.dl_lc.handle_dl_buffer_status(LcId::SRB1, 60);
        repo.add_ue(ue).unwrap();

        // First slot: new transmission
        let mut res = SchedResult::empty(slot);
        fb.run_slot(slot, &cfg, &mut repo, &mut grid, &mut res);
        assert_eq!(res.dl.len(), 1);
        let first = res.dl[0].clone();

        // NACK it, then run a later slot: the retx reuses layout and size
        let ue = repo.get_mut(UeIndex::new(0)).unwrap();
        ue.pcell().dl_harqs.get_mut(first.harq_id).unwrap().handle_ack(false, cfg.harq.max_retxs);

        let slot2 = slot.add_slots(1);
        grid.advance(slot2);
        let mut res2 = SchedResult::empty(slot2);
        fb.run_slot(slot2, &cfg, &mut repo, &mut grid, &mut res2);
        assert_eq!(res2.dl.len(), 1);
        let retx = &res2.dl[0];
        assert_eq!(retx.nof_retxs, 1);
        assert_eq!(retx.tbs_bytes, first.tbs_bytes);
        assert_eq!(retx.prbs.len(), first.prbs.len());
        assert_eq!(retx.subpdus, first.subpdus);
    }
}
