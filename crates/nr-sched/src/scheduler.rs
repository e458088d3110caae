//! Top-level scheduler facade.
//!
//! Owns the per-cell schedulers, the UE configuration repository and the
//! completion notifier. Feedback handlers may be called from any execution
//! context; they enqueue events towards the owning cell, which applies them
//! at its next slot boundary. UE lifecycle requests run their validation on
//! the calling (control-plane) context and complete asynchronously via a
//! cell event, with rollback in reverse stage order on partial failure.

use std::sync::Arc;

use nr_config::SharedCellConfig;
use nr_core::{CellIndex, SlotPoint, UeIndex};
use nr_msgs::feedback::{
    BsrIndication, CrcIndication, DlBufferStateIndication, DlMacCeIndication, HarqAck, PhrIndication, SrsIndication,
    UciIndication, UlNtaUpdateIndication,
};
use nr_msgs::{MacCe, SchedNotifier, SchedResult, UeCreationRequest, UeReconfigurationRequest};

use crate::cell::CellScheduler;
use crate::cfg::SchedConfigManager;
use crate::events::{EventResult, EventSender};
use crate::ue::UeContext;

pub struct MacScheduler {
    cfg_mgr: Arc<SchedConfigManager>,
    cells: Vec<CellScheduler>,
    senders: Vec<EventSender>,
    notifier: Arc<dyn SchedNotifier>,
}

impl MacScheduler {
    pub fn new(cell_cfgs: Vec<SharedCellConfig>, notifier: Arc<dyn SchedNotifier>) -> Self {
        let cfg_mgr = Arc::new(SchedConfigManager::new(cell_cfgs.clone()));
        let cells: Vec<CellScheduler> = cell_cfgs.into_iter().map(CellScheduler::new).collect();
        let senders = cells.iter().map(|c| c.event_sender()).collect();
        Self {
            cfg_mgr,
            cells,
            senders,
            notifier,
        }
    }

    /// Run one slot for one cell. Called from that cell's scheduling context.
    pub fn slot_indication(&mut self, cell_index: CellIndex, slot: SlotPoint) -> SchedResult {
        self.cells[cell_index.as_usize()].slot_indication(slot)
    }

    pub fn cell(&mut self, cell_index: CellIndex) -> &mut CellScheduler {
        &mut self.cells[cell_index.as_usize()]
    }

    /// Control-plane maintenance: free replaced/deleted config snapshots
    pub fn flush_reclaimed(&self) -> usize {
        self.cfg_mgr.flush_reclaimed()
    }

    fn sender(&self, cell_index: CellIndex) -> Option<&EventSender> {
        self.senders.get(cell_index.as_usize())
    }

    // ---- UE lifecycle --------------------------------------------------

    /// Admit a new UE. Stage 1 (validate + reserve index + publish config)
    /// runs here; stage 2 (cell context creation) runs at the pcell's next
    /// slot boundary. Failure at stage 2 rolls back stage 1 before the
    /// failure notification fires.
    pub fn handle_ue_creation_request(&self, req: UeCreationRequest) {
        let ue_index = req.ue_index;
        let cfg = match self.cfg_mgr.add_ue(&req) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!("{} creation rejected: {}", ue_index, e);
                self.notifier.on_ue_config_complete(ue_index, false);
                return;
            }
        };

        let cell_cfg = self
            .cfg_mgr
            .cell(cfg.pcell)
            .expect("validated pcell must exist")
            .config_arc();
        let cfg_mgr = Arc::clone(&self.cfg_mgr);
        let notifier = Arc::clone(&self.notifier);
        let starts_in_fallback = req.starts_in_fallback;
        let con_res_id = req.con_res_id;

        let pushed = self.sender(cfg.pcell).is_some_and(|s| {
            s.push("ue_create", Some(ue_index), move |ues| {
                let ue = UeContext::new(cfg, &cell_cfg, starts_in_fallback, con_res_id);
                match ues.add_ue(ue) {
                    Ok(()) => {
                        cfg_mgr.confirm_creation(ue_index);
                        notifier.on_ue_config_complete(ue_index, true);
                    }
                    Err(e) => {
                        tracing::warn!("{} cell admission failed: {}", ue_index, e);
                        cfg_mgr.abort_creation(ue_index);
                        notifier.on_ue_config_complete(ue_index, false);
                    }
                }
                EventResult::Processed
            })
        });
        if !pushed {
            self.cfg_mgr.abort_creation(ue_index);
            self.notifier.on_ue_config_complete(ue_index, false);
        }
    }

    /// Apply a delta reconfiguration. The UE enters fallback until it
    /// confirms the new configuration via `handle_config_applied`.
    pub fn handle_ue_reconfiguration_request(&self, req: UeReconfigurationRequest) {
        let ue_index = req.ue_index;
        let cfg = match self.cfg_mgr.update_ue(&req) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!("{} reconfiguration rejected: {}", ue_index, e);
                self.notifier.on_ue_config_complete(ue_index, false);
                return;
            }
        };

        let notifier = Arc::clone(&self.notifier);
        let pushed = self.sender(cfg.pcell).is_some_and(|s| {
            let cfg = Arc::clone(&cfg);
            s.push("ue_reconfig", Some(ue_index), move |ues| {
                let Some(ue) = ues.get_mut(ue_index) else {
                    notifier.on_ue_config_complete(ue_index, false);
                    return EventResult::InvalidUe;
                };
                ue.handle_reconfiguration_request(cfg);
                notifier.on_ue_config_complete(ue_index, true);
                EventResult::Processed
            })
        });
        if !pushed {
            self.notifier.on_ue_config_complete(ue_index, false);
        }
    }

    /// The UE confirmed applying its configuration: leave fallback
    pub fn handle_config_applied(&self, ue_index: UeIndex) {
        let Some(cfg) = self.cfg_mgr.get(ue_index) else { return };
        if let Some(s) = self.sender(cfg.pcell) {
            s.push("config_applied", Some(ue_index), move |ues| match ues.get_mut(ue_index) {
                Some(ue) => {
                    ue.handle_config_applied();
                    EventResult::Processed
                }
                None => EventResult::InvalidUe,
            });
        }
    }

    /// Tear down a UE. The index stays reserved until cell-side cleanup has
    /// run; only then does the deletion notification fire and the index
    /// become reusable.
    pub fn handle_ue_deletion_request(&self, ue_index: UeIndex) {
        let Some(cfg) = self.cfg_mgr.get(ue_index) else {
            tracing::warn!("{} deletion for unknown ue", ue_index);
            return;
        };
        if let Err(e) = self.cfg_mgr.start_deletion(ue_index) {
            tracing::warn!("{} deletion rejected: {}", ue_index, e);
            return;
        }

        let cfg_mgr = Arc::clone(&self.cfg_mgr);
        let notifier = Arc::clone(&self.notifier);
        if let Some(s) = self.sender(cfg.pcell) {
            s.push("ue_delete", Some(ue_index), move |ues| {
                // Dropping the context drains HARQ and LC state with it
                let existed = ues.remove_ue(ue_index).is_some();
                cfg_mgr.complete_deletion(ue_index);
                notifier.on_ue_deletion_complete(ue_index);
                if existed { EventResult::Processed } else { EventResult::InvalidUe }
            });
        }
    }

    // ---- Feedback intake -----------------------------------------------

    pub fn handle_bsr_indication(&self, ind: BsrIndication) {
        if let Some(s) = self.sender(ind.cell_index) {
            let ue_index = ind.ue_index;
            s.push("bsr", Some(ue_index), move |ues| match ues.get_mut(ue_index) {
                Some(ue) => {
                    ue.ul_lc.handle_bsr(&ind.reports);
                    EventResult::Processed
                }
                None => EventResult::InvalidUe,
            });
        }
    }

    pub fn handle_crc_indication(&self, ind: CrcIndication) {
        if let Some(s) = self.sender(ind.cell_index) {
            let cell_index = ind.cell_index;
            s.push("crc", None, move |ues| {
                for crc in &ind.crcs {
                    let Some(ue) = ues.get_mut(crc.ue_index) else {
                        tracing::debug!("crc for unknown {}", crc.ue_index);
                        continue;
                    };
                    let tag = ue.config().tag;
                    let Some(cc) = ue.cell(cell_index) else {
                        tracing::debug!("crc for {} without context on {}", crc.ue_index, cell_index);
                        continue;
                    };
                    let max = cc.ul_harqs.max_retxs();
                    if let Some(h) = cc.ul_harqs.get_mut(crc.harq_id) {
                        h.handle_ack(crc.tb_crc_success, max);
                    }
                    if let Some(n_ta) = crc.time_advance_offset {
                        ue.ta
                            .handle_ul_n_ta_update_indication(tag, n_ta, crc.ul_sinr_db.unwrap_or(f32::MAX));
                    }
                }
                EventResult::Processed
            });
        }
    }

    pub fn handle_uci_indication(&self, ind: UciIndication) {
        if let Some(s) = self.sender(ind.cell_index) {
            let cell_index = ind.cell_index;
            s.push("uci", None, move |ues| {
                for uci in &ind.ucis {
                    let Some(ue) = ues.get_mut(uci.ue_index) else {
                        tracing::debug!("uci for unknown {}", uci.ue_index);
                        continue;
                    };
                    if let Some(csi) = uci.csi {
                        ue.last_cqi = csi.cqi;
                    }
                    if uci.sr_detected {
                        ue.ul_lc.handle_sr_indication();
                    }
                    let Some(cc) = ue.cell(cell_index) else { continue };
                    let max = cc.dl_harqs.max_retxs();
                    for (harq_id, ack) in &uci.harqs {
                        if let Some(h) = cc.dl_harqs.get_mut(*harq_id) {
                            // DTX means the UE likely missed the DCI; treat
                            // as NACK so the TB is retransmitted
                            h.handle_ack(*ack == HarqAck::Ack, max);
                        }
                    }
                }
                EventResult::Processed
            });
        }
    }

    pub fn handle_srs_indication(&self, ind: SrsIndication) {
        if let Some(s) = self.sender(ind.cell_index) {
            let ue_index = ind.ue_index;
            s.push("srs", Some(ue_index), move |ues| match ues.get_mut(ue_index) {
                Some(ue) => {
                    if let Some(n_ta) = ind.time_advance_offset {
                        let tag = ue.config().tag;
                        ue.ta
                            .handle_ul_n_ta_update_indication(tag, n_ta, ind.ul_sinr_db.unwrap_or(f32::MAX));
                    }
                    EventResult::Processed
                }
                None => EventResult::InvalidUe,
            });
        }
    }

    pub fn handle_phr_indication(&self, ind: PhrIndication) {
        if let Some(s) = self.sender(ind.cell_index) {
            let ue_index = ind.ue_index;
            s.push("phr", Some(ue_index), move |ues| match ues.get_mut(ue_index) {
                Some(ue) => {
                    ue.last_ph_db = Some(ind.ph_db);
                    EventResult::Processed
                }
                None => EventResult::InvalidUe,
            });
        }
    }

    pub fn handle_ul_nta_update_indication(&self, ind: UlNtaUpdateIndication) {
        if let Some(s) = self.sender(ind.cell_index) {
            let ue_index = ind.ue_index;
            s.push("nta_update", Some(ue_index), move |ues| match ues.get_mut(ue_index) {
                Some(ue) => {
                    ue.ta.handle_ul_n_ta_update_indication(ind.tag, ind.n_ta_diff, ind.ul_sinr_db);
                    EventResult::Processed
                }
                None => EventResult::InvalidUe,
            });
        }
    }

    /// RLC buffer occupancy update for a DL logical channel. Routed to the
    /// UE's pcell.
    pub fn handle_dl_buffer_state_indication(&self, ind: DlBufferStateIndication) {
        let Some(cfg) = self.cfg_mgr.get(ind.ue_index) else {
            tracing::debug!("dl buffer state for unknown {}", ind.ue_index);
            return;
        };
        if let Some(s) = self.sender(cfg.pcell) {
            let ue_index = ind.ue_index;
            s.push("dl_buffer_state", Some(ue_index), move |ues| match ues.get_mut(ue_index) {
                Some(ue) => {
                    ue.handle_dl_buffer_state_indication(ind.lcid, ind.bytes);
                    EventResult::Processed
                }
                None => EventResult::InvalidUe,
            });
        }
    }

    /// Upper MAC requests a CE to be sent to a UE
    pub fn handle_dl_mac_ce_indication(&self, ind: DlMacCeIndication) {
        let Some(cfg) = self.cfg_mgr.get(ind.ue_index) else {
            tracing::debug!("mac ce for unknown {}", ind.ue_index);
            return;
        };
        if let Some(s) = self.sender(cfg.pcell) {
            let ue_index = ind.ue_index;
            s.push("dl_mac_ce", Some(ue_index), move |ues| match ues.get_mut(ue_index) {
                Some(ue) => {
                    if ind.ce == MacCe::DrxCommand {
                        ue.drx.handle_drx_command();
                    }
                    ue.dl_lc.enqueue_ce(ind.ce);
                    EventResult::Processed
                }
                None => EventResult::InvalidUe,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use nr_config::{CellConfig, LcConfig};
    use nr_core::{LcId, LcgId, Rnti, TagId};
    use nr_msgs::feedback::{BsrFormat, BsrReport, CsiReport, UciPdu};

    /// Records completion notifications for assertions
    #[derive(Default)]
    struct RecordingNotifier {
        configs: Mutex<Vec<(UeIndex, bool)>>,
        deletions: Mutex<Vec<UeIndex>>,
    }

    impl SchedNotifier for RecordingNotifier {
        fn on_ue_config_complete(&self, ue_index: UeIndex, success: bool) {
            self.configs.lock().unwrap().push((ue_index, success));
        }
        fn on_ue_deletion_complete(&self, ue_index: UeIndex) {
            self.deletions.lock().unwrap().push(ue_index);
        }
    }

    fn scheduler() -> (MacScheduler, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let cells = vec![SharedCellConfig::from_config(CellConfig::default())];
        (MacScheduler::new(cells, notifier.clone()), notifier)
    }

    fn creation_req(index: u16) -> UeCreationRequest {
        UeCreationRequest {
            ue_index: UeIndex::new(index),
            crnti: Rnti(0x4600 + index),
            pcell: CellIndex(0),
            scells: vec![],
            lc_list: vec![
                LcConfig::srb(LcId::SRB1),
                LcConfig {
                    lcid: LcId::new(4),
                    lcg: LcgId::new(2),
                    priority: 9,
                    gbr: None,
                },
            ],
            tag: TagId::new(0),
            drx: None,
            starts_in_fallback: false,
            con_res_id: None,
        }
    }

    fn slot(n: i32) -> SlotPoint {
        SlotPoint::new(1, 0, 0).add_slots(n)
    }

    #[test]
    fn test_creation_completes_at_slot_boundary() {
        let (mut sched, notifier) = scheduler();
        sched.handle_ue_creation_request(creation_req(0));
        // Not admitted until the cell's slot runs
        assert!(notifier.configs.lock().unwrap().is_empty());

        sched.slot_indication(CellIndex(0), slot(0));
        assert_eq!(*notifier.configs.lock().unwrap(), vec![(UeIndex::new(0), true)]);
    }

    #[test]
    fn test_invalid_creation_rejected_synchronously() {
        let (sched, notifier) = scheduler();
        let mut req = creation_req(0);
        req.pcell = CellIndex(9);
        sched.handle_ue_creation_request(req);
        assert_eq!(*notifier.configs.lock().unwrap(), vec![(UeIndex::new(0), false)]);
    }

    #[test]
    fn test_duplicate_index_exactly_one_succeeds() {
        let (mut sched, notifier) = scheduler();
        sched.handle_ue_creation_request(creation_req(0));
        sched.handle_ue_creation_request(creation_req(0));
        sched.slot_indication(CellIndex(0), slot(0));

        let configs = notifier.configs.lock().unwrap();
        let wins = configs.iter().filter(|(_, ok)| *ok).count();
        assert_eq!(wins, 1);
        assert_eq!(configs.len(), 2);
    }

    #[test]
    fn test_deletion_before_reuse() {
        let (mut sched, notifier) = scheduler();
        sched.handle_ue_creation_request(creation_req(0));
        sched.slot_indication(CellIndex(0), slot(0));

        sched.handle_ue_deletion_request(UeIndex::new(0));
        // Cleanup has not run yet; the index must not be claimable
        sched.handle_ue_creation_request(creation_req(0));
        assert_eq!(notifier.configs.lock().unwrap().last(), Some(&(UeIndex::new(0), false)));
        assert!(notifier.deletions.lock().unwrap().is_empty());

        // Deletion completes at the slot boundary; then the index is free
        sched.slot_indication(CellIndex(0), slot(1));
        assert_eq!(*notifier.deletions.lock().unwrap(), vec![UeIndex::new(0)]);
        sched.handle_ue_creation_request(creation_req(0));
        sched.slot_indication(CellIndex(0), slot(2));
        assert_eq!(notifier.configs.lock().unwrap().last(), Some(&(UeIndex::new(0), true)));
    }

    #[test]
    fn test_bsr_to_ul_grant_round_trip() {
        let (mut sched, _) = scheduler();
        sched.handle_ue_creation_request(creation_req(0));
        sched.slot_indication(CellIndex(0), slot(0));

        sched.handle_bsr_indication(BsrIndication {
            ue_index: UeIndex::new(0),
            crnti: Rnti(0x4600),
            cell_index: CellIndex(0),
            format: BsrFormat::Short,
            reports: vec![BsrReport { lcg: LcgId::new(2), bytes: 400 }],
        });

        let res = sched.slot_indication(CellIndex(0), slot(1));
        assert_eq!(res.ul.len(), 1);
        assert!(res.ul[0].tbs_bytes >= 400);
    }

    #[test]
    fn test_feedback_for_deleted_ue_tolerated() {
        let (mut sched, _) = scheduler();
        sched.handle_ue_creation_request(creation_req(0));
        sched.slot_indication(CellIndex(0), slot(0));
        sched.handle_ue_deletion_request(UeIndex::new(0));
        sched.handle_bsr_indication(BsrIndication {
            ue_index: UeIndex::new(0),
            crnti: Rnti(0x4600),
            cell_index: CellIndex(0),
            format: BsrFormat::Short,
            reports: vec![BsrReport { lcg: LcgId::new(2), bytes: 400 }],
        });

        // Deletion drains first in queue order; the BSR then sees a dead UE
        // and is dropped without panicking
        let res = sched.slot_indication(CellIndex(0), slot(1));
        assert!(res.ul.is_empty());
    }

    #[test]
    fn test_csi_updates_link_adaptation() {
        let (mut sched, _) = scheduler();
        sched.handle_ue_creation_request(creation_req(0));
        sched.slot_indication(CellIndex(0), slot(0));

        sched.handle_uci_indication(UciIndication {
            cell_index: CellIndex(0),
            slot: slot(1),
            ucis: vec![UciPdu {
                ue_index: UeIndex::new(0),
                crnti: Rnti(0x4600),
                harqs: vec![],
                sr_detected: false,
                csi: Some(CsiReport { cqi: 15, rank: 1 }),
            }],
        });
        sched.slot_indication(CellIndex(0), slot(1));
        assert_eq!(sched.cell(CellIndex(0)).get_ue(UeIndex::new(0)).unwrap().last_cqi, 15);
    }

    #[test]
    fn test_reconfiguration_enters_then_leaves_fallback() {
        let (mut sched, notifier) = scheduler();
        sched.handle_ue_creation_request(creation_req(0));
        sched.slot_indication(CellIndex(0), slot(0));

        sched.handle_ue_reconfiguration_request(UeReconfigurationRequest {
            ue_index: UeIndex::new(0),
            new_crnti: None,
            new_lc_list: None,
            new_drx: None,
        });
        sched.slot_indication(CellIndex(0), slot(1));
        assert!(sched.cell(CellIndex(0)).get_ue(UeIndex::new(0)).unwrap().is_fallback());
        assert_eq!(notifier.configs.lock().unwrap().len(), 2);

        sched.handle_config_applied(UeIndex::new(0));
        sched.slot_indication(CellIndex(0), slot(2));
        assert!(!sched.cell(CellIndex(0)).get_ue(UeIndex::new(0)).unwrap().is_fallback());

        // A stale snapshot was queued for reclamation by the swap
        assert_eq!(sched.flush_reclaimed(), 1);
    }
}
