use nr_core::{HarqId, LcId, PrbInterval, Rnti, SlotPoint, UeIndex};

use crate::ce::MacCe;

/// One entry of a transport block's subPDU layout.
/// Retransmissions must regenerate the same layout, so grants carry it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubPdu {
    Sdu { lcid: LcId, bytes: u32 },
    Ce(MacCe),
}

/// A downlink assignment for one UE in one slot
#[derive(Debug, Clone)]
pub struct DlGrant {
    pub ue_index: UeIndex,
    pub rnti: Rnti,
    pub harq_id: HarqId,
    /// Slot the PDSCH is transmitted in (may be ahead of the decision slot)
    pub pdsch_slot: SlotPoint,
    pub prbs: PrbInterval,
    pub tbs_bytes: u32,
    pub mcs: u8,
    pub rv: u8,
    pub nof_retxs: u8,
    pub subpdus: Vec<SubPdu>,
}

impl DlGrant {
    pub fn is_retx(&self) -> bool {
        self.nof_retxs > 0
    }
}

/// An uplink grant for one UE in one slot
#[derive(Debug, Clone)]
pub struct UlGrant {
    pub ue_index: UeIndex,
    pub rnti: Rnti,
    pub harq_id: HarqId,
    /// Slot the PUSCH is expected in
    pub pusch_slot: SlotPoint,
    pub prbs: PrbInterval,
    pub tbs_bytes: u32,
    pub mcs: u8,
    pub rv: u8,
    pub nof_retxs: u8,
}

/// Complete, internally consistent allocation decision for one (cell, slot)
#[derive(Debug, Clone)]
pub struct SchedResult {
    pub slot: SlotPoint,
    pub dl: Vec<DlGrant>,
    pub ul: Vec<UlGrant>,
}

impl SchedResult {
    pub fn empty(slot: SlotPoint) -> SchedResult {
        SchedResult {
            slot,
            dl: Vec::new(),
            ul: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.dl.is_empty() && self.ul.is_empty()
    }
}
