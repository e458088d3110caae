use nr_core::{Direction, HarqId, LcId, PrbInterval, SlotPoint};
use nr_msgs::SubPdu;

use super::RV_SEQUENCE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarqState {
    Empty,
    /// Transmitted, waiting for ACK/NACK feedback
    WaitingAck,
    /// NACKed or timed out; a retransmission must be allocated
    PendingRetx,
}

/// Outcome of applying ACK/NACK feedback or a timeout to a process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Acked,
    /// Retransmission required; the process holds the grant parameters
    Retx,
    /// Max retransmissions exceeded, transport block dropped
    Dropped,
}

/// One HARQ process: at most one outstanding transport block at a time, with
/// enough of the grant parameters saved to regenerate the same allocation
/// cardinality on retransmission.
pub struct HarqProcess {
    pub id: HarqId,
    pub direction: Direction,
    state: HarqState,
    pub tbs_bytes: u32,
    pub mcs: u8,
    pub rv: u8,
    pub nof_retxs: u8,
    pub prbs: PrbInterval,
    /// Slot the PDSCH/PUSCH of the current transmission occupies
    pub tx_slot: SlotPoint,
    /// Slot after which a missing ACK is treated as NACK
    ack_wait_until: SlotPoint,
    /// DL only: subPDU layout, reused on retransmission
    pub subpdus: Vec<SubPdu>,
}

impl HarqProcess {
    pub fn new(id: HarqId, direction: Direction) -> Self {
        Self {
            id,
            direction,
            state: HarqState::Empty,
            tbs_bytes: 0,
            mcs: 0,
            rv: 0,
            nof_retxs: 0,
            prbs: PrbInterval::empty(),
            tx_slot: SlotPoint::new(0, 0, 0),
            ack_wait_until: SlotPoint::new(0, 0, 0),
            subpdus: Vec::new(),
        }
    }

    pub fn state(&self) -> HarqState {
        self.state
    }

    pub fn is_empty(&self) -> bool {
        self.state == HarqState::Empty
    }

    /// Start a new transmission. The process must be empty.
    pub fn new_tx(
        &mut self,
        tx_slot: SlotPoint,
        ack_wait_until: SlotPoint,
        prbs: PrbInterval,
        tbs_bytes: u32,
        mcs: u8,
        subpdus: Vec<SubPdu>,
    ) {
        assert!(
            self.state == HarqState::Empty,
            "harq {:?} new_tx while {:?}",
            self.id,
            self.state
        );
        self.state = HarqState::WaitingAck;
        self.tbs_bytes = tbs_bytes;
        self.mcs = mcs;
        self.rv = RV_SEQUENCE[0];
        self.nof_retxs = 0;
        self.prbs = prbs;
        self.tx_slot = tx_slot;
        self.ack_wait_until = ack_wait_until;
        self.subpdus = subpdus;
    }

    /// Start a retransmission of the held transport block. The PRB count and
    /// TBS stay as allocated for the first transmission; only the placement
    /// and redundancy version change.
    pub fn new_retx(&mut self, tx_slot: SlotPoint, ack_wait_until: SlotPoint, prbs: PrbInterval) {
        assert!(
            self.state == HarqState::PendingRetx,
            "harq {:?} new_retx while {:?}",
            self.id,
            self.state
        );
        assert!(
            prbs.len() == self.prbs.len(),
            "harq {:?} retx prb count {} != original {}",
            self.id,
            prbs.len(),
            self.prbs.len()
        );
        self.state = HarqState::WaitingAck;
        self.nof_retxs += 1;
        self.rv = RV_SEQUENCE[self.nof_retxs as usize % RV_SEQUENCE.len()];
        self.prbs = prbs;
        self.tx_slot = tx_slot;
        self.ack_wait_until = ack_wait_until;
    }

    /// Apply ACK/NACK feedback. Ignored when the process has nothing
    /// outstanding (late or duplicate feedback).
    pub fn handle_ack(&mut self, ack: bool, max_retxs: u8) -> Option<AckOutcome> {
        if self.state != HarqState::WaitingAck {
            tracing::debug!("harq {:?}: feedback in state {:?} ignored", self.id, self.state);
            return None;
        }
        if ack {
            self.reset();
            return Some(AckOutcome::Acked);
        }
        if self.nof_retxs >= max_retxs {
            tracing::warn!(
                "harq {:?}: dropping tb of {} bytes after {} retxs",
                self.id,
                self.tbs_bytes,
                self.nof_retxs
            );
            self.reset();
            return Some(AckOutcome::Dropped);
        }
        self.state = HarqState::PendingRetx;
        Some(AckOutcome::Retx)
    }

    /// Treat a missed ACK deadline as NACK
    pub fn slot_indication(&mut self, now: SlotPoint, max_retxs: u8) {
        if self.state == HarqState::WaitingAck && now.diff(self.ack_wait_until) >= 0 {
            tracing::debug!("harq {:?}: ack timeout, treating as nack", self.id);
            self.handle_ack(false, max_retxs);
        }
    }

    /// Bytes of SDU payload carried for `lcid` in the outstanding TB
    pub fn sdu_bytes_for(&self, lcid: LcId) -> u32 {
        self.subpdus
            .iter()
            .filter_map(|p| match p {
                SubPdu::Sdu { lcid: l, bytes } if *l == lcid => Some(*bytes),
                _ => None,
            })
            .sum()
    }

    fn reset(&mut self) {
        self.state = HarqState::Empty;
        self.tbs_bytes = 0;
        self.nof_retxs = 0;
        self.subpdus.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started_process() -> HarqProcess {
        let mut h = HarqProcess::new(HarqId(0), Direction::Dl);
        h.new_tx(
            SlotPoint::new(1, 1, 0),
            SlotPoint::new(1, 2, 0),
            PrbInterval::new(0, 10),
            500,
            10,
            vec![SubPdu::Sdu { lcid: LcId::SRB1, bytes: 498 }],
        );
        h
    }

    #[test]
    fn test_ack_returns_to_empty() {
        let mut h = started_process();
        assert_eq!(h.state(), HarqState::WaitingAck);
        assert_eq!(h.handle_ack(true, 4), Some(AckOutcome::Acked));
        assert!(h.is_empty());
        // Duplicate feedback is ignored
        assert_eq!(h.handle_ack(true, 4), None);
    }

    #[test]
    fn test_nack_then_retx_keeps_cardinality() {
        let mut h = started_process();
        assert_eq!(h.handle_ack(false, 4), Some(AckOutcome::Retx));
        assert_eq!(h.state(), HarqState::PendingRetx);

        h.new_retx(SlotPoint::new(1, 3, 0), SlotPoint::new(1, 4, 0), PrbInterval::new(20, 30));
        assert_eq!(h.nof_retxs, 1);
        assert_eq!(h.rv, RV_SEQUENCE[1]);
        assert_eq!(h.tbs_bytes, 500);
        assert_eq!(h.sdu_bytes_for(LcId::SRB1), 498);
    }

    #[test]
    #[should_panic]
    fn test_retx_with_different_prb_count_panics() {
        let mut h = started_process();
        h.handle_ack(false, 4);
        h.new_retx(SlotPoint::new(1, 3, 0), SlotPoint::new(1, 4, 0), PrbInterval::new(0, 5));
    }

    #[test]
    fn test_max_retx_drops() {
        let mut h = started_process();
        assert_eq!(h.handle_ack(false, 0), Some(AckOutcome::Dropped));
        assert!(h.is_empty());
    }

    #[test]
    fn test_timeout_acts_as_nack() {
        let mut h = started_process();
        h.slot_indication(SlotPoint::new(1, 1, 5), 4);
        assert_eq!(h.state(), HarqState::WaitingAck);
        h.slot_indication(SlotPoint::new(1, 2, 0), 4);
        assert_eq!(h.state(), HarqState::PendingRetx);
    }

    #[test]
    #[should_panic]
    fn test_double_new_tx_panics() {
        let mut h = started_process();
        h.new_tx(
            SlotPoint::new(1, 1, 0),
            SlotPoint::new(1, 2, 0),
            PrbInterval::new(0, 10),
            500,
            10,
            vec![],
        );
    }
}
