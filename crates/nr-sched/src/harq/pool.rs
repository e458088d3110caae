use nr_core::{Direction, HarqId, LcId, SlotPoint};

use super::process::{HarqProcess, HarqState};

/// Pool of HARQ processes for one UE in one direction on one cell.
pub struct HarqPool {
    procs: Vec<HarqProcess>,
    max_retxs: u8,
}

impl HarqPool {
    pub fn new(direction: Direction, nof_processes: u8, max_retxs: u8) -> Self {
        assert!(nof_processes > 0 && nof_processes <= 16);
        Self {
            procs: (0..nof_processes).map(|i| HarqProcess::new(HarqId(i), direction)).collect(),
            max_retxs,
        }
    }

    pub fn max_retxs(&self) -> u8 {
        self.max_retxs
    }

    pub fn get_mut(&mut self, id: HarqId) -> Option<&mut HarqProcess> {
        self.procs.get_mut(id.0 as usize)
    }

    /// An empty process ready for a new transmission, if any
    pub fn find_empty(&mut self) -> Option<&mut HarqProcess> {
        self.procs.iter_mut().find(|p| p.is_empty())
    }

    /// The next process waiting for retransmission, lowest id first
    pub fn find_pending_retx(&mut self) -> Option<&mut HarqProcess> {
        self.procs.iter_mut().find(|p| p.state() == HarqState::PendingRetx)
    }

    /// Timeout sweep: WaitingAck processes past their deadline become NACKed
    pub fn slot_indication(&mut self, now: SlotPoint) {
        for p in &mut self.procs {
            p.slot_indication(now, self.max_retxs);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &HarqProcess> {
        self.procs.iter()
    }

    /// Total TBS bytes of outstanding (not yet acknowledged) transmissions
    pub fn outstanding_bytes(&self) -> u32 {
        self.procs.iter().filter(|p| !p.is_empty()).map(|p| p.tbs_bytes).sum()
    }

    /// SDU bytes for `lcid` committed to first transmissions whose PDSCH slot
    /// lies at or after `after`. Used to reconcile lagging upper-layer buffer
    /// reports with grants already issued this slot; main-path grants carry
    /// the tick slot itself as their PDSCH slot, so the comparison must not
    /// be strict.
    pub fn inflight_newtx_sdu_bytes(&self, lcid: LcId, after: SlotPoint) -> u32 {
        self.procs
            .iter()
            .filter(|p| !p.is_empty() && p.nof_retxs == 0 && !after.is_after(p.tx_slot))
            .map(|p| p.sdu_bytes_for(lcid))
            .sum()
    }

    /// Drop all state, e.g. on UE deletion
    pub fn clear(&mut self) {
        let dir = self.procs.first().map(|p| p.direction).unwrap_or(Direction::Dl);
        let n = self.procs.len() as u8;
        self.procs = (0..n).map(|i| HarqProcess::new(HarqId(i), dir)).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nr_core::PrbInterval;
    use nr_msgs::SubPdu;

    fn pool() -> HarqPool {
        HarqPool::new(Direction::Dl, 4, 4)
    }

    fn start_tx(pool: &mut HarqPool, tx_slot: SlotPoint, tbs: u32, lcid: LcId) -> HarqId {
        let p = pool.find_empty().unwrap();
        let id = p.id;
        p.new_tx(
            tx_slot,
            tx_slot.add_slots(8),
            PrbInterval::new(0, 5),
            tbs,
            10,
            vec![SubPdu::Sdu { lcid, bytes: tbs - 2 }],
        );
        id
    }

    #[test]
    fn test_find_empty_exhausts() {
        let mut pool = pool();
        let slot = SlotPoint::new(1, 0, 0);
        for _ in 0..4 {
            start_tx(&mut pool, slot, 100, LcId::SRB1);
        }
        assert!(pool.find_empty().is_none());
        assert_eq!(pool.outstanding_bytes(), 400);
    }

    #[test]
    fn test_pending_retx_after_timeout_sweep() {
        let mut pool = pool();
        let slot = SlotPoint::new(1, 0, 0);
        let id = start_tx(&mut pool, slot, 100, LcId::SRB1);

        assert!(pool.find_pending_retx().is_none());
        pool.slot_indication(slot.add_slots(8));
        assert_eq!(pool.find_pending_retx().unwrap().id, id);
    }

    #[test]
    fn test_inflight_newtx_bytes_filter() {
        let mut pool = pool();
        let tick = SlotPoint::new(1, 0, 0);

        // Scheduled in the tick slot itself, zero retxs: counted
        start_tx(&mut pool, tick, 100, LcId::new(4));
        // Other LCID: not counted
        start_tx(&mut pool, tick.add_slots(2), 50, LcId::SRB1);
        // Transmitted before the tick: not counted
        start_tx(&mut pool, tick.add_slots(-3), 80, LcId::new(4));

        assert_eq!(pool.inflight_newtx_sdu_bytes(LcId::new(4), tick), 98);
    }

    #[test]
    fn test_clear_empties_all() {
        let mut pool = pool();
        start_tx(&mut pool, SlotPoint::new(1, 0, 0), 100, LcId::SRB1);
        pool.clear();
        assert_eq!(pool.outstanding_bytes(), 0);
        assert!(pool.find_empty().is_some());
    }
}
