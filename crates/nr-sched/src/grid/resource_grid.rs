use nr_config::MAX_SCHED_AHEAD_SLOTS;
use nr_core::{PrbInterval, SlotPoint};

/// Number of future slots the grid can hold bookings for. Config validation
/// bounds every allocation offset (fallback look-ahead, k2) by this, so the
/// in-window assertion below cannot fire for a validated configuration.
const GRID_RING_SIZE: usize = MAX_SCHED_AHEAD_SLOTS;

#[derive(Clone, Copy)]
struct SlotGridEntry {
    slot: Option<SlotPoint>,
    next_free_prb: u16,
    cces_used: u8,
    /// PRBs booked for DRB traffic, capped by the slice policy
    drb_prbs: u16,
}

const EMPTY_ENTRY: SlotGridEntry = SlotGridEntry {
    slot: None,
    next_free_prb: 0,
    cces_used: 0,
    drb_prbs: 0,
};

/// Per-slot PDCCH CCE and PDSCH/PUSCH PRB booking over a ring of upcoming
/// slots. PRBs are handed out contiguously from the bottom of the carrier;
/// entries are recycled as the current slot advances past them.
pub struct ResourceGrid {
    nof_prbs: u16,
    nof_cces: u8,
    ring: [SlotGridEntry; GRID_RING_SIZE],
    now: Option<SlotPoint>,
}

impl ResourceGrid {
    pub fn new(nof_prbs: u16, nof_cces: u8) -> Self {
        Self {
            nof_prbs,
            nof_cces,
            ring: [EMPTY_ENTRY; GRID_RING_SIZE],
            now: None,
        }
    }

    /// Advance the current slot, invalidating entries that fell into the past
    pub fn advance(&mut self, now: SlotPoint) {
        self.now = Some(now);
        for entry in self.ring.iter_mut() {
            if let Some(slot) = entry.slot {
                if now.diff(slot) > 0 {
                    *entry = EMPTY_ENTRY;
                }
            }
        }
    }

    fn entry_mut(&mut self, slot: SlotPoint) -> &mut SlotGridEntry {
        let now = self.now.expect("grid used before advance()");
        let ahead = slot.diff(now);
        assert!(
            ahead >= 0 && (ahead as usize) < GRID_RING_SIZE,
            "slot {} outside grid window of {} ahead of {}",
            slot,
            GRID_RING_SIZE,
            now
        );
        let idx = slot.to_count() as usize % GRID_RING_SIZE;
        let entry = &mut self.ring[idx];
        if entry.slot != Some(slot) {
            *entry = EMPTY_ENTRY;
            entry.slot = Some(slot);
        }
        entry
    }

    /// PRBs still free in `slot`
    pub fn available_prbs(&mut self, slot: SlotPoint) -> u16 {
        let nof_prbs = self.nof_prbs;
        nof_prbs - self.entry_mut(slot).next_free_prb
    }

    /// CCEs still free in `slot`
    pub fn available_cces(&mut self, slot: SlotPoint) -> u8 {
        let nof_cces = self.nof_cces;
        nof_cces - self.entry_mut(slot).cces_used
    }

    /// Book `cces` PDCCH CCEs in `slot` without any PRBs, as needed for a
    /// DCI whose PUSCH lies in a later slot
    pub fn try_alloc_cces(&mut self, slot: SlotPoint, cces: u8) -> bool {
        let nof_cces = self.nof_cces;
        let entry = self.entry_mut(slot);
        if entry.cces_used + cces > nof_cces {
            return false;
        }
        entry.cces_used += cces;
        true
    }

    /// Book `cces` PDCCH CCEs plus up to `max_prbs` PRBs (at least
    /// `min_prbs`) in `slot`. DRB bookings additionally respect
    /// `drb_prb_cap`, the slice policy's per-slot cap. Returns the booked PRB
    /// interval, or None with nothing booked.
    pub fn try_alloc(
        &mut self,
        slot: SlotPoint,
        cces: u8,
        min_prbs: u16,
        max_prbs: u16,
        drb_cap: Option<u16>,
    ) -> Option<PrbInterval> {
        let nof_prbs = self.nof_prbs;
        let nof_cces = self.nof_cces;
        let entry = self.entry_mut(slot);

        if entry.cces_used + cces > nof_cces {
            return None;
        }
        let mut free = nof_prbs - entry.next_free_prb;
        if let Some(cap) = drb_cap {
            free = free.min(cap.saturating_sub(entry.drb_prbs));
        }
        if free < min_prbs || min_prbs == 0 {
            return None;
        }
        let nof = free.min(max_prbs);
        let interval = PrbInterval::new(entry.next_free_prb, entry.next_free_prb + nof);
        entry.next_free_prb += nof;
        entry.cces_used += cces;
        if drb_cap.is_some() {
            entry.drb_prbs += nof;
        }
        Some(interval)
    }
}
