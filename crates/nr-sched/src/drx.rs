//! Per-UE DRX (discontinuous reception) controller.
//!
//! A UE with DRX configured only monitors PDCCH during the on-duration at
//! the start of each long cycle, or while the inactivity timer armed by a
//! new-tx grant is running. The allocators consult `is_active_time` before
//! considering the UE for a grant. A DRX Command CE sends the UE to sleep
//! immediately for the remainder of the cycle.

use nr_config::DrxConfig;
use nr_core::SlotPoint;

pub struct DrxController {
    cfg: Option<DrxConfig>,
    /// Inactivity timer expiry, armed by each new-tx grant
    inactivity_until: Option<SlotPoint>,
    /// Set by a DRX Command CE: suppress the current on-duration until the
    /// next cycle starts
    sleep_until_next_cycle: bool,
    last_cycle_start: Option<u32>,
}

impl DrxController {
    pub fn new(cfg: Option<DrxConfig>) -> Self {
        Self {
            cfg,
            inactivity_until: None,
            sleep_until_next_cycle: false,
            last_cycle_start: None,
        }
    }

    pub fn reconfigure(&mut self, cfg: Option<DrxConfig>) {
        self.cfg = cfg;
        self.inactivity_until = None;
        self.sleep_until_next_cycle = false;
    }

    /// Expire timers and detect cycle boundaries
    pub fn slot_indication(&mut self, slot: SlotPoint) {
        let Some(cfg) = self.cfg else { return };
        if let Some(until) = self.inactivity_until {
            if slot.diff(until) >= 0 {
                self.inactivity_until = None;
            }
        }
        let cycle_start = slot.to_count() - slot.to_count() % cfg.long_cycle_slots;
        if self.last_cycle_start != Some(cycle_start) {
            self.last_cycle_start = Some(cycle_start);
            self.sleep_until_next_cycle = false;
        }
    }

    /// True if the UE is monitoring PDCCH in this slot. UEs without DRX are
    /// always reachable.
    pub fn is_active_time(&self, slot: SlotPoint) -> bool {
        let Some(cfg) = self.cfg else { return true };
        if self.inactivity_until.is_some() {
            return true;
        }
        if self.sleep_until_next_cycle {
            return false;
        }
        slot.to_count() % cfg.long_cycle_slots < cfg.on_duration_slots
    }

    /// A new-tx grant keeps the UE awake for the inactivity period
    pub fn on_new_tx_grant(&mut self, slot: SlotPoint) {
        if let Some(cfg) = self.cfg {
            self.inactivity_until = Some(slot.add_slots(cfg.inactivity_slots as i32));
        }
    }

    /// DRX Command CE: stop the on-duration and inactivity timer now
    pub fn handle_drx_command(&mut self) {
        if self.cfg.is_some() {
            self.inactivity_until = None;
            self.sleep_until_next_cycle = true;
        }
    }
}
