use std::sync::{Arc, RwLock};

use nr_core::CellIndex;

/// How far ahead of the current slot any allocation may be placed. The
/// resource grid sizes its booking ring from this, so every slot offset the
/// allocators can produce (fallback look-ahead, k2) must stay below it.
pub const MAX_SCHED_AHEAD_SLOTS: usize = 32;

/// HARQ pool dimensioning and retransmission policy
#[derive(Debug, Clone)]
pub struct HarqConfig {
    /// Number of HARQ processes per UE per direction (1..=16)
    pub nof_processes: u8,
    /// Maximum number of retransmissions before a transport block is dropped
    pub max_retxs: u8,
    /// Slots after the expected ACK before an un-acknowledged process is
    /// treated as NACKed
    pub ack_timeout_slots: u32,
    /// PDSCH-to-HARQ-ACK delay in slots (k1)
    pub k1: u32,
    /// PDCCH-to-PUSCH delay in slots (k2)
    pub k2: u32,
}

impl Default for HarqConfig {
    fn default() -> Self {
        Self {
            nof_processes: 16,
            max_retxs: 4,
            ack_timeout_slots: 16,
            k1: 4,
            k2: 4,
        }
    }
}

/// Timing-advance manager configuration.
/// A negative command threshold disables the TA manager entirely.
#[derive(Debug, Clone)]
pub struct TaConfig {
    /// Length of the N_TA measurement window in slots
    pub measurement_slots: u32,
    /// Cooldown after a TA command was sent, in slots. 0 disables the
    /// prohibit state.
    pub prohibit_slots: u32,
    /// Minimum deviation from the no-op command value (31) for a TA command
    /// to be issued. Negative disables TA management.
    pub cmd_offset_threshold: i8,
    /// Samples reported with UL SINR below this are discarded
    pub sinr_threshold_db: f32,
}

impl Default for TaConfig {
    fn default() -> Self {
        Self {
            measurement_slots: 32,
            prohibit_slots: 64,
            cmd_offset_threshold: 1,
            sinr_threshold_db: 0.0,
        }
    }
}

/// Bounds on the fallback scheduler's per-slot work
#[derive(Debug, Clone)]
pub struct FallbackConfig {
    /// How many slots ahead of the current slot allocations may be placed
    pub max_slots_ahead: usize,
    /// Maximum scheduling attempts per slot across all fallback UEs
    pub max_attempts_per_slot: usize,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            max_slots_ahead: 8,
            max_attempts_per_slot: 8,
        }
    }
}

/// Immutable per-cell configuration snapshot.
/// Shared read-only by all UE contexts on the cell; never mutated in place
/// while referenced by an in-flight slot decision.
#[derive(Debug, Clone)]
pub struct CellConfig {
    pub cell_index: CellIndex,
    /// Numerology mu (0..=4); determines slots per frame
    pub numerology: u8,
    /// Carrier bandwidth in PRBs
    pub nof_prbs: u16,
    /// Admission limit for UEs on this cell
    pub max_ues: usize,
    /// PDCCH capacity in CCEs per slot
    pub nof_cces: u8,
    /// CCEs consumed by one DL or UL assignment
    pub cces_per_grant: u8,
    pub harq: HarqConfig,
    pub ta: TaConfig,
    pub fallback: FallbackConfig,
    /// Capacity of the per-cell feedback event queue
    pub event_queue_capacity: usize,
    /// Capacity of the per-UE MAC CE queue
    pub ce_queue_capacity: usize,
}

impl Default for CellConfig {
    fn default() -> Self {
        Self {
            cell_index: CellIndex(0),
            numerology: 1,
            nof_prbs: 106,
            max_ues: 32,
            nof_cces: 12,
            cces_per_grant: 2,
            harq: HarqConfig::default(),
            ta: TaConfig::default(),
            fallback: FallbackConfig::default(),
            event_queue_capacity: 1024,
            ce_queue_capacity: 16,
        }
    }
}

impl CellConfig {
    /// Validate that all configuration fields are structurally sound.
    pub fn validate(&self) -> Result<(), String> {
        if self.numerology > 4 {
            return Err(format!("numerology {} out of range 0..=4", self.numerology));
        }
        if self.nof_prbs == 0 || self.nof_prbs > 273 {
            return Err(format!("nof_prbs {} out of range 1..=273", self.nof_prbs));
        }
        if self.max_ues == 0 || self.max_ues > nr_core::MAX_NOF_UES {
            return Err(format!(
                "max_ues {} out of range 1..={}",
                self.max_ues,
                nr_core::MAX_NOF_UES
            ));
        }
        if self.nof_cces == 0 {
            return Err("nof_cces must be positive".into());
        }
        if self.cces_per_grant == 0 || self.cces_per_grant > self.nof_cces {
            return Err(format!(
                "cces_per_grant {} must be in 1..={}",
                self.cces_per_grant, self.nof_cces
            ));
        }
        if self.harq.nof_processes == 0 || self.harq.nof_processes > 16 {
            return Err(format!(
                "harq.nof_processes {} out of range 1..=16",
                self.harq.nof_processes
            ));
        }
        if self.ta.measurement_slots == 0 {
            return Err("ta.measurement_slots must be positive".into());
        }
        if self.harq.k2 as usize >= MAX_SCHED_AHEAD_SLOTS {
            return Err(format!("harq.k2 {} must be below {}", self.harq.k2, MAX_SCHED_AHEAD_SLOTS));
        }
        if self.fallback.max_slots_ahead == 0 || self.fallback.max_attempts_per_slot == 0 {
            return Err("fallback window and attempt bounds must be positive".into());
        }
        if self.fallback.max_slots_ahead > MAX_SCHED_AHEAD_SLOTS {
            return Err(format!(
                "fallback.max_slots_ahead {} exceeds the {}-slot allocation window",
                self.fallback.max_slots_ahead, MAX_SCHED_AHEAD_SLOTS
            ));
        }
        if self.event_queue_capacity == 0 || self.ce_queue_capacity == 0 {
            return Err("queue capacities must be positive".into());
        }
        Ok(())
    }
}

/// Mutable, reconfigurable per-cell state. Written only between slots.
#[derive(Debug, Clone)]
pub struct CellState {
    /// PRB cap for non-SRB (DRB) traffic per slot, from the slice RRM policy.
    /// SRB traffic is never capped.
    pub max_drb_prbs: u16,
    /// Cell accepts feedback events. Cleared on cell deactivation.
    pub active: bool,
}

impl CellState {
    fn for_cell(cfg: &CellConfig) -> Self {
        Self {
            max_drb_prbs: cfg.nof_prbs,
            active: true,
        }
    }
}

/// Shared cell configuration: immutable config + mutable state.
#[derive(Clone)]
pub struct SharedCellConfig {
    /// Read-only configuration (immutable after construction).
    cfg: Arc<CellConfig>,
    /// Mutable state guarded with RwLock (written by reconfiguration events,
    /// read by the allocators).
    state: Arc<RwLock<CellState>>,
}

impl SharedCellConfig {
    pub fn from_config(cfg: CellConfig) -> Self {
        // Check config for validity before returning the shared object
        match cfg.validate() {
            Ok(_) => {}
            Err(e) => panic!("Invalid cell configuration: {}", e),
        }
        let state = CellState::for_cell(&cfg);
        Self {
            cfg: Arc::new(cfg),
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Access immutable config.
    pub fn config(&self) -> &CellConfig {
        &self.cfg
    }

    pub fn config_arc(&self) -> Arc<CellConfig> {
        Arc::clone(&self.cfg)
    }

    /// Read guard for mutable state.
    pub fn state_read(&self) -> std::sync::RwLockReadGuard<'_, CellState> {
        self.state.read().expect("CellState RwLock blocked")
    }

    /// Write guard for mutable state.
    pub fn state_write(&self) -> std::sync::RwLockWriteGuard<'_, CellState> {
        self.state.write().expect("CellState RwLock blocked")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(CellConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_fields() {
        let mut cfg = CellConfig::default();
        cfg.nof_prbs = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = CellConfig::default();
        cfg.numerology = 5;
        assert!(cfg.validate().is_err());

        let mut cfg = CellConfig::default();
        cfg.harq.nof_processes = 17;
        assert!(cfg.validate().is_err());

        let mut cfg = CellConfig::default();
        cfg.cces_per_grant = cfg.nof_cces + 1;
        assert!(cfg.validate().is_err());

        // Offsets past the allocation window would panic in the grid
        let mut cfg = CellConfig::default();
        cfg.harq.k2 = MAX_SCHED_AHEAD_SLOTS as u32;
        assert!(cfg.validate().is_err());

        let mut cfg = CellConfig::default();
        cfg.fallback.max_slots_ahead = MAX_SCHED_AHEAD_SLOTS + 1;
        assert!(cfg.validate().is_err());
        cfg.fallback.max_slots_ahead = MAX_SCHED_AHEAD_SLOTS;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_state_defaults_to_full_prb_budget() {
        let shared = SharedCellConfig::from_config(CellConfig::default());
        assert_eq!(shared.state_read().max_drb_prbs, shared.config().nof_prbs);
        assert!(shared.state_read().active);

        shared.state_write().max_drb_prbs = 20;
        assert_eq!(shared.state_read().max_drb_prbs, 20);
    }
}
