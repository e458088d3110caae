use nr_core::{CellIndex, LcId, LcgId, Rnti, TagId, UeIndex};
use serde::Deserialize;

/// Guaranteed-bitrate descriptor for a GBR DRB
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct GbrInfo {
    pub gbr_dl_bps: u64,
    pub mbr_dl_bps: u64,
}

/// Configuration of one logical channel
#[derive(Debug, Clone, Deserialize)]
pub struct LcConfig {
    pub lcid: LcId,
    pub lcg: LcgId,
    /// QoS priority level, 1 (highest) .. 16. Ignored for SRBs, whose rank is
    /// fixed by their LCID.
    pub priority: u8,
    pub gbr: Option<GbrInfo>,
}

impl LcConfig {
    pub fn srb(lcid: LcId) -> LcConfig {
        assert!(lcid.is_srb(), "srb config for non-SRB {}", lcid);
        LcConfig {
            lcid,
            lcg: LcgId::new(0),
            priority: lcid.value().max(1),
            gbr: None,
        }
    }
}

/// DRX power-saving configuration
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DrxConfig {
    /// Long DRX cycle length in slots
    pub long_cycle_slots: u32,
    /// On-duration at the start of each cycle, in slots
    pub on_duration_slots: u32,
    /// Inactivity timer armed by each new-tx grant, in slots
    pub inactivity_slots: u32,
}

/// Immutable, versioned per-UE configuration snapshot.
/// Owned by the scheduler configuration repository; UE contexts hold clones
/// of the containing Arc, valid until the next reconfiguration swap.
#[derive(Debug, Clone)]
pub struct UeConfig {
    pub ue_index: UeIndex,
    pub crnti: Rnti,
    pub pcell: CellIndex,
    pub scells: Vec<CellIndex>,
    pub lc_list: Vec<LcConfig>,
    pub tag: TagId,
    pub drx: Option<DrxConfig>,
    /// Incremented on every applied reconfiguration
    pub version: u32,
}

impl UeConfig {
    /// Structural validation. `cell_exists` is supplied by the owning
    /// repository since cell topology lives there.
    pub fn validate(&self, cell_exists: impl Fn(CellIndex) -> bool) -> Result<(), String> {
        if !self.crnti.is_crnti() {
            return Err(format!("{} is not a valid C-RNTI", self.crnti));
        }
        if !cell_exists(self.pcell) {
            return Err(format!("pcell {} does not exist", self.pcell));
        }
        for scell in &self.scells {
            if !cell_exists(*scell) {
                return Err(format!("scell {} does not exist", scell));
            }
            if *scell == self.pcell {
                return Err(format!("scell {} duplicates the pcell", scell));
            }
        }
        let mut seen = [false; nr_core::MAX_NOF_LCIDS];
        for lc in &self.lc_list {
            if seen[lc.lcid.as_usize()] {
                return Err(format!("duplicate logical channel {}", lc.lcid));
            }
            seen[lc.lcid.as_usize()] = true;
            if !lc.lcid.is_srb() && (lc.priority == 0 || lc.priority > 16) {
                return Err(format!("{} priority {} out of range 1..=16", lc.lcid, lc.priority));
            }
        }
        if !seen[LcId::SRB1.as_usize()] {
            return Err("configuration must contain SRB1".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_ue_config() -> UeConfig {
        UeConfig {
            ue_index: UeIndex::new(0),
            crnti: Rnti(0x4601),
            pcell: CellIndex(0),
            scells: vec![],
            lc_list: vec![LcConfig::srb(LcId::SRB1)],
            tag: TagId::new(0),
            drx: None,
            version: 0,
        }
    }

    #[test]
    fn test_valid_config_passes() {
        let cfg = test_ue_config();
        assert!(cfg.validate(|c| c == CellIndex(0)).is_ok());
    }

    #[test]
    fn test_missing_pcell_rejected() {
        let cfg = test_ue_config();
        assert!(cfg.validate(|_| false).is_err());
    }

    #[test]
    fn test_duplicate_lcid_rejected() {
        let mut cfg = test_ue_config();
        cfg.lc_list.push(LcConfig::srb(LcId::SRB1));
        assert!(cfg.validate(|_| true).is_err());
    }

    #[test]
    fn test_srb1_required() {
        let mut cfg = test_ue_config();
        cfg.lc_list.clear();
        assert!(cfg.validate(|_| true).is_err());
    }

    #[test]
    fn test_bad_drb_priority_rejected() {
        let mut cfg = test_ue_config();
        cfg.lc_list.push(LcConfig {
            lcid: LcId::new(4),
            lcg: LcgId::new(1),
            priority: 0,
            gbr: None,
        });
        assert!(cfg.validate(|_| true).is_err());
    }
}
