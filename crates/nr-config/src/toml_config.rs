//! TOML configuration loading for the simulator binary.
//!
//! DTO structs mirror the file layout; unknown fields are rejected so typos
//! in config files fail loudly instead of silently using defaults.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use nr_core::{LcId, LcgId};
use serde::Deserialize;
use toml::Value;

use crate::cell::{CellConfig, FallbackConfig, HarqConfig, SharedCellConfig, TaConfig};
use crate::ue::LcConfig;

/// A simulated UE as described in the config file
#[derive(Debug, Clone)]
pub struct SimUeConfig {
    pub crnti: u16,
    pub lc_list: Vec<LcConfig>,
    /// Mean DL load offered to the lowest-priority DRB, bytes per slot
    pub dl_load_bytes: u32,
    /// Mean UL load reported via BSR, bytes per slot
    pub ul_load_bytes: u32,
}

/// Top-level simulator configuration
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub debug_log: Option<String>,
    pub cell: CellConfig,
    pub ues: Vec<SimUeConfig>,
    /// Number of slots to run; None runs until interrupted
    pub nof_slots: Option<u64>,
}

impl SimConfig {
    pub fn shared_cell(&self) -> SharedCellConfig {
        SharedCellConfig::from_config(self.cell.clone())
    }
}

/// Build a `SimConfig` from a TOML configuration string
pub fn from_toml_str(toml_str: &str) -> Result<SimConfig, Box<dyn std::error::Error>> {
    let root: TomlRoot = toml::from_str(toml_str)?;

    if !root.extra.is_empty() {
        return Err(format!("Unrecognized top-level fields: {:?}", sorted_keys(&root.extra)).into());
    }
    if let Some(ref cell) = root.cell {
        if !cell.extra.is_empty() {
            return Err(format!("Unrecognized fields: cell::{:?}", sorted_keys(&cell.extra)).into());
        }
    }
    for (i, ue) in root.ue.iter().enumerate() {
        if !ue.extra.is_empty() {
            return Err(format!("Unrecognized fields: ue[{}]::{:?}", i, sorted_keys(&ue.extra)).into());
        }
    }

    let mut cell = CellConfig::default();
    if let Some(dto) = root.cell {
        apply_cell_patch(&mut cell, dto);
    }
    cell.validate()?;

    let mut ues = Vec::with_capacity(root.ue.len());
    for dto in root.ue {
        ues.push(build_sim_ue(dto)?);
    }

    Ok(SimConfig {
        debug_log: root.debug_log,
        cell,
        ues,
        nof_slots: root.nof_slots,
    })
}

/// Build a `SimConfig` from any reader.
pub fn from_reader<R: Read>(reader: R) -> Result<SimConfig, Box<dyn std::error::Error>> {
    let mut contents = String::new();
    let mut reader = BufReader::new(reader);
    reader.read_to_string(&mut contents)?;
    from_toml_str(&contents)
}

/// Build a `SimConfig` from a file path.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<SimConfig, Box<dyn std::error::Error>> {
    let f = File::open(path)?;
    from_reader(BufReader::new(f))
}

fn sorted_keys(map: &HashMap<String, Value>) -> Vec<&String> {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    keys
}

fn apply_cell_patch(dst: &mut CellConfig, src: CellDto) {
    if let Some(v) = src.numerology {
        dst.numerology = v;
    }
    if let Some(v) = src.nof_prbs {
        dst.nof_prbs = v;
    }
    if let Some(v) = src.nof_cces {
        dst.nof_cces = v;
    }
    if let Some(v) = src.harq_processes {
        dst.harq = HarqConfig {
            nof_processes: v,
            ..dst.harq.clone()
        };
    }
    if let Some(v) = src.max_retxs {
        dst.harq.max_retxs = v;
    }
    if let Some(v) = src.ta_measurement_slots {
        dst.ta = TaConfig {
            measurement_slots: v,
            ..dst.ta.clone()
        };
    }
    if let Some(v) = src.ta_prohibit_slots {
        dst.ta.prohibit_slots = v;
    }
    if let Some(v) = src.ta_cmd_threshold {
        dst.ta.cmd_offset_threshold = v;
    }
    if let Some(v) = src.fallback_slots_ahead {
        dst.fallback = FallbackConfig {
            max_slots_ahead: v,
            ..dst.fallback.clone()
        };
    }
}

fn build_sim_ue(dto: UeDto) -> Result<SimUeConfig, String> {
    let mut lc_list = vec![LcConfig::srb(LcId::SRB1)];
    for drb in &dto.drbs {
        if drb.lcid < 4 || drb.lcid > 32 {
            return Err(format!("drb lcid {} out of range 4..=32", drb.lcid));
        }
        lc_list.push(LcConfig {
            lcid: LcId::new(drb.lcid),
            lcg: LcgId::new(drb.lcg),
            priority: drb.priority,
            gbr: None,
        });
    }
    Ok(SimUeConfig {
        crnti: dto.crnti,
        lc_list,
        dl_load_bytes: dto.dl_load_bytes.unwrap_or(0),
        ul_load_bytes: dto.ul_load_bytes.unwrap_or(0),
    })
}

#[derive(Debug, Deserialize)]
struct TomlRoot {
    debug_log: Option<String>,
    nof_slots: Option<u64>,
    cell: Option<CellDto>,
    #[serde(default)]
    ue: Vec<UeDto>,
    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct CellDto {
    numerology: Option<u8>,
    nof_prbs: Option<u16>,
    nof_cces: Option<u8>,
    harq_processes: Option<u8>,
    max_retxs: Option<u8>,
    ta_measurement_slots: Option<u32>,
    ta_prohibit_slots: Option<u32>,
    ta_cmd_threshold: Option<i8>,
    fallback_slots_ahead: Option<usize>,
    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct UeDto {
    crnti: u16,
    #[serde(default)]
    drbs: Vec<DrbDto>,
    dl_load_bytes: Option<u32>,
    ul_load_bytes: Option<u32>,
    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct DrbDto {
    lcid: u8,
    lcg: u8,
    priority: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        nof_slots = 2000

        [cell]
        numerology = 1
        nof_prbs = 52
        ta_cmd_threshold = 2

        [[ue]]
        crnti = 0x4601
        dl_load_bytes = 500
        drbs = [{ lcid = 4, lcg = 1, priority = 9 }]

        [[ue]]
        crnti = 0x4602
    "#;

    #[test]
    fn test_sample_config_parses() {
        let cfg = from_toml_str(SAMPLE).unwrap();
        assert_eq!(cfg.nof_slots, Some(2000));
        assert_eq!(cfg.cell.nof_prbs, 52);
        assert_eq!(cfg.cell.ta.cmd_offset_threshold, 2);
        assert_eq!(cfg.ues.len(), 2);
        assert_eq!(cfg.ues[0].crnti, 0x4601);
        // SRB1 is implicit, DRB follows
        assert_eq!(cfg.ues[0].lc_list.len(), 2);
        assert_eq!(cfg.ues[1].lc_list.len(), 1);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let bad = "nof_slot = 5";
        assert!(from_toml_str(bad).is_err());
    }

    #[test]
    fn test_bad_drb_lcid_rejected() {
        let bad = r#"
            [[ue]]
            crnti = 0x4601
            drbs = [{ lcid = 2, lcg = 1, priority = 9 }]
        "#;
        assert!(from_toml_str(bad).is_err());
    }
}
