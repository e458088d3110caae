use core::fmt;

use serde::Deserialize;

/// Maximum number of UEs a cell scheduler instance can track.
/// UE indices are array-slot identities in `0..MAX_NOF_UES`.
pub const MAX_NOF_UES: usize = 64;

/// Maximum number of logical channels per UE (LCID 0..=32)
pub const MAX_NOF_LCIDS: usize = 33;

/// Number of logical channel groups (LCG 0..=7)
pub const MAX_NOF_LCGS: usize = 8;

/// Maximum number of timing alignment groups per UE
pub const MAX_NOF_TAGS: usize = 4;

/// Stable per-UE array-slot identity, reused only after full teardown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UeIndex(u16);

impl UeIndex {
    pub fn new(index: u16) -> UeIndex {
        assert!((index as usize) < MAX_NOF_UES, "invalid ue index {}", index);
        UeIndex(index)
    }

    #[inline(always)]
    pub fn value(self) -> u16 {
        self.0
    }

    #[inline(always)]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for UeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ue={}", self.0)
    }
}

/// C-RNTI. Value 0 is reserved and used as the "unclaimed" sentinel by the
/// UE index reservation scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub struct Rnti(pub u16);

pub const INVALID_RNTI: u16 = 0;

impl Rnti {
    pub fn is_crnti(self) -> bool {
        self.0 >= 0x0001 && self.0 <= 0xFFEF
    }
}

impl fmt::Display for Rnti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rnti=0x{:04x}", self.0)
    }
}

/// Logical channel identifier, 0..=32
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub struct LcId(u8);

impl LcId {
    pub const SRB0: LcId = LcId(0);
    pub const SRB1: LcId = LcId(1);
    pub const SRB2: LcId = LcId(2);
    pub const SRB3: LcId = LcId(3);
    pub const MIN_DRB: LcId = LcId(4);

    pub fn new(lcid: u8) -> LcId {
        assert!((lcid as usize) < MAX_NOF_LCIDS, "invalid lcid {}", lcid);
        LcId(lcid)
    }

    #[inline(always)]
    pub fn value(self) -> u8 {
        self.0
    }

    #[inline(always)]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// True for the signalling radio bearers SRB0..SRB3
    #[inline(always)]
    pub fn is_srb(self) -> bool {
        self.0 <= 3
    }
}

impl fmt::Display for LcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            0..=3 => write!(f, "SRB{}", self.0),
            _ => write!(f, "LCID{}", self.0),
        }
    }
}

/// Logical channel group identifier, 0..=7
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub struct LcgId(u8);

impl LcgId {
    pub fn new(lcg: u8) -> LcgId {
        assert!((lcg as usize) < MAX_NOF_LCGS, "invalid lcg {}", lcg);
        LcgId(lcg)
    }

    #[inline(always)]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// HARQ process identifier within a UE-cell pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HarqId(pub u8);

/// Timing alignment group identifier, 0..=3
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub struct TagId(u8);

impl TagId {
    pub fn new(tag: u8) -> TagId {
        assert!((tag as usize) < MAX_NOF_TAGS, "invalid tag {}", tag);
        TagId(tag)
    }

    #[inline(always)]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Index of a DU cell within the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub struct CellIndex(pub u8);

impl CellIndex {
    #[inline(always)]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CellIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell={}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lcid_classes() {
        assert!(LcId::SRB0.is_srb());
        assert!(LcId::SRB1.is_srb());
        assert!(!LcId::new(4).is_srb());
        assert_eq!(format!("{}", LcId::SRB1), "SRB1");
        assert_eq!(format!("{}", LcId::new(7)), "LCID7");
    }

    #[test]
    #[should_panic]
    fn test_out_of_range_ue_index_panics() {
        let _ = UeIndex::new(MAX_NOF_UES as u16);
    }

    #[test]
    fn test_rnti_range() {
        assert!(!Rnti(INVALID_RNTI).is_crnti());
        assert!(Rnti(0x4601).is_crnti());
        assert!(!Rnti(0xFFF0).is_crnti());
    }
}
