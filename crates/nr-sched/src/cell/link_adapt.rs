//! CQI-driven link adaptation.
//!
//! The detailed TBS computation of TS 38.214 is an opaque lookup service per
//! the scheduler's scoping; this table is a coarse stand-in mapping CQI to an
//! MCS and an approximate transport block capacity per PRB.

/// (MCS, approximate TB bytes per PRB) indexed by CQI 1..=15
const CQI_TABLE: [(u8, u32); 15] = [
    (0, 3),
    (2, 5),
    (4, 8),
    (6, 12),
    (8, 18),
    (10, 24),
    (12, 32),
    (14, 40),
    (16, 48),
    (18, 57),
    (20, 66),
    (22, 75),
    (24, 84),
    (26, 93),
    (28, 102),
];

/// MCS and TB bytes-per-PRB for a reported CQI. CQI 0 (out of range) is
/// treated as the most conservative entry.
pub fn link_params(cqi: u8) -> (u8, u32) {
    let idx = (cqi.clamp(1, 15) - 1) as usize;
    CQI_TABLE[idx]
}

/// Conservative parameters for UEs without usable CSI (fallback mode)
pub fn fallback_params() -> (u8, u32) {
    CQI_TABLE[2]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_in_cqi() {
        let mut prev = 0;
        for cqi in 1..=15 {
            let (_, bpp) = link_params(cqi);
            assert!(bpp > prev);
            prev = bpp;
        }
    }

    #[test]
    fn test_out_of_range_cqi_clamped() {
        assert_eq!(link_params(0), CQI_TABLE[0]);
        assert_eq!(link_params(200), CQI_TABLE[14]);
    }
}
