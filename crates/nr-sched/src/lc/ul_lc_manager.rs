use nr_core::{LcgId, MAX_NOF_LCGS};
use nr_config::LcConfig;
use nr_msgs::feedback::BsrReport;

/// Per-LCG uplink bookkeeping
#[derive(Default, Clone, Copy)]
struct UlLcGroup {
    active: bool,
    /// Group carries at least one SRB; only such groups are schedulable in
    /// fallback mode
    has_srb: bool,
    /// Last reported BSR occupancy in bytes
    bsr_bytes: u32,
}

/// Uplink logical channel manager for one UE.
///
/// The UE reports uplink buffer occupancy at LCG granularity via BSR. Grants
/// issued between two BSRs are tracked in an accumulator and subtracted from
/// the reported occupancy so the same bytes are not granted twice; a fresh
/// BSR resets the accumulator since its report already reflects them.
pub struct UlLcManager {
    groups: [UlLcGroup; MAX_NOF_LCGS],
    /// TB bytes granted since the last BSR arrived
    sched_since_bsr: u32,
    /// A Scheduling Request was detected and no grant has been issued yet
    sr_pending: bool,
    /// While set, only LCGs carrying SRBs are schedulable
    fallback: bool,
}

impl UlLcManager {
    pub fn new() -> Self {
        let mut mgr = Self {
            groups: [UlLcGroup::default(); MAX_NOF_LCGS],
            sched_since_bsr: 0,
            sr_pending: false,
            fallback: false,
        };
        // LCG0 carries SRB0 from birth
        mgr.groups[0] = UlLcGroup {
            active: true,
            has_srb: true,
            bsr_bytes: 0,
        };
        mgr
    }

    /// Replace the channel set. BSR state is preserved for groups that remain
    /// active across the diff; LCG0 stays active for SRB0.
    pub fn configure(&mut self, lc_list: &[LcConfig]) {
        for (i, grp) in self.groups.iter_mut().enumerate() {
            if i != 0 {
                grp.active = false;
            }
            grp.has_srb = i == 0;
        }
        for cfg in lc_list {
            let grp = &mut self.groups[cfg.lcg.as_usize()];
            grp.active = true;
            grp.has_srb |= cfg.lcid.is_srb();
        }
        for grp in self.groups.iter_mut() {
            if !grp.active {
                grp.bsr_bytes = 0;
            }
        }
    }

    pub fn set_fallback(&mut self, fallback: bool) {
        self.fallback = fallback;
    }

    /// Overwrite occupancy for the reported LCGs and reset the grant
    /// accumulator: the new report already accounts for bytes granted before
    /// it was built.
    pub fn handle_bsr(&mut self, reports: &[BsrReport]) {
        for rep in reports {
            let grp = &mut self.groups[rep.lcg.as_usize()];
            if !grp.active {
                tracing::warn!(
                    "handle_bsr: lcg={} not configured, ignoring {} bytes",
                    rep.lcg.as_usize(),
                    rep.bytes
                );
                continue;
            }
            tracing::trace!(
                "handle_bsr: lcg={} {} -> {} bytes",
                rep.lcg.as_usize(),
                grp.bsr_bytes,
                rep.bytes
            );
            grp.bsr_bytes = rep.bytes;
        }
        self.sched_since_bsr = 0;
    }

    pub fn handle_sr_indication(&mut self) {
        self.sr_pending = true;
    }

    pub fn sr_pending(&self) -> bool {
        self.sr_pending
    }

    /// Account a UL grant of `tbs_bytes` against the last BSR. Also clears a
    /// pending SR: the UE now has an opportunity to send a fresh report.
    pub fn on_grant_scheduled(&mut self, tbs_bytes: u32) {
        self.sched_since_bsr = self.sched_since_bsr.saturating_add(tbs_bytes);
        self.sr_pending = false;
    }

    /// Raw occupancy of one LCG, fallback-agnostic
    pub fn buffer_status(&self, lcg: LcgId) -> u32 {
        self.groups[lcg.as_usize()].bsr_bytes
    }

    /// Schedulable pending bytes: reported occupancy of eligible groups minus
    /// what has already been granted since the last BSR
    pub fn pending_bytes(&self) -> u32 {
        self.groups
            .iter()
            .filter(|g| g.active && (!self.fallback || g.has_srb))
            .map(|g| g.bsr_bytes)
            .sum::<u32>()
            .saturating_sub(self.sched_since_bsr)
    }

    /// Reported occupancy regardless of fallback eligibility or issued grants
    pub fn total_pending_bytes(&self) -> u32 {
        self.groups.iter().filter(|g| g.active).map(|g| g.bsr_bytes).sum()
    }

    pub fn has_pending_bytes(&self) -> bool {
        self.pending_bytes() > 0
    }
}

impl Default for UlLcManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nr_core::{LcId, LcgId};

    fn report(lcg: u8, bytes: u32) -> BsrReport {
        BsrReport {
            lcg: LcgId::new(lcg),
            bytes,
        }
    }

    fn configured_mgr() -> UlLcManager {
        let mut mgr = UlLcManager::new();
        mgr.configure(&[
            LcConfig::srb(LcId::SRB1),
            LcConfig {
                lcid: LcId::new(4),
                lcg: LcgId::new(2),
                priority: 9,
                gbr: None,
            },
        ]);
        mgr
    }

    #[test]
    fn test_bsr_overwrites() {
        let mut mgr = configured_mgr();
        mgr.handle_bsr(&[report(2, 1000)]);
        assert_eq!(mgr.pending_bytes(), 1000);
        mgr.handle_bsr(&[report(2, 400)]);
        assert_eq!(mgr.pending_bytes(), 400);
    }

    #[test]
    fn test_grant_accumulator_avoids_double_counting() {
        let mut mgr = configured_mgr();
        mgr.handle_bsr(&[report(2, 1000)]);
        mgr.on_grant_scheduled(600);
        assert_eq!(mgr.pending_bytes(), 400);
        mgr.on_grant_scheduled(600);
        assert_eq!(mgr.pending_bytes(), 0);

        // A fresh BSR resets the accumulator
        mgr.handle_bsr(&[report(2, 300)]);
        assert_eq!(mgr.pending_bytes(), 300);
    }

    #[test]
    fn test_unconfigured_lcg_ignored() {
        let mut mgr = configured_mgr();
        mgr.handle_bsr(&[report(5, 1000)]);
        assert_eq!(mgr.pending_bytes(), 0);
    }

    #[test]
    fn test_fallback_only_srb_groups() {
        let mut mgr = configured_mgr();
        mgr.handle_bsr(&[report(0, 50), report(2, 1000)]);
        mgr.set_fallback(true);
        assert_eq!(mgr.pending_bytes(), 50);
        assert_eq!(mgr.total_pending_bytes(), 1050);
        mgr.set_fallback(false);
        assert_eq!(mgr.pending_bytes(), 1050);
    }

    #[test]
    fn test_sr_cleared_by_grant() {
        let mut mgr = configured_mgr();
        mgr.handle_sr_indication();
        assert!(mgr.sr_pending());
        mgr.on_grant_scheduled(100);
        assert!(!mgr.sr_pending());
    }

    #[test]
    fn test_reconfigure_preserves_active_group_state() {
        let mut mgr = configured_mgr();
        mgr.handle_bsr(&[report(2, 500)]);

        // Drop the DRB on LCG2; its BSR state is cleared
        mgr.configure(&[LcConfig::srb(LcId::SRB1)]);
        assert_eq!(mgr.buffer_status(LcgId::new(2)), 0);
        assert_eq!(mgr.total_pending_bytes(), 0);
    }
}
