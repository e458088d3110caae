use nr_msgs::SubPdu;

use crate::lc::DlLcManager;

/// Fill a downlink transport block of `budget` bytes from one UE's pending
/// CEs and SDUs, in the mandated order: ConRes first, then queued CEs, then
/// SDUs by channel priority. Returns the subPDU layout and the bytes used.
///
/// The logical channel manager enforces fallback eligibility internally, so
/// the same filling works for fallback and regular UEs.
pub fn fill_dl_tb(dl_lc: &mut DlLcManager, budget: u32) -> (Vec<SubPdu>, u32) {
    let mut subpdus = Vec::new();
    let mut rem = budget;

    if let Some(ce) = dl_lc.allocate_con_res_ce(rem) {
        rem -= ce.required_bytes();
        subpdus.push(SubPdu::Ce(ce));
    }
    while let Some(ce) = dl_lc.allocate_mac_ce(rem) {
        rem -= ce.required_bytes();
        subpdus.push(SubPdu::Ce(ce));
    }
    while let Some(sdu) = dl_lc.allocate_mac_sdu(rem, None) {
        rem -= sdu.total_bytes;
        subpdus.push(SubPdu::Sdu {
            lcid: sdu.lcid,
            bytes: sdu.payload_bytes,
        });
    }
    (subpdus, budget - rem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nr_config::LcConfig;
    use nr_core::{LcId, LcgId, TagId};
    use nr_msgs::MacCe;

    #[test]
    fn test_conres_then_ces_then_sdus() {
        let mut dl_lc = DlLcManager::new(8);
        dl_lc.configure(&[
            LcConfig::srb(LcId::SRB1),
            LcConfig {
                lcid: LcId::new(4),
                lcg: LcgId::new(1),
                priority: 9,
                gbr: None,
            },
        ]);
        dl_lc.set_con_res_pending([9; 6]);
        dl_lc.enqueue_ce(MacCe::TimingAdvanceCmd { tag: TagId::new(0), cmd: 40 });
        dl_lc.handle_dl_buffer_status(LcId::SRB1, 20);
        dl_lc.handle_dl_buffer_status(LcId::new(4), 30);

        let (subpdus, used) = fill_dl_tb(&mut dl_lc, 200);
        assert!(matches!(subpdus[0], SubPdu::Ce(MacCe::ConResId(_))));
        assert!(matches!(subpdus[1], SubPdu::Ce(MacCe::TimingAdvanceCmd { .. })));
        assert_eq!(subpdus[2], SubPdu::Sdu { lcid: LcId::SRB1, bytes: 20 });
        assert_eq!(subpdus[3], SubPdu::Sdu { lcid: LcId::new(4), bytes: 30 });
        // 7 (conres) + 2 (ta) + 21 + 31
        assert_eq!(used, 61);
        assert!(!dl_lc.has_pending_bytes());
    }

    #[test]
    fn test_budget_exhaustion_stops_filling() {
        let mut dl_lc = DlLcManager::new(8);
        dl_lc.configure(&[LcConfig::srb(LcId::SRB1)]);
        dl_lc.handle_dl_buffer_status(LcId::SRB1, 1000);

        let (subpdus, used) = fill_dl_tb(&mut dl_lc, 100);
        assert_eq!(subpdus.len(), 1);
        assert_eq!(used, 100);
        assert!(dl_lc.has_pending_bytes());
    }
}
