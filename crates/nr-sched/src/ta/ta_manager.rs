use nr_config::TaConfig;
use nr_core::{MAX_NOF_TAGS, SlotPoint, TagId};
use nr_msgs::MacCe;

use super::{TA_CMD_MAX, TA_CMD_OFFSET_ZERO};
use crate::lc::DlLcManager;

/// Outlier cutoff in standard deviations for the trimmed mean
const OUTLIER_SIGMA: f32 = 1.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaState {
    /// Feature switched off via a negative command threshold
    Disabled,
    /// Waiting to start the next measurement window
    Idle,
    /// Accumulating N_TA samples until `window_end`
    Measure { window_end: SlotPoint },
    /// Cooldown after a command was sent, until `until`
    Prohibit { until: SlotPoint },
}

/// Per-UE timing-advance manager.
///
/// Collects N_TA-difference measurements per Timing Alignment Group over a
/// fixed window, condenses them into a TA command with an outlier-trimmed
/// mean, and enqueues a Timing Advance Command CE when the command deviates
/// enough from the no-op value. A prohibit cooldown throttles command storms.
pub struct TaManager {
    cfg: TaConfig,
    state: TaState,
    samples: [Vec<f32>; MAX_NOF_TAGS],
}

impl TaManager {
    pub fn new(cfg: TaConfig) -> Self {
        let state = if cfg.cmd_offset_threshold < 0 {
            TaState::Disabled
        } else {
            TaState::Idle
        };
        Self {
            cfg,
            state,
            samples: std::array::from_fn(|_| Vec::new()),
        }
    }

    /// Record one N_TA-difference sample. Accepted only while measuring and
    /// only if the UL SINR is good enough for the estimate to be trusted.
    pub fn handle_ul_n_ta_update_indication(&mut self, tag: TagId, n_ta_diff: i32, ul_sinr_db: f32) {
        if !matches!(self.state, TaState::Measure { .. }) {
            return;
        }
        if ul_sinr_db < self.cfg.sinr_threshold_db {
            tracing::trace!(
                "n_ta sample for tag={} discarded: sinr {:.1} below threshold {:.1}",
                tag.as_usize(),
                ul_sinr_db,
                self.cfg.sinr_threshold_db
            );
            return;
        }
        self.samples[tag.as_usize()].push(n_ta_diff as f32);
    }

    /// Drive the state machine. Returns true if a TA command CE was enqueued
    /// this slot.
    pub fn slot_indication(&mut self, slot: SlotPoint, dl_lc: &mut DlLcManager) -> bool {
        match self.state {
            TaState::Disabled => false,
            TaState::Idle => {
                self.state = TaState::Measure {
                    window_end: slot.add_slots(self.cfg.measurement_slots as i32),
                };
                false
            }
            TaState::Measure { window_end } => {
                if slot.diff(window_end) < 0 {
                    return false;
                }
                let sent = self.evaluate_window(slot, dl_lc);
                // Samples never leak into the next window, whether or not a
                // command went out
                for s in self.samples.iter_mut() {
                    s.clear();
                }
                if sent && self.cfg.prohibit_slots > 0 {
                    self.state = TaState::Prohibit {
                        until: slot.add_slots(self.cfg.prohibit_slots as i32),
                    };
                } else {
                    self.state = TaState::Idle;
                }
                sent
            }
            TaState::Prohibit { until } => {
                if slot.diff(until) >= 0 {
                    self.state = TaState::Idle;
                }
                false
            }
        }
    }

    /// Evaluate all TAGs at the end of a measurement window. Returns true if
    /// at least one command CE was enqueued.
    fn evaluate_window(&mut self, slot: SlotPoint, dl_lc: &mut DlLcManager) -> bool {
        let mut any_sent = false;
        for (tag_idx, samples) in self.samples.iter().enumerate() {
            if samples.is_empty() {
                continue;
            }
            let avg = trimmed_mean(samples);
            let cmd = (TA_CMD_OFFSET_ZERO + avg.round() as i32).clamp(0, TA_CMD_MAX);
            let deviation = (cmd - TA_CMD_OFFSET_ZERO).abs();
            if deviation < self.cfg.cmd_offset_threshold as i32 {
                tracing::trace!(
                    "tag={}: ta cmd {} within threshold {}, not sent",
                    tag_idx,
                    cmd,
                    self.cfg.cmd_offset_threshold
                );
                continue;
            }
            let ce = MacCe::TimingAdvanceCmd {
                tag: TagId::new(tag_idx as u8),
                cmd: cmd as u8,
            };
            if dl_lc.enqueue_ce(ce) {
                tracing::debug!(slot = ?slot, "tag={}: sending ta cmd {} ({} samples)", tag_idx, cmd, samples.len());
                any_sent = true;
            } else {
                // Queue full: retried after the next measurement window
                tracing::warn!(slot = ?slot, "tag={}: ce queue full, ta cmd {} dropped", tag_idx, cmd);
            }
        }
        any_sent
    }

    #[cfg(test)]
    fn is_measuring(&self) -> bool {
        matches!(self.state, TaState::Measure { .. })
    }
}

/// Mean with outliers beyond `OUTLIER_SIGMA` standard deviations removed.
/// Each sample is judged against the mean and deviation of the OTHER samples;
/// a lone large outlier inflates whole-set statistics enough to hide itself,
/// so it must not take part in the cutoff that flags it. With one or two
/// samples the deviation is undefined or degenerate, so the exact arithmetic
/// mean is used.
fn trimmed_mean(samples: &[f32]) -> f32 {
    let n = samples.len();
    let sum = samples.iter().sum::<f32>();
    let mean = sum / n as f32;
    if n <= 2 {
        return mean;
    }
    let m = (n - 1) as f32;
    let kept: Vec<f32> = (0..n)
        .filter(|&i| {
            let x = samples[i];
            let mean_rest = (sum - x) / m;
            let var_rest = samples
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, &y)| (y - mean_rest) * (y - mean_rest))
                .sum::<f32>()
                / m;
            (x - mean_rest).abs() <= OUTLIER_SIGMA * var_rest.sqrt()
        })
        .map(|i| samples[i])
        .collect();
    if kept.is_empty() {
        return mean;
    }
    kept.iter().sum::<f32>() / kept.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cfg() -> TaConfig {
        TaConfig {
            measurement_slots: 8,
            prohibit_slots: 16,
            cmd_offset_threshold: 5,
            sinr_threshold_db: 0.0,
        }
    }

    fn run_window(ta: &mut TaManager, dl_lc: &mut DlLcManager, start: SlotPoint, samples: &[(u8, i32)]) -> (bool, SlotPoint) {
        let mut slot = start;
        // First tick enters the measurement window
        assert!(!ta.slot_indication(slot, dl_lc));
        for (tag, val) in samples {
            ta.handle_ul_n_ta_update_indication(TagId::new(*tag), *val, 10.0);
        }
        let mut sent = false;
        for _ in 0..=8 {
            slot = slot.add_slots(1);
            sent |= ta.slot_indication(slot, dl_lc);
        }
        (sent, slot)
    }

    #[test]
    fn test_below_threshold_no_command() {
        let mut ta = TaManager::new(test_cfg());
        let mut dl_lc = DlLcManager::new(8);
        // All samples deviate less than the threshold of 5
        let (sent, _) = run_window(&mut ta, &mut dl_lc, SlotPoint::new(1, 0, 0), &[(0, 2), (0, 3), (0, 1)]);
        assert!(!sent);
        assert!(!dl_lc.has_pending_ces());
    }

    #[test]
    fn test_outlier_trimmed_command() {
        let mut ta = TaManager::new(test_cfg());
        let mut dl_lc = DlLcManager::new(8);
        // The 50 lies beyond 1.75 sigma and must not drag the mean; the
        // remaining samples average ~10, so cmd = 31 + 10 = 41
        let (sent, _) = run_window(
            &mut ta,
            &mut dl_lc,
            SlotPoint::new(1, 0, 0),
            &[(0, 10), (0, 11), (0, 9), (0, 50)],
        );
        assert!(sent);
        let ce = dl_lc.allocate_mac_ce(100).unwrap();
        assert_eq!(ce, MacCe::TimingAdvanceCmd { tag: TagId::new(0), cmd: 41 });
    }

    #[test]
    fn test_two_samples_use_exact_mean() {
        assert_eq!(trimmed_mean(&[10.0, 20.0]), 15.0);
        assert_eq!(trimmed_mean(&[7.0]), 7.0);
    }

    #[test]
    fn test_trimmed_mean_drops_lone_outlier() {
        // The 50 must not survive by inflating the deviation it is judged by
        let avg = trimmed_mean(&[10.0, 11.0, 9.0, 50.0]);
        assert!((avg - 10.0).abs() < 1e-3, "got {}", avg);

        // A balanced set is untouched
        let avg = trimmed_mean(&[10.0, 10.0, 11.0, 11.0]);
        assert!((avg - 10.5).abs() < 1e-3, "got {}", avg);
    }

    #[test]
    fn test_low_sinr_samples_discarded() {
        let mut cfg = test_cfg();
        cfg.sinr_threshold_db = 5.0;
        let mut ta = TaManager::new(cfg);
        let mut dl_lc = DlLcManager::new(8);

        let slot = SlotPoint::new(1, 0, 0);
        ta.slot_indication(slot, &mut dl_lc);
        ta.handle_ul_n_ta_update_indication(TagId::new(0), 20, 2.0);
        let mut s = slot;
        for _ in 0..=8 {
            s = s.add_slots(1);
            assert!(!ta.slot_indication(s, &mut dl_lc));
        }
        assert!(!dl_lc.has_pending_ces());
    }

    #[test]
    fn test_prohibit_suppresses_measurement() {
        let mut ta = TaManager::new(test_cfg());
        let mut dl_lc = DlLcManager::new(8);
        let (sent, mut slot) = run_window(&mut ta, &mut dl_lc, SlotPoint::new(1, 0, 0), &[(0, 20)]);
        assert!(sent);

        // During the prohibit window no samples are accepted and no new
        // measurement window is started
        ta.handle_ul_n_ta_update_indication(TagId::new(0), 20, 10.0);
        assert!(ta.samples[0].is_empty());
        for _ in 0..15 {
            slot = slot.add_slots(1);
            assert!(!ta.slot_indication(slot, &mut dl_lc));
        }
        // Prohibit elapsed: back to idle, next tick re-opens a window
        slot = slot.add_slots(1);
        ta.slot_indication(slot, &mut dl_lc);
        slot = slot.add_slots(1);
        ta.slot_indication(slot, &mut dl_lc);
        assert!(ta.is_measuring());
    }

    #[test]
    fn test_samples_cleared_at_window_end() {
        let mut cfg = test_cfg();
        cfg.prohibit_slots = 0;
        let mut ta = TaManager::new(cfg);
        let mut dl_lc = DlLcManager::new(8);
        let (sent, slot) = run_window(&mut ta, &mut dl_lc, SlotPoint::new(1, 0, 0), &[(0, 2)]);
        assert!(!sent);
        // Window closed without a command; samples must still be gone
        assert!(ta.samples[0].is_empty());
        // No prohibit configured: straight back to measuring
        ta.slot_indication(slot.add_slots(1), &mut dl_lc);
        assert!(ta.is_measuring());
    }

    #[test]
    fn test_disabled_by_negative_threshold() {
        let mut cfg = test_cfg();
        cfg.cmd_offset_threshold = -1;
        let mut ta = TaManager::new(cfg);
        let mut dl_lc = DlLcManager::new(8);
        assert!(!ta.slot_indication(SlotPoint::new(1, 0, 0), &mut dl_lc));
        assert_eq!(ta.state, TaState::Disabled);
    }

    #[test]
    fn test_command_clamped_to_legal_range() {
        let mut ta = TaManager::new(test_cfg());
        let mut dl_lc = DlLcManager::new(8);
        let (sent, _) = run_window(&mut ta, &mut dl_lc, SlotPoint::new(1, 0, 0), &[(0, 500)]);
        assert!(sent);
        let ce = dl_lc.allocate_mac_ce(100).unwrap();
        assert_eq!(ce, MacCe::TimingAdvanceCmd { tag: TagId::new(0), cmd: 63 });
    }
}
