use nr_config::LcConfig;
use nr_core::{LcId, MAX_NOF_LCIDS, mac_sdu_max_payload, mac_sdu_required_bytes};
use nr_msgs::MacCe;

use super::ce_queue::CeQueue;
use super::RLC_SEGMENT_OVERHEAD;

/// Per-LCID downlink bookkeeping
struct DlChannel {
    cfg: LcConfig,
    active: bool,
    /// Last reported RLC buffer occupancy, adjusted by grants
    buf_bytes: u32,
}

/// Outcome of a MAC SDU allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SduAlloc {
    pub lcid: LcId,
    pub payload_bytes: u32,
    /// Bytes consumed from the TB budget, subheader included
    pub total_bytes: u32,
}

/// Downlink logical channel manager for one UE.
///
/// Tracks per-LCID pending bytes and the MAC CE queue, and answers the
/// allocator's "how much is pending" and "fill up to N bytes" queries when a
/// transport block is being built.
pub struct DlLcManager {
    channels: [Option<DlChannel>; MAX_NOF_LCIDS],
    /// Active LCIDs in scheduling order: SRBs by LCID, then DRBs by
    /// (QoS priority, LCID). Rebuilt on every configure().
    prio_order: Vec<LcId>,
    ces: CeQueue,
    /// While set, only SRB0/SRB1 and the ConRes CE are schedulable
    fallback: bool,
}

impl DlLcManager {
    pub fn new(ce_queue_capacity: usize) -> Self {
        let mut mgr = Self {
            channels: std::array::from_fn(|_| None),
            prio_order: Vec::new(),
            ces: CeQueue::new(ce_queue_capacity),
            fallback: false,
        };
        // SRB0 exists from birth and can never be deactivated
        mgr.channels[LcId::SRB0.as_usize()] = Some(DlChannel {
            cfg: LcConfig::srb(LcId::SRB0),
            active: true,
            buf_bytes: 0,
        });
        mgr.rebuild_prio_order();
        mgr
    }

    /// Replace the channel set. Buffer state is preserved for channels that
    /// persist across the diff; channels no longer present are deactivated
    /// (except SRB0).
    pub fn configure(&mut self, lc_list: &[LcConfig]) {
        for ch in self.channels.iter_mut().flatten() {
            if ch.cfg.lcid != LcId::SRB0 {
                ch.active = false;
            }
        }
        for cfg in lc_list {
            let slot = &mut self.channels[cfg.lcid.as_usize()];
            match slot {
                Some(ch) => {
                    ch.cfg = cfg.clone();
                    ch.active = true;
                }
                None => {
                    *slot = Some(DlChannel {
                        cfg: cfg.clone(),
                        active: true,
                        buf_bytes: 0,
                    });
                }
            }
        }
        self.rebuild_prio_order();
        tracing::debug!("configure: priority order now {:?}", self.prio_order);
    }

    /// Deterministic re-sort: SRBs ranked by LCID ahead of DRBs ranked by
    /// (QoS priority level, LCID ascending). Stable across repeated calls.
    fn rebuild_prio_order(&mut self) {
        self.prio_order = self
            .channels
            .iter()
            .flatten()
            .filter(|ch| ch.active)
            .map(|ch| ch.cfg.lcid)
            .collect();
        self.prio_order.sort_by_key(|lcid| {
            let ch = self.channels[lcid.as_usize()].as_ref().unwrap();
            let class = if lcid.is_srb() { 0u8 } else { 1 };
            let prio = if lcid.is_srb() { lcid.value() } else { ch.cfg.priority };
            (class, prio, lcid.value())
        });
    }

    pub fn set_fallback(&mut self, fallback: bool) {
        if self.fallback != fallback {
            tracing::debug!("set_fallback: {} -> {}", self.fallback, fallback);
        }
        self.fallback = fallback;
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    /// Scheduling eligibility of one LCID under the current fallback state
    fn is_eligible(&self, lcid: LcId) -> bool {
        if self.fallback {
            lcid == LcId::SRB0 || lcid == LcId::SRB1
        } else {
            true
        }
    }

    pub fn set_con_res_pending(&mut self, id: [u8; 6]) {
        self.ces.set_con_res_pending(id);
    }

    pub fn con_res_pending(&self) -> bool {
        self.ces.con_res_pending()
    }

    /// Enqueue a MAC CE (TA command, DRX command, ...). Returns false when
    /// the queue is at capacity; the caller retries next cycle.
    pub fn enqueue_ce(&mut self, ce: MacCe) -> bool {
        self.ces.enqueue(ce)
    }

    /// Overwrite the last known buffer occupancy for one channel
    pub fn handle_dl_buffer_status(&mut self, lcid: LcId, bytes: u32) {
        match self.channels[lcid.as_usize()].as_mut() {
            Some(ch) if ch.active => {
                tracing::trace!("handle_dl_buffer_status: {} {} -> {} bytes", lcid, ch.buf_bytes, bytes);
                ch.buf_bytes = bytes;
            }
            _ => {
                tracing::warn!("handle_dl_buffer_status: {} not configured, ignoring {} bytes", lcid, bytes);
            }
        }
    }

    /// Raw buffer occupancy of one channel, fallback-agnostic
    pub fn buffer_status(&self, lcid: LcId) -> u32 {
        self.channels[lcid.as_usize()]
            .as_ref()
            .filter(|ch| ch.active)
            .map_or(0, |ch| ch.buf_bytes)
    }

    /// Schedulable pending bytes (subheaders included), honoring fallback
    /// eligibility, CE queue included
    pub fn pending_bytes(&self) -> u32 {
        let ce_bytes = if self.fallback {
            // Only ConRes is eligible in fallback
            if self.ces.con_res_pending() {
                MacCe::ConResId([0; 6]).required_bytes()
            } else {
                0
            }
        } else {
            self.ces.pending_bytes()
        };
        ce_bytes
            + self
                .prio_order
                .iter()
                .filter(|lcid| self.is_eligible(**lcid))
                .map(|lcid| self.pending_channel_bytes(*lcid))
                .sum::<u32>()
    }

    /// Pending bytes regardless of fallback eligibility. Fallback affects
    /// scheduling eligibility, not raw bookkeeping.
    pub fn total_pending_bytes(&self) -> u32 {
        self.ces.pending_bytes()
            + self
                .prio_order
                .iter()
                .map(|lcid| self.pending_channel_bytes(*lcid))
                .sum::<u32>()
    }

    fn pending_channel_bytes(&self, lcid: LcId) -> u32 {
        let buf = self.buffer_status(lcid);
        if buf == 0 { 0 } else { mac_sdu_required_bytes(buf) }
    }

    pub fn has_pending_bytes(&self) -> bool {
        self.pending_bytes() > 0
    }

    pub fn has_pending_ces(&self) -> bool {
        !self.ces.is_empty()
    }

    /// True when SRB data or a CE is pending. Such transport blocks are
    /// exempt from the slice policy's DRB PRB cap.
    pub fn has_srb_or_ce_pending(&self) -> bool {
        self.has_pending_ces()
            || self
                .prio_order
                .iter()
                .any(|lcid| lcid.is_srb() && self.buffer_status(*lcid) > 0)
    }

    /// Allocate a MAC SDU from the highest-priority eligible channel with
    /// pending data (or from `lcid` if given), consuming at most `rem_bytes`
    /// of the TB budget. Returns None if nothing fits; the caller interprets
    /// that as "stop filling the TB".
    pub fn allocate_mac_sdu(&mut self, rem_bytes: u32, lcid: Option<LcId>) -> Option<SduAlloc> {
        let lcid = match lcid {
            Some(lcid) => {
                if !self.is_eligible(lcid) || self.buffer_status(lcid) == 0 {
                    return None;
                }
                lcid
            }
            None => *self
                .prio_order
                .iter()
                .find(|l| self.is_eligible(**l) && self.buffer_status(**l) > 0)?,
        };

        let max_payload = mac_sdu_max_payload(rem_bytes);
        if max_payload == 0 {
            return None;
        }

        let ch = self.channels[lcid.as_usize()].as_mut().unwrap();
        let payload = ch.buf_bytes.min(max_payload);
        ch.buf_bytes -= payload;
        if ch.buf_bytes > 0 {
            // Channel not drained: the next PDU will carry an RLC segment
            // header the upper layer's report did not account for
            ch.buf_bytes += RLC_SEGMENT_OVERHEAD;
        }

        let alloc = SduAlloc {
            lcid,
            payload_bytes: payload,
            total_bytes: mac_sdu_required_bytes(payload),
        };
        tracing::trace!(
            "allocate_mac_sdu: {} payload {} total {} left {}",
            lcid,
            alloc.payload_bytes,
            alloc.total_bytes,
            ch.buf_bytes
        );
        Some(alloc)
    }

    /// Allocate the ConRes CE if pending and it fits. Must be attempted
    /// before any other CE.
    pub fn allocate_con_res_ce(&mut self, rem_bytes: u32) -> Option<MacCe> {
        self.ces.take_con_res(rem_bytes)
    }

    /// Allocate the next queued CE if it fits. Yields nothing while a ConRes
    /// CE is still pending, and nothing in fallback mode.
    pub fn allocate_mac_ce(&mut self, rem_bytes: u32) -> Option<MacCe> {
        if self.fallback {
            return None;
        }
        self.ces.take_next(rem_bytes)
    }
}
