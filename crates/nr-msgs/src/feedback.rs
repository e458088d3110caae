use nr_core::{CellIndex, HarqId, LcId, LcgId, Rnti, SlotPoint, TagId, UeIndex};

use crate::ce::MacCe;

/// Uplink Buffer Status Report, per-LCG byte counts.
/// Byte values are already translated from the 3GPP buffer-size index tables
/// by the MAC codec layer; the scheduler never sees raw indices.
#[derive(Debug, Clone)]
pub struct BsrIndication {
    pub ue_index: UeIndex,
    pub crnti: Rnti,
    pub cell_index: CellIndex,
    pub format: BsrFormat,
    pub reports: Vec<BsrReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BsrFormat {
    Short,
    ShortTrunc,
    Long,
    LongTrunc,
}

#[derive(Debug, Clone, Copy)]
pub struct BsrReport {
    pub lcg: LcgId,
    pub bytes: u32,
}

/// Per-PUSCH CRC outcome with optional channel measurements
#[derive(Debug, Clone)]
pub struct CrcIndication {
    pub cell_index: CellIndex,
    pub slot: SlotPoint,
    pub crcs: Vec<CrcPdu>,
}

#[derive(Debug, Clone, Copy)]
pub struct CrcPdu {
    pub ue_index: UeIndex,
    pub rnti: Rnti,
    pub harq_id: HarqId,
    pub tb_crc_success: bool,
    pub ul_sinr_db: Option<f32>,
    /// Measured N_TA difference in TA units, if estimated for this PUSCH
    pub time_advance_offset: Option<i32>,
}

/// HARQ-ACK feedback state for one process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarqAck {
    Ack,
    Nack,
    /// UE did not transmit the PUCCH at all
    Dtx,
}

/// UCI multiplexed on PUCCH or PUSCH: HARQ-ACK bits, SR detection, CSI
#[derive(Debug, Clone)]
pub struct UciIndication {
    pub cell_index: CellIndex,
    pub slot: SlotPoint,
    pub ucis: Vec<UciPdu>,
}

#[derive(Debug, Clone)]
pub struct UciPdu {
    pub ue_index: UeIndex,
    pub crnti: Rnti,
    pub harqs: Vec<(HarqId, HarqAck)>,
    pub sr_detected: bool,
    pub csi: Option<CsiReport>,
}

#[derive(Debug, Clone, Copy)]
pub struct CsiReport {
    pub cqi: u8,
    pub rank: u8,
}

/// Power headroom report
#[derive(Debug, Clone, Copy)]
pub struct PhrIndication {
    pub ue_index: UeIndex,
    pub crnti: Rnti,
    pub cell_index: CellIndex,
    pub ph_db: i16,
}

/// Sounding reference signal measurement outcome
#[derive(Debug, Clone, Copy)]
pub struct SrsIndication {
    pub ue_index: UeIndex,
    pub cell_index: CellIndex,
    /// N_TA difference derived from SRS, in TA units
    pub time_advance_offset: Option<i32>,
    pub ul_sinr_db: Option<f32>,
}

/// RLC-level DL buffer occupancy for one logical channel
#[derive(Debug, Clone, Copy)]
pub struct DlBufferStateIndication {
    pub ue_index: UeIndex,
    pub lcid: LcId,
    pub bytes: u32,
}

/// Request from upper MAC to enqueue a Control Element towards a UE
#[derive(Debug, Clone, Copy)]
pub struct DlMacCeIndication {
    pub ue_index: UeIndex,
    pub ce: MacCe,
}

/// N_TA difference measurement forwarded to the timing-advance manager
#[derive(Debug, Clone, Copy)]
pub struct UlNtaUpdateIndication {
    pub ue_index: UeIndex,
    pub cell_index: CellIndex,
    pub tag: TagId,
    /// Measured N_TA difference in TA units (signed)
    pub n_ta_diff: i32,
    pub ul_sinr_db: f32,
}
