use nr_config::{DrxConfig, LcConfig};
use nr_core::{CellIndex, Rnti, TagId, UeIndex};

/// Admission request for a new UE, produced by the upper MAC after RRC-level
/// validation of the dedicated configuration.
#[derive(Debug, Clone)]
pub struct UeCreationRequest {
    pub ue_index: UeIndex,
    pub crnti: Rnti,
    pub pcell: CellIndex,
    pub scells: Vec<CellIndex>,
    pub lc_list: Vec<LcConfig>,
    pub tag: TagId,
    pub drx: Option<DrxConfig>,
    /// True for UEs created during random access, before the full RRC
    /// configuration is applied. Such UEs start in fallback mode and carry a
    /// pending Contention Resolution CE.
    pub starts_in_fallback: bool,
    pub con_res_id: Option<[u8; 6]>,
}

/// Delta reconfiguration of a live UE (RRC Reconfiguration/Reestablishment).
/// Fields left as None are preserved from the previous snapshot.
#[derive(Debug, Clone)]
pub struct UeReconfigurationRequest {
    pub ue_index: UeIndex,
    pub new_crnti: Option<Rnti>,
    pub new_lc_list: Option<Vec<LcConfig>>,
    pub new_drx: Option<Option<DrxConfig>>,
}
