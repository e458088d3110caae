use nr_core::{MAX_NOF_UES, UeIndex};

use super::ue_context::UeContext;

/// The per-cell collection of live UE contexts, indexed by UE index.
///
/// Owned by the cell's scheduling context; all mutation happens on that
/// context, either during slot processing or from drained feedback events.
pub struct UeRepository {
    ues: Vec<Option<UeContext>>,
    nof_ues: usize,
    max_ues: usize,
}

impl UeRepository {
    pub fn new(max_ues: usize) -> Self {
        assert!(max_ues <= MAX_NOF_UES);
        Self {
            ues: (0..MAX_NOF_UES).map(|_| None).collect(),
            nof_ues: 0,
            max_ues,
        }
    }

    pub fn len(&self) -> usize {
        self.nof_ues
    }

    pub fn is_empty(&self) -> bool {
        self.nof_ues == 0
    }

    pub fn contains(&self, ue_index: UeIndex) -> bool {
        self.ues[ue_index.as_usize()].is_some()
    }

    /// Admit a UE context. Fails when the index is occupied or the cell's UE
    /// limit is reached; the caller rolls back the configuration claim.
    pub fn add_ue(&mut self, ue: UeContext) -> Result<(), String> {
        let idx = ue.ue_index().as_usize();
        if self.ues[idx].is_some() {
            return Err(format!("{} already has a live context", ue.ue_index()));
        }
        if self.nof_ues >= self.max_ues {
            return Err(format!("cell UE limit {} reached", self.max_ues));
        }
        tracing::info!("{} {} admitted", ue.ue_index(), ue.crnti());
        self.ues[idx] = Some(ue);
        self.nof_ues += 1;
        Ok(())
    }

    /// Remove and return a UE context, if live
    pub fn remove_ue(&mut self, ue_index: UeIndex) -> Option<UeContext> {
        let ue = self.ues[ue_index.as_usize()].take()?;
        self.nof_ues -= 1;
        tracing::info!("{} removed", ue_index);
        Some(ue)
    }

    pub fn get(&self, ue_index: UeIndex) -> Option<&UeContext> {
        self.ues[ue_index.as_usize()].as_ref()
    }

    pub fn get_mut(&mut self, ue_index: UeIndex) -> Option<&mut UeContext> {
        self.ues[ue_index.as_usize()].as_mut()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut UeContext> {
        self.ues.iter_mut().flatten()
    }

    pub fn ue_indexes(&self) -> Vec<UeIndex> {
        self.ues.iter().flatten().map(|ue| ue.ue_index()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use nr_config::{CellConfig, LcConfig, UeConfig};
    use nr_core::{CellIndex, LcId, Rnti, TagId};

    fn make_ue(index: u16) -> UeContext {
        let cfg = Arc::new(UeConfig {
            ue_index: UeIndex::new(index),
            crnti: Rnti(0x4600 + index),
            pcell: CellIndex(0),
            scells: vec![],
            lc_list: vec![LcConfig::srb(LcId::SRB1)],
            tag: TagId::new(0),
            drx: None,
            version: 0,
        });
        UeContext::new(cfg, &CellConfig::default(), false, None)
    }

    #[test]
    fn test_add_remove() {
        let mut repo = UeRepository::new(8);
        repo.add_ue(make_ue(3)).unwrap();
        assert!(repo.contains(UeIndex::new(3)));
        assert_eq!(repo.len(), 1);

        let ue = repo.remove_ue(UeIndex::new(3)).unwrap();
        assert_eq!(ue.ue_index(), UeIndex::new(3));
        assert!(repo.is_empty());
        assert!(repo.remove_ue(UeIndex::new(3)).is_none());
    }

    #[test]
    fn test_duplicate_index_rejected() {
        let mut repo = UeRepository::new(8);
        repo.add_ue(make_ue(3)).unwrap();
        assert!(repo.add_ue(make_ue(3)).is_err());
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn test_ue_limit_enforced() {
        let mut repo = UeRepository::new(2);
        repo.add_ue(make_ue(0)).unwrap();
        repo.add_ue(make_ue(1)).unwrap();
        assert!(repo.add_ue(make_ue(2)).is_err());
    }
}
