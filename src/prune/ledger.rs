//! Per-trial backup of parameter shapes and tensors.
//!
//! A [`TrialBackup`] is written by the pruner before it mutates a parameter
//! and drained when the trial is restored. Entries are write-once: the first
//! capture of a parameter within a trial is the pre-trial baseline, later
//! captures are ignored.

use std::collections::BTreeMap;

use ndarray::ArrayD;

use crate::error::{AutoPruneError, Result};
use crate::graph::{ModelGraph, ParamScope, Placement};

/// Saved state of one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct BackupEntry {
    /// Shape before the trial.
    pub shape: Vec<usize>,
    /// Full tensor before the trial; `None` for graph-only captures.
    pub tensor: Option<ArrayD<f32>>,
}

/// Ledger of every parameter a trial has mutated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrialBackup {
    entries: BTreeMap<String, BackupEntry>,
}

impl TrialBackup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture a parameter's baseline. Returns `false` if it was already captured.
    pub fn record(&mut self, param: &str, shape: &[usize], tensor: Option<&ArrayD<f32>>) -> bool {
        if self.entries.contains_key(param) {
            return false;
        }
        self.entries.insert(
            param.to_string(),
            BackupEntry { shape: shape.to_vec(), tensor: tensor.cloned() },
        );
        true
    }

    pub fn contains(&self, param: &str) -> bool {
        self.entries.contains_key(param)
    }

    pub fn get(&self, param: &str) -> Option<&BackupEntry> {
        self.entries.get(param)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Recorded parameter names, sorted.
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Drop every entry without restoring (the trial became permanent).
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Fail with `LedgerInconsistency` unless every mutated parameter was captured.
    pub fn verify_covers(&self, mutated: &[String]) -> Result<()> {
        match mutated.iter().find(|p| !self.entries.contains_key(p.as_str())) {
            Some(missing) => Err(AutoPruneError::LedgerInconsistency { param: missing.clone() }),
            None => Ok(()),
        }
    }

    /// Put every captured shape back on `graph` and empty the ledger.
    ///
    /// Coverage of `mutated` is checked before anything is written, so a bad
    /// ledger leaves the graph untouched.
    pub fn restore_shapes<G: ModelGraph>(&mut self, graph: &mut G, mutated: &[String]) -> Result<()> {
        self.verify_covers(mutated)?;
        for (param, entry) in std::mem::take(&mut self.entries) {
            graph.set_shape(&param, entry.shape)?;
        }
        Ok(())
    }

    /// Put every captured shape and tensor back and empty the ledger.
    ///
    /// Every entry must carry a tensor; a graph-only capture cannot undo a
    /// tensor mutation.
    pub fn restore<G: ModelGraph, S: ParamScope>(
        &mut self,
        graph: &mut G,
        scope: &mut S,
        place: &Placement,
        mutated: &[String],
    ) -> Result<()> {
        self.verify_covers(mutated)?;
        if let Some((param, _)) = self.entries.iter().find(|(_, e)| e.tensor.is_none()) {
            return Err(AutoPruneError::LedgerInconsistency { param: param.clone() });
        }
        for (param, entry) in std::mem::take(&mut self.entries) {
            if let Some(tensor) = entry.tensor {
                scope.set_tensor(&param, tensor, place)?;
            }
            graph.set_shape(&param, entry.shape)?;
        }
        Ok(())
    }
}
