//! State handed to the strategy on every lifecycle call.

use std::collections::HashMap;

use crate::graph::Placement;

/// Everything a compression strategy may read or mutate during a hook.
///
/// The training loop owns this and lends it mutably for the duration of each
/// call; no one else writes the graphs or the scope inside that window.
#[derive(Debug, Clone)]
pub struct SearchContext<G, S> {
    /// Current epoch (0-indexed).
    pub epoch_id: usize,
    /// Graph used for cheap what-if measurement.
    pub eval_graph: G,
    /// Graph that is actually trained.
    pub optimize_graph: G,
    /// Live parameter tensors.
    pub scope: S,
    /// Where tensors are written back.
    pub place: Placement,
    /// Evaluation history keyed by metric name; last entry is the latest.
    pub eval_results: HashMap<String, Vec<f64>>,
    /// Set by the strategy when this epoch's training step should be skipped.
    pub skip_training: bool,
}

impl<G, S> SearchContext<G, S> {
    pub fn new(eval_graph: G, optimize_graph: G, scope: S, place: Placement) -> Self {
        Self {
            epoch_id: 0,
            eval_graph,
            optimize_graph,
            scope,
            place,
            eval_results: HashMap::new(),
            skip_training: false,
        }
    }

    /// Append a metric value to the evaluation history.
    pub fn record_metric(&mut self, name: impl Into<String>, value: f64) {
        self.eval_results.entry(name.into()).or_default().push(value);
    }

    /// Most recent value of a metric.
    pub fn latest_metric(&self, name: &str) -> Option<f64> {
        self.eval_results.get(name).and_then(|values| values.last()).copied()
    }
}
