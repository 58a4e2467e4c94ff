//! FLOPs-band admissibility oracle.
//!
//! Every measurement prunes shapes only, reads FLOPs, then restores the
//! graph from a backup captured for that call alone. The graph is restored
//! on every path, including a failed prune.

use crate::error::Result;
use crate::graph::ModelGraph;
use crate::prune::codec::{tokens_to_ratios, Token};
use crate::prune::ledger::TrialBackup;
use crate::prune::pruner::Pruner;
use crate::search::ConstraintPredicate;

/// FLOPs and parameter counts before and after a graph-only prune.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub flops_before: u64,
    pub flops_after: u64,
    pub params_before: u64,
    pub params_after: u64,
}

impl Measurement {
    /// `1 - after / before`; 0.0 for an empty graph.
    pub fn flops_reduction(&self) -> f64 {
        reduction(self.flops_before, self.flops_after)
    }

    pub fn params_reduction(&self) -> f64 {
        reduction(self.params_before, self.params_after)
    }
}

fn reduction(before: u64, after: u64) -> f64 {
    if before == 0 {
        0.0
    } else {
        1.0 - after as f64 / before as f64
    }
}

/// Prune `graph` shapes by `ratios`, measure, and put the shapes back.
pub fn measure_pruned<G, P>(
    graph: &mut G,
    pruner: &P,
    params: &[String],
    ratios: &[f64],
) -> Result<Measurement>
where
    G: ModelGraph,
    P: Pruner,
{
    let flops_before = graph.flops();
    let params_before = graph.numel_params();

    let mut backup = TrialBackup::new();
    let pruned = pruner.prune_shapes(graph, params, ratios, Some(&mut backup));
    graph.resync_structure();
    let after = pruned.as_ref().ok().map(|_| (graph.flops(), graph.numel_params()));

    let mutated = pruned.as_ref().map(|r| r.mutated.as_slice()).unwrap_or(&[]);
    let restored = backup.restore_shapes(graph, mutated);
    graph.resync_structure();

    pruned?;
    restored?;

    let (flops_after, params_after) = after.unwrap_or((flops_before, params_before));
    Ok(Measurement { flops_before, flops_after, params_before, params_after })
}

/// Decides whether a token vector's FLOPs reduction lies in `[min_ratio, max_ratio]`.
#[derive(Debug, Clone)]
pub struct ConstraintEvaluator<P> {
    params: Vec<String>,
    min_ratio: f64,
    max_ratio: f64,
    pruner: P,
}

impl<P: Pruner> ConstraintEvaluator<P> {
    pub fn new(params: Vec<String>, min_ratio: f64, max_ratio: f64, pruner: P) -> Self {
        Self { params, min_ratio, max_ratio, pruner }
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// FLOPs reduction `tokens` would achieve on `graph`.
    pub fn flops_reduction<G: ModelGraph>(&self, graph: &mut G, tokens: &[Token]) -> Result<f64> {
        let ratios = tokens_to_ratios(tokens);
        Ok(measure_pruned(graph, &self.pruner, &self.params, &ratios)?.flops_reduction())
    }

    /// Whether `tokens` land inside the band. `graph` is unchanged afterwards.
    pub fn check<G: ModelGraph>(&self, graph: &mut G, tokens: &[Token]) -> Result<bool> {
        if graph.flops() == 0 {
            return Ok(false);
        }
        let reduction = self.flops_reduction(graph, tokens)?;
        Ok(reduction >= self.min_ratio && reduction <= self.max_ratio)
    }

    /// Bind to a graph snapshot, producing a predicate the controller can own.
    pub fn bind<G: ModelGraph>(self, graph: G) -> BoundConstraint<G, P> {
        BoundConstraint { evaluator: self, graph }
    }
}

/// [`ConstraintEvaluator`] pre-bound to its own copy of the evaluation graph.
///
/// The live evaluation graph is always at its baseline whenever the
/// controller runs, so measuring against a snapshot taken at reset gives the
/// same answers without lending the live graph out.
#[derive(Debug, Clone)]
pub struct BoundConstraint<G, P> {
    evaluator: ConstraintEvaluator<P>,
    graph: G,
}

impl<G: ModelGraph, P: Pruner> BoundConstraint<G, P> {
    pub fn graph(&self) -> &G {
        &self.graph
    }
}

impl<G: ModelGraph, P: Pruner> ConstraintPredicate for BoundConstraint<G, P> {
    fn is_admissible(&mut self, tokens: &[Token]) -> bool {
        match self.evaluator.check(&mut self.graph, tokens) {
            Ok(admissible) => admissible,
            Err(err) => {
                tracing::warn!(?tokens, error = %err, "constraint check failed, treating as inadmissible");
                false
            }
        }
    }
}
