//! Structured filter pruning.
//!
//! A [`Pruner`] removes a fraction of output channels from each selected
//! parameter and the matching input channels from every consumer of those
//! channels. It runs in two modes:
//!
//! - `prune_shapes`: metadata only, for cheap FLOPs measurement
//! - `prune_tensors`: shapes and tensor data, for trials and the final commit
//!
//! Both capture every parameter they touch into the optional
//! [`TrialBackup`] before mutating it.

use ndarray::{Array1, Axis};

use crate::error::{AutoPruneError, Result};
use crate::graph::{ModelGraph, ParamScope, Placement};
use crate::prune::ledger::TrialBackup;

/// Parameters a prune call mutated, in mutation order, without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub mutated: Vec<String>,
}

impl PruneReport {
    fn touch(&mut self, param: &str) {
        if !self.mutated.iter().any(|p| p == param) {
            self.mutated.push(param.to_string());
        }
    }
}

/// Pruning transform contract.
pub trait Pruner {
    /// Shrink shapes on `graph` only; tensor data is not read or written.
    fn prune_shapes<G: ModelGraph>(
        &self,
        graph: &mut G,
        params: &[String],
        ratios: &[f64],
        backup: Option<&mut TrialBackup>,
    ) -> Result<PruneReport>;

    /// Shrink shapes on `graph` and truncate the live tensors in `scope`.
    fn prune_tensors<G: ModelGraph, S: ParamScope>(
        &self,
        graph: &mut G,
        scope: &mut S,
        params: &[String],
        ratios: &[f64],
        place: &Placement,
        backup: Option<&mut TrialBackup>,
    ) -> Result<PruneReport>;
}

/// Number of output channels removed for `ratio`, always leaving at least one.
pub fn pruned_channels(channels: usize, ratio: f64) -> usize {
    let ratio = ratio.clamp(0.0, 1.0);
    let pruned = (channels as f64 * ratio).round() as usize;
    pruned.min(channels.saturating_sub(1))
}

/// L1-norm filter pruner.
///
/// Drops the output filters with the smallest L1 norm along axis 0, keeping
/// the survivors in their original order, and drops the same indices along
/// axis 1 of every channel consumer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelPruner;

impl ChannelPruner {
    pub fn new() -> Self {
        Self
    }

    fn check_aligned(params: &[String], ratios: &[f64]) -> Result<()> {
        if params.len() != ratios.len() {
            return Err(AutoPruneError::LengthMismatch {
                what: "ratios",
                expected: params.len(),
                actual: ratios.len(),
            });
        }
        Ok(())
    }

    fn current_shape<G: ModelGraph>(graph: &G, param: &str) -> Result<Vec<usize>> {
        graph
            .shape(param)
            .map(<[usize]>::to_vec)
            .ok_or_else(|| AutoPruneError::UnknownParameter(param.to_string()))
    }

    /// Indices of the filters to keep, ascending.
    fn kept_filters<S: ParamScope>(
        scope: &S,
        param: &str,
        channels: usize,
        keep: usize,
    ) -> Result<Vec<usize>> {
        let tensor =
            scope.tensor(param).ok_or_else(|| AutoPruneError::UnknownParameter(param.to_string()))?;
        if tensor.ndim() == 0 || tensor.len_of(Axis(0)) != channels {
            return Err(AutoPruneError::Graph(format!(
                "tensor '{param}' has shape {:?} but the graph expects {channels} filters",
                tensor.shape()
            )));
        }
        let norms = tensor
            .map(|v| v.abs())
            .lanes(Axis(0))
            .into_iter()
            .fold(None::<Array1<f32>>, |acc, lane| match acc {
                Some(sum) => Some(sum + &lane),
                None => Some(lane.to_owned()),
            })
            .unwrap_or_else(|| Array1::zeros(tensor.len_of(Axis(0))));

        let mut order: Vec<usize> = (0..norms.len()).collect();
        // Largest norm first; stable so ties keep the lower index.
        order.sort_by(|&a, &b| norms[b].total_cmp(&norms[a]));
        let mut kept: Vec<usize> = order.into_iter().take(keep).collect();
        kept.sort_unstable();
        Ok(kept)
    }

    /// A consumer needs a graph shape and a tensor whose axis 1 matches `channels`.
    fn check_consumer<G: ModelGraph, S: ParamScope>(
        graph: &G,
        scope: &S,
        consumer: &str,
        channels: usize,
    ) -> Result<()> {
        Self::current_shape(graph, consumer)?;
        let tensor = scope
            .tensor(consumer)
            .ok_or_else(|| AutoPruneError::UnknownParameter(consumer.to_string()))?;
        if tensor.ndim() < 2 || tensor.len_of(Axis(1)) != channels {
            return Err(AutoPruneError::Graph(format!(
                "consumer '{consumer}' has shape {:?} but should take {channels} input channels",
                tensor.shape()
            )));
        }
        Ok(())
    }

    fn select_axis<S: ParamScope>(
        scope: &mut S,
        param: &str,
        axis: usize,
        indices: &[usize],
        place: &Placement,
    ) -> Result<()> {
        let tensor =
            scope.tensor(param).ok_or_else(|| AutoPruneError::UnknownParameter(param.to_string()))?;
        if tensor.ndim() <= axis {
            return Err(AutoPruneError::Graph(format!(
                "tensor '{param}' has no axis {axis} (shape {:?})",
                tensor.shape()
            )));
        }
        let selected = tensor.select(Axis(axis), indices);
        scope.set_tensor(param, selected, place)
    }
}

impl Pruner for ChannelPruner {
    fn prune_shapes<G: ModelGraph>(
        &self,
        graph: &mut G,
        params: &[String],
        ratios: &[f64],
        mut backup: Option<&mut TrialBackup>,
    ) -> Result<PruneReport> {
        Self::check_aligned(params, ratios)?;
        let mut report = PruneReport::default();

        for (param, &ratio) in params.iter().zip(ratios) {
            let mut shape = Self::current_shape(graph, param)?;
            let keep = shape[0] - pruned_channels(shape[0], ratio);

            if let Some(b) = backup.as_deref_mut() {
                b.record(param, &shape, None);
            }
            shape[0] = keep;
            graph.set_shape(param, shape)?;
            report.touch(param);

            for consumer in graph.channel_consumers(param) {
                let mut shape = Self::current_shape(graph, &consumer)?;
                if let Some(b) = backup.as_deref_mut() {
                    b.record(&consumer, &shape, None);
                }
                shape[1] = keep;
                graph.set_shape(&consumer, shape)?;
                report.touch(&consumer);
            }
        }
        Ok(report)
    }

    fn prune_tensors<G: ModelGraph, S: ParamScope>(
        &self,
        graph: &mut G,
        scope: &mut S,
        params: &[String],
        ratios: &[f64],
        place: &Placement,
        mut backup: Option<&mut TrialBackup>,
    ) -> Result<PruneReport> {
        Self::check_aligned(params, ratios)?;
        let mut report = PruneReport::default();

        for (param, &ratio) in params.iter().zip(ratios) {
            let mut shape = Self::current_shape(graph, param)?;
            let keep = shape[0] - pruned_channels(shape[0], ratio);
            let kept = Self::kept_filters(scope, param, shape[0], keep)?;
            let consumers = graph.channel_consumers(param);
            // Nothing is captured or mutated for this parameter unless every
            // consumer can follow it.
            for consumer in &consumers {
                Self::check_consumer(graph, scope, consumer, shape[0])?;
            }

            if let Some(b) = backup.as_deref_mut() {
                b.record(param, &shape, scope.tensor(param));
            }
            Self::select_axis(scope, param, 0, &kept, place)?;
            shape[0] = keep;
            graph.set_shape(param, shape)?;
            report.touch(param);

            for consumer in consumers {
                let mut shape = Self::current_shape(graph, &consumer)?;
                if let Some(b) = backup.as_deref_mut() {
                    b.record(&consumer, &shape, scope.tensor(&consumer));
                }
                Self::select_axis(scope, &consumer, 1, &kept, place)?;
                shape[1] = keep;
                graph.set_shape(&consumer, shape)?;
                report.touch(&consumer);
            }
        }
        Ok(report)
    }
}
