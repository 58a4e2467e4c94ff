//! Uniform-ratio initialization by bisection.
//!
//! Finds one ratio which, applied to every selected parameter, reduces FLOPs
//! to within `tolerance` of the band midpoint. The search seeds the
//! controller, so it has to terminate: after `max_iterations` it gives up
//! with `ConstraintUnsatisfiable` instead of looping on a plateau.

use crate::error::{AutoPruneError, Result};
use crate::graph::ModelGraph;
use crate::prune::config::AutoPruneConfig;
use crate::prune::constraint::measure_pruned;
use crate::prune::pruner::Pruner;

/// Outcome of a successful uniform-ratio search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformRatio {
    /// Ratio applied to every parameter.
    pub ratio: f64,
    /// FLOPs reduction achieved by `ratio`.
    pub flops_reduction: f64,
    /// Parameter-count reduction achieved by `ratio`.
    pub params_reduction: f64,
    /// Bisection steps taken.
    pub iterations: usize,
}

/// Bisection over a single ratio in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformRatioSearch {
    target: f64,
    tolerance: f64,
    max_iterations: usize,
}

impl UniformRatioSearch {
    pub fn new(target: f64, tolerance: f64, max_iterations: usize) -> Self {
        Self { target, tolerance, max_iterations }
    }

    /// Target the band midpoint with the configured tolerance and budget.
    pub fn from_config(config: &AutoPruneConfig) -> Self {
        Self::new(
            config.target_flops_reduction(),
            config.init_tolerance(),
            config.max_init_iterations(),
        )
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    /// Run the bisection. `graph` is restored after every probe.
    pub fn search<G, P>(&self, graph: &mut G, pruner: &P, params: &[String]) -> Result<UniformRatio>
    where
        G: ModelGraph,
        P: Pruner,
    {
        let (mut low, mut high) = (0.0_f64, 1.0_f64);
        let mut closest = f64::NAN;

        for iteration in 1..=self.max_iterations {
            let ratio = (low + high) / 2.0;
            let ratios = vec![ratio; params.len()];
            let measurement = measure_pruned(graph, pruner, params, &ratios)?;
            let flops_reduction = measurement.flops_reduction();

            tracing::debug!(
                iteration,
                ratio,
                flops_reduction,
                params_reduction = measurement.params_reduction(),
                "uniform ratio probe"
            );

            if closest.is_nan() || (flops_reduction - self.target).abs() < (closest - self.target).abs() {
                closest = flops_reduction;
            }

            if (flops_reduction - self.target).abs() < self.tolerance {
                tracing::info!(
                    ratio = (ratio * 100.0).round() / 100.0,
                    flops_reduction,
                    iterations = iteration,
                    "uniform ratio found"
                );
                return Ok(UniformRatio {
                    ratio,
                    flops_reduction,
                    params_reduction: measurement.params_reduction(),
                    iterations: iteration,
                });
            }

            if flops_reduction > self.target {
                high = ratio;
            } else {
                low = ratio;
            }
        }

        Err(AutoPruneError::ConstraintUnsatisfiable {
            target: self.target,
            tolerance: self.tolerance,
            iterations: self.max_iterations,
            closest: if closest.is_nan() { 0.0 } else { closest },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ConvLayer, SequentialConvGraph};
    use crate::prune::pruner::ChannelPruner;

    fn scenario_graph() -> SequentialConvGraph {
        SequentialConvGraph::new(
            3,
            vec![
                ConvLayer::new("conv1_weights", [64, 3, 3, 3], (1, 1)),
                ConvLayer::new("conv2_weights", [128, 64, 3, 3], (1, 1)),
                ConvLayer::new("conv3_weights", [256, 128, 3, 3], (1, 1)),
            ],
        )
        .unwrap()
    }

    fn params() -> Vec<String> {
        vec!["conv1_weights".into(), "conv2_weights".into(), "conv3_weights".into()]
    }

    #[test]
    fn test_converges_to_band_midpoint() {
        let mut graph = scenario_graph();
        let before = graph.shapes();
        let found = UniformRatioSearch::new(0.6, 0.01, 64)
            .search(&mut graph, &ChannelPruner, &params())
            .unwrap();

        assert!((found.flops_reduction - 0.6).abs() < 0.01);
        assert!(found.ratio > 0.3 && found.ratio < 0.45, "ratio {}", found.ratio);
        assert!(found.params_reduction > 0.5);
        assert_eq!(graph.shapes(), before, "probes must not leave shapes pruned");
    }

    #[test]
    fn test_from_config_targets_midpoint() {
        let config = AutoPruneConfig::default().with_flops_band(0.2, 0.4);
        let search = UniformRatioSearch::from_config(&config);
        assert!((search.target() - 0.3).abs() < 1e-12);

        let mut graph = scenario_graph();
        let found = search.search(&mut graph, &ChannelPruner, &params()).unwrap();
        assert!(config.admits(found.flops_reduction));
    }

    #[test]
    fn test_unreachable_target_fails_explicitly() {
        // A single 1x1 layer with 2 filters can only reach 0.0 or 0.5 reduction.
        let mut graph =
            SequentialConvGraph::new(1, vec![ConvLayer::new("conv_weights", [2, 1, 1, 1], (1, 1))])
                .unwrap();
        let err = UniformRatioSearch::new(0.25, 0.01, 20)
            .search(&mut graph, &ChannelPruner, &["conv_weights".to_string()])
            .unwrap_err();
        match err {
            AutoPruneError::ConstraintUnsatisfiable { iterations, closest, .. } => {
                assert_eq!(iterations, 20);
                assert!(closest == 0.0 || closest == 0.5);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(graph.shape("conv_weights").unwrap(), &[2, 1, 1, 1]);
    }

    #[test]
    fn test_pruner_errors_propagate() {
        let mut graph = scenario_graph();
        let err = UniformRatioSearch::new(0.6, 0.01, 8)
            .search(&mut graph, &ChannelPruner, &["nope".to_string()])
            .unwrap_err();
        assert!(matches!(err, AutoPruneError::UnknownParameter(_)));
    }
}
