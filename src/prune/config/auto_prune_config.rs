//! Auto-prune search configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AutoPruneError, Result};

/// Configuration for the automatic pruning search.
///
/// Defaults search epochs 0 through 10 for a FLOPs reduction between 50%
/// and 70%, scoring trials by `top1_acc` and pruning every parameter whose
/// name matches `conv.*_weights`.
///
/// # Example
///
/// ```
/// use entrenar_autoprune::prune::AutoPruneConfig;
///
/// let config = AutoPruneConfig::default()
///     .with_epochs(0, 20)
///     .with_flops_band(0.4, 0.6)
///     .with_metric("acc_top1")
///     .with_pruned_params("res.*_conv_weights");
/// assert!(config.validate().is_ok());
/// assert!((config.target_flops_reduction() - 0.5).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoPruneConfig {
    /// First epoch the search runs in.
    start_epoch: usize,

    /// Epoch at which the best configuration is committed.
    end_epoch: usize,

    /// Lower bound of the admissible FLOPs reduction.
    min_ratio: f64,

    /// Upper bound of the admissible FLOPs reduction.
    max_ratio: f64,

    /// Evaluation metric used as the trial reward.
    metric_name: String,

    /// Regex selecting the parameters to prune, anchored at the name start.
    pruned_params: String,

    /// Training epochs per search trial.
    retrain_epoch: usize,

    /// Whether `retrain_epoch` takes effect. Off by default: the search has
    /// historically measured rewards without retraining.
    honor_retrain_epoch: bool,

    /// Bisection budget for the uniform-ratio initializer.
    max_init_iterations: usize,

    /// Accepted distance between achieved and target FLOPs reduction.
    init_tolerance: f64,
}

impl Default for AutoPruneConfig {
    fn default() -> Self {
        Self {
            start_epoch: 0,
            end_epoch: 10,
            min_ratio: 0.5,
            max_ratio: 0.7,
            metric_name: "top1_acc".to_string(),
            pruned_params: "conv.*_weights".to_string(),
            retrain_epoch: 0,
            honor_retrain_epoch: false,
            max_init_iterations: 64,
            init_tolerance: 0.01,
        }
    }
}

impl AutoPruneConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from YAML. Missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| AutoPruneError::Io { path: path.to_path_buf(), source })?;
        Self::from_yaml_str(&text)
    }

    /// Set the search window.
    pub fn with_epochs(mut self, start_epoch: usize, end_epoch: usize) -> Self {
        self.start_epoch = start_epoch;
        self.end_epoch = end_epoch;
        self
    }

    /// Set the admissible FLOPs reduction band.
    pub fn with_flops_band(mut self, min_ratio: f64, max_ratio: f64) -> Self {
        self.min_ratio = min_ratio;
        self.max_ratio = max_ratio;
        self
    }

    /// Set the reward metric.
    pub fn with_metric(mut self, metric_name: impl Into<String>) -> Self {
        self.metric_name = metric_name.into();
        self
    }

    /// Set the parameter selector pattern.
    pub fn with_pruned_params(mut self, pattern: impl Into<String>) -> Self {
        self.pruned_params = pattern.into();
        self
    }

    /// Set the number of training epochs per trial.
    pub fn with_retrain_epoch(mut self, retrain_epoch: usize) -> Self {
        self.retrain_epoch = retrain_epoch;
        self
    }

    /// Opt in to retraining between prune and reward measurement.
    pub fn with_honor_retrain_epoch(mut self, honor: bool) -> Self {
        self.honor_retrain_epoch = honor;
        self
    }

    /// Set the bisection iteration budget.
    pub fn with_max_init_iterations(mut self, iterations: usize) -> Self {
        self.max_init_iterations = iterations;
        self
    }

    /// Set the bisection tolerance.
    pub fn with_init_tolerance(mut self, tolerance: f64) -> Self {
        self.init_tolerance = tolerance;
        self
    }

    pub fn start_epoch(&self) -> usize {
        self.start_epoch
    }

    pub fn end_epoch(&self) -> usize {
        self.end_epoch
    }

    pub fn min_ratio(&self) -> f64 {
        self.min_ratio
    }

    pub fn max_ratio(&self) -> f64 {
        self.max_ratio
    }

    pub fn metric_name(&self) -> &str {
        &self.metric_name
    }

    pub fn pruned_params(&self) -> &str {
        &self.pruned_params
    }

    /// Configured retrain interval, whether or not it is honored.
    pub fn retrain_epoch(&self) -> usize {
        self.retrain_epoch
    }

    pub fn honor_retrain_epoch(&self) -> bool {
        self.honor_retrain_epoch
    }

    /// Retrain interval the strategy actually runs with.
    pub fn effective_retrain_epoch(&self) -> usize {
        if self.honor_retrain_epoch {
            self.retrain_epoch
        } else {
            0
        }
    }

    pub fn max_init_iterations(&self) -> usize {
        self.max_init_iterations
    }

    pub fn init_tolerance(&self) -> f64 {
        self.init_tolerance
    }

    /// Midpoint of the admissible band, the initializer's target.
    pub fn target_flops_reduction(&self) -> f64 {
        (self.min_ratio + self.max_ratio) / 2.0
    }

    /// Whether a FLOPs reduction lies inside `[min_ratio, max_ratio]`.
    pub fn admits(&self, reduction: f64) -> bool {
        reduction >= self.min_ratio && reduction <= self.max_ratio
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.start_epoch > self.end_epoch {
            return Err(AutoPruneError::config(
                "start_epoch",
                format!("start_epoch ({}) must not exceed end_epoch ({})", self.start_epoch, self.end_epoch),
            ));
        }

        for (field, value) in [("min_ratio", self.min_ratio), ("max_ratio", self.max_ratio)] {
            if !(0.0..1.0).contains(&value) {
                return Err(AutoPruneError::config(field, format!("{value} must be in [0.0, 1.0)")));
            }
        }

        if self.min_ratio > self.max_ratio {
            return Err(AutoPruneError::config(
                "min_ratio",
                format!("min_ratio ({}) must not exceed max_ratio ({})", self.min_ratio, self.max_ratio),
            ));
        }

        if self.metric_name.is_empty() {
            return Err(AutoPruneError::config("metric_name", "cannot be empty"));
        }

        if self.pruned_params.is_empty() {
            return Err(AutoPruneError::config("pruned_params", "cannot be empty"));
        }

        if self.max_init_iterations == 0 {
            return Err(AutoPruneError::config("max_init_iterations", "must be > 0"));
        }

        if self.init_tolerance.is_nan() || self.init_tolerance <= 0.0 {
            return Err(AutoPruneError::config(
                "init_tolerance",
                format!("{} must be > 0.0", self.init_tolerance),
            ));
        }

        Ok(())
    }
}
