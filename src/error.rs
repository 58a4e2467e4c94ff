//! Error types for the auto-prune search (Andon principle).
//!
//! Every variant names the offending value and, where there is one, the
//! remedy. A corrupted search state cannot be continued safely, so nothing
//! here is swallowed: hooks propagate these straight to the training loop.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for auto-prune operations.
pub type Result<T> = std::result::Result<T, AutoPruneError>;

/// Errors raised by the auto-prune strategy and its collaborators.
#[derive(Error, Debug)]
pub enum AutoPruneError {
    /// The parameter selector matched nothing in the evaluation graph.
    #[error("No parameters match selector '{pattern}' ({available} parameters in graph)\n  → Check the pruned_params pattern against the graph's parameter names")]
    SelectorMismatch { pattern: String, available: usize },

    /// The selector is not a valid regular expression.
    #[error("Invalid parameter selector '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// The uniform-ratio bisection ran out of iterations.
    #[error("No uniform ratio reaches FLOPs reduction {target:.4} ± {tolerance} within {iterations} iterations (closest: {closest:.4})\n  → Widen [min_ratio, max_ratio] or raise max_init_iterations")]
    ConstraintUnsatisfiable {
        target: f64,
        tolerance: f64,
        iterations: usize,
        closest: f64,
    },

    /// A parameter mutated by a trial has no backup entry.
    #[error("Trial backup has no entry for mutated parameter '{param}'\n  → The pruner must record every parameter it touches before mutating it")]
    LedgerInconsistency { param: String },

    /// Lifecycle or controller calls arrived out of order.
    #[error("Ordering violation: {0}")]
    OrderingViolation(String),

    /// A hook ran before `on_compression_begin` resolved the search space.
    #[error("Strategy not initialized: call on_compression_begin first")]
    NotInitialized,

    /// Configuration value is out of range.
    #[error("Invalid configuration value for '{field}': {message}")]
    InvalidConfig { field: String, message: String },

    /// A parameter id is unknown to the graph or scope.
    #[error("Unknown parameter '{0}'")]
    UnknownParameter(String),

    /// Two vectors that must be index-aligned have different lengths.
    #[error("Length mismatch: {what} has {actual} entries, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The reward metric is absent from the evaluation results.
    #[error("Metric '{0}' not found in evaluation results\n  → metric_name must be one of the evaluator's output keys")]
    MissingMetric(String),

    /// Graph-level failure (shape update, compilation).
    #[error("Graph error: {0}")]
    Graph(String),

    /// IO error with context.
    #[error("IO error reading {path}\n  Cause: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("Invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl AutoPruneError {
    /// Shorthand for an ordering violation.
    pub fn ordering(message: impl Into<String>) -> Self {
        Self::OrderingViolation(message.into())
    }

    /// Shorthand for a config range error.
    pub fn config(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidConfig { field: field.to_string(), message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_mismatch_is_actionable() {
        let err = AutoPruneError::SelectorMismatch {
            pattern: "conv.*_weights".to_string(),
            available: 12,
        };
        let msg = err.to_string();
        assert!(msg.contains("conv.*_weights"));
        assert!(msg.contains("12 parameters"));
        assert!(msg.contains('→'));
    }

    #[test]
    fn test_constraint_unsatisfiable_display() {
        let err = AutoPruneError::ConstraintUnsatisfiable {
            target: 0.6,
            tolerance: 0.01,
            iterations: 64,
            closest: 0.42,
        };
        let msg = err.to_string();
        assert!(msg.contains("0.6000"));
        assert!(msg.contains("64 iterations"));
        assert!(msg.contains("0.4200"));
    }

    #[test]
    fn test_ledger_and_ordering_display() {
        let err = AutoPruneError::LedgerInconsistency { param: "conv2_weights".into() };
        assert!(err.to_string().contains("conv2_weights"));

        let err = AutoPruneError::ordering("update without next_tokens");
        assert!(err.to_string().contains("update without next_tokens"));
    }

    #[test]
    fn test_config_shorthand() {
        let err = AutoPruneError::config("min_ratio", "must be <= max_ratio");
        match err {
            AutoPruneError::InvalidConfig { field, message } => {
                assert_eq!(field, "min_ratio");
                assert!(message.contains("max_ratio"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_yaml_error_converts() {
        let parse: std::result::Result<u32, _> = serde_yaml::from_str("[not, a, number]");
        let err: AutoPruneError = parse.unwrap_err().into();
        assert!(err.to_string().contains("Invalid YAML"));
    }
}
