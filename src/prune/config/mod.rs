//! Auto-prune configuration module
//!
//! Provides the search window, FLOPs band, reward metric and parameter
//! selector for the automatic pruning strategy.

mod auto_prune_config;


pub use auto_prune_config::AutoPruneConfig;
