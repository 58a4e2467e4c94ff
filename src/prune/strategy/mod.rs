//! Epoch-driven pruning strategy
//!
//! This module provides `AutoPruneStrategy`, which plugs into a training
//! loop through the `CompressionStrategy` hooks and searches per-parameter
//! pruning ratios one reversible trial at a time.
//!
//! # Lifecycle
//!
//! `on_compression_begin` (selector, uniform seed, controller reset) →
//! per epoch `on_epoch_begin` (trial open) → training → evaluation →
//! `on_epoch_end` (reward, restore) → ... → commit at `end_epoch`.

mod auto_prune;
mod schedule;
mod traits;


pub use auto_prune::AutoPruneStrategy;
pub use schedule::EpochSchedule;
pub use traits::{CompressionStrategy, EpochOutcome, SearchPhase, SkipReason};
