//! Core traits and types for compression strategies
//!
//! - `CompressionStrategy` - lifecycle hooks the training loop calls
//! - `EpochOutcome` - what a hook did this epoch
//! - `SkipReason` - why a hook did nothing
//! - `SearchPhase` - coarse state of the search

use crate::error::Result;
use crate::graph::SearchContext;
use crate::prune::codec::Token;

/// Why a hook made no change this epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Epoch is outside `[start_epoch, end_epoch]`.
    OutsideWindow,
    /// Epoch is inside the window but not on the retrain interval.
    OffInterval,
    /// A trial is open and its close epoch has not arrived.
    TrialInProgress,
    /// Nothing to close.
    NoOpenTrial,
    /// The best configuration is already permanent.
    AlreadyCommitted,
}

/// Result of one lifecycle call.
#[derive(Clone, Debug, PartialEq)]
pub enum EpochOutcome {
    /// Guard clause: nothing happened.
    Skipped(SkipReason),
    /// A trial configuration was applied to the optimization graph.
    TrialOpened { tokens: Vec<Token>, skip_training: bool },
    /// A trial was scored and reverted.
    TrialClosed { tokens: Vec<Token>, reward: f64 },
    /// The best configuration was applied permanently.
    Committed { tokens: Vec<Token>, ratios: Vec<f64> },
}

impl EpochOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, EpochOutcome::Skipped(_))
    }
}

/// Coarse search state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchPhase {
    Idle,
    TrialOpen,
    Committed,
}

/// Lifecycle hooks called synchronously by the training loop.
///
/// All methods have default no-op implementations, so a strategy only
/// implements the events it cares about.
pub trait CompressionStrategy<G, S> {
    /// Called once before the first epoch.
    fn on_compression_begin(&mut self, _ctx: &mut SearchContext<G, S>) -> Result<()> {
        Ok(())
    }

    /// Called before each epoch's training step.
    fn on_epoch_begin(&mut self, _ctx: &mut SearchContext<G, S>) -> Result<EpochOutcome> {
        Ok(EpochOutcome::Skipped(SkipReason::OutsideWindow))
    }

    /// Called after each epoch's evaluation.
    fn on_epoch_end(&mut self, _ctx: &mut SearchContext<G, S>) -> Result<EpochOutcome> {
        Ok(EpochOutcome::Skipped(SkipReason::OutsideWindow))
    }

    /// Strategy name for logging.
    fn name(&self) -> &'static str {
        "CompressionStrategy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Placement;

    #[test]
    fn test_default_strategy_impl() {
        struct Noop;
        impl CompressionStrategy<(), ()> for Noop {}

        let mut s = Noop;
        let mut ctx = SearchContext::new((), (), (), Placement::Cpu);
        s.on_compression_begin(&mut ctx).unwrap();
        assert!(s.on_epoch_begin(&mut ctx).unwrap().is_skipped());
        assert!(s.on_epoch_end(&mut ctx).unwrap().is_skipped());
        assert_eq!(CompressionStrategy::<(), ()>::name(&s), "CompressionStrategy");
    }

    #[test]
    fn test_outcome_is_skipped() {
        assert!(EpochOutcome::Skipped(SkipReason::OffInterval).is_skipped());
        assert!(!EpochOutcome::TrialClosed { tokens: vec![1], reward: 0.5 }.is_skipped());
    }
}
