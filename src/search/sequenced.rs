//! Ordering guard around a [`SearchController`].

use crate::error::{AutoPruneError, Result};
use crate::prune::Token;
use crate::search::{ConstraintPredicate, SearchController};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    Unreset,
    Ready,
    Proposed(Vec<Token>),
}

/// Enforces `reset` once, then strictly alternating `next_tokens`/`update`.
///
/// Out-of-order calls are undefined for most controllers, so they are
/// rejected here with `OrderingViolation` before reaching the inner
/// controller.
#[derive(Debug)]
pub struct SequencedController<C> {
    inner: C,
    phase: Phase,
    scored: usize,
}

impl<C: SearchController> SequencedController<C> {
    pub fn new(inner: C) -> Self {
        Self { inner, phase: Phase::Unreset, scored: 0 }
    }

    pub fn reset(
        &mut self,
        range_table: Vec<Token>,
        initial_tokens: Vec<Token>,
        constraint: Box<dyn ConstraintPredicate>,
    ) -> Result<()> {
        if self.phase != Phase::Unreset {
            return Err(AutoPruneError::ordering("controller reset more than once"));
        }
        self.inner.reset(range_table, initial_tokens, constraint);
        self.phase = Phase::Ready;
        Ok(())
    }

    pub fn next_tokens(&mut self) -> Result<Vec<Token>> {
        match self.phase {
            Phase::Ready => {}
            Phase::Unreset => return Err(AutoPruneError::ordering("next_tokens before reset")),
            Phase::Proposed(_) => {
                return Err(AutoPruneError::ordering(
                    "next_tokens while the previous proposal is still unscored",
                ));
            }
        }
        let tokens = self.inner.next_tokens();
        self.phase = Phase::Proposed(tokens.clone());
        Ok(tokens)
    }

    /// Score the outstanding proposal. `tokens` must be exactly what was proposed.
    pub fn update(&mut self, tokens: &[Token], reward: f64) -> Result<()> {
        match &self.phase {
            Phase::Proposed(proposed) if proposed.as_slice() != tokens => {
                return Err(AutoPruneError::ordering(format!(
                    "update for {tokens:?} but the outstanding proposal is {proposed:?}"
                )));
            }
            Phase::Proposed(_) => {}
            Phase::Ready | Phase::Unreset => {
                return Err(AutoPruneError::ordering("update without an outstanding proposal"));
            }
        }
        self.inner.update(tokens, reward);
        self.phase = Phase::Ready;
        self.scored += 1;
        Ok(())
    }

    /// Drop an outstanding proposal that will never be scored.
    pub fn abandon(&mut self) -> Option<Vec<Token>> {
        match std::mem::replace(&mut self.phase, Phase::Ready) {
            Phase::Proposed(tokens) => Some(tokens),
            other => {
                self.phase = other;
                None
            }
        }
    }

    pub fn best_tokens(&self) -> Option<&[Token]> {
        self.inner.best_tokens()
    }

    pub fn is_reset(&self) -> bool {
        self.phase != Phase::Unreset
    }

    pub fn has_outstanding_proposal(&self) -> bool {
        matches!(self.phase, Phase::Proposed(_))
    }

    /// Number of proposals scored through `update`.
    pub fn scored(&self) -> usize {
        self.scored
    }

    pub fn name(&self) -> &'static str {
        self.inner.name()
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}
