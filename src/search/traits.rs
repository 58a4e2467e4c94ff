//! Trait definitions for search controllers.
//!
//! A controller proposes token vectors and learns from rewards. The
//! strategy drives it in a strict sequence: `reset` once, then alternating
//! `next_tokens` / `update`, one pair per trial.

use crate::prune::Token;

/// Admissibility oracle bound at reset time.
pub trait ConstraintPredicate {
    /// Whether `tokens` satisfy the search constraint.
    fn is_admissible(&mut self, tokens: &[Token]) -> bool;
}

impl<F> ConstraintPredicate for F
where
    F: FnMut(&[Token]) -> bool,
{
    fn is_admissible(&mut self, tokens: &[Token]) -> bool {
        self(tokens)
    }
}

/// Contract for pluggable search algorithms.
pub trait SearchController {
    /// Seed the search. `range_table[i]` bounds the tokens proposed at index `i`.
    fn reset(
        &mut self,
        range_table: Vec<Token>,
        initial_tokens: Vec<Token>,
        constraint: Box<dyn ConstraintPredicate>,
    );

    /// Propose the tokens for the next trial.
    fn next_tokens(&mut self) -> Vec<Token>;

    /// Report the reward earned by `tokens`.
    fn update(&mut self, tokens: &[Token], reward: f64);

    /// Highest-reward tokens seen so far, if any trial was scored.
    fn best_tokens(&self) -> Option<&[Token]>;

    /// Controller name for logging.
    fn name(&self) -> &'static str {
        "SearchController"
    }
}
