//! Simulated-annealing search controller.
//!
//! Each proposal perturbs one position of the current tokens. A scored
//! proposal replaces the current tokens if it improves the reward, or with
//! probability `exp((reward - current) / T)` otherwise, where the
//! temperature `T = init_temperature * reduce_rate^iteration` cools every
//! update.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::prune::Token;
use crate::search::{ConstraintPredicate, SearchController};

/// Annealing schedule and retry budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaConfig {
    /// Starting temperature.
    pub init_temperature: f64,
    /// Multiplicative cooling per update, in (0, 1].
    pub reduce_rate: f64,
    /// Perturbation attempts before falling back to the current tokens.
    pub max_try_number: usize,
    /// RNG seed.
    pub seed: u64,
}

impl Default for SaConfig {
    fn default() -> Self {
        Self { init_temperature: 1024.0, reduce_rate: 0.85, max_try_number: 300, seed: 42 }
    }
}

/// Simulated-annealing controller over token vectors.
pub struct SaController {
    config: SaConfig,
    rng: StdRng,
    range_table: Vec<Token>,
    tokens: Vec<Token>,
    reward: f64,
    best_tokens: Option<Vec<Token>>,
    max_reward: f64,
    iteration: usize,
    constraint: Option<Box<dyn ConstraintPredicate>>,
}

impl std::fmt::Debug for SaController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaController")
            .field("config", &self.config)
            .field("tokens", &self.tokens)
            .field("reward", &self.reward)
            .field("best_tokens", &self.best_tokens)
            .field("max_reward", &self.max_reward)
            .field("iteration", &self.iteration)
            .finish_non_exhaustive()
    }
}

impl Default for SaController {
    fn default() -> Self {
        Self::new(SaConfig::default())
    }
}

impl SaController {
    pub fn new(config: SaConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            range_table: Vec::new(),
            tokens: Vec::new(),
            reward: f64::NEG_INFINITY,
            best_tokens: None,
            max_reward: f64::NEG_INFINITY,
            iteration: 0,
            constraint: None,
        }
    }

    /// Current temperature.
    pub fn temperature(&self) -> f64 {
        self.config.init_temperature * self.config.reduce_rate.powi(self.iteration as i32)
    }

    /// Tokens the walk currently sits on.
    pub fn current_tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn max_reward(&self) -> f64 {
        self.max_reward
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Copy of `base` with one position resampled from `[0, range_table[i])`.
    fn perturb(&mut self, base: &[Token]) -> Vec<Token> {
        let mut tokens = base.to_vec();
        if tokens.is_empty() {
            return tokens;
        }
        let index = self.rng.random_range(0..tokens.len());
        let bound = self.range_table.get(index).copied().unwrap_or(0);
        if bound > 0 {
            tokens[index] = self.rng.random_range(0..bound);
        }
        tokens
    }
}

impl SearchController for SaController {
    fn reset(
        &mut self,
        range_table: Vec<Token>,
        initial_tokens: Vec<Token>,
        constraint: Box<dyn ConstraintPredicate>,
    ) {
        self.range_table = range_table;
        self.tokens = initial_tokens;
        self.reward = f64::NEG_INFINITY;
        self.best_tokens = None;
        self.max_reward = f64::NEG_INFINITY;
        self.iteration = 0;
        self.constraint = Some(constraint);
    }

    fn next_tokens(&mut self) -> Vec<Token> {
        let base = self.tokens.clone();
        for _ in 0..self.config.max_try_number {
            let candidate = self.perturb(&base);
            let admissible = match self.constraint.as_mut() {
                Some(constraint) => constraint.is_admissible(&candidate),
                None => true,
            };
            if admissible {
                return candidate;
            }
        }
        tracing::debug!(
            tries = self.config.max_try_number,
            "no admissible perturbation found, re-proposing current tokens"
        );
        base
    }

    fn update(&mut self, tokens: &[Token], reward: f64) {
        self.iteration += 1;
        let temperature = self.temperature();
        let accept = reward > self.reward
            || self.rng.random::<f64>() <= ((reward - self.reward) / temperature).exp();
        if accept {
            self.reward = reward;
            self.tokens = tokens.to_vec();
        }
        if reward > self.max_reward {
            self.max_reward = reward;
            self.best_tokens = Some(tokens.to_vec());
        }
    }

    fn best_tokens(&self) -> Option<&[Token]> {
        self.best_tokens.as_deref()
    }

    fn name(&self) -> &'static str {
        "SaController"
    }
}
