//! Automatic structured pruning for Entrenar
//!
//! This module searches per-parameter channel-pruning ratios while a model
//! trains. It implements:
//!
//! - **Token Codec**: ratios quantized to integer tokens a controller can walk
//! - **Constraint Evaluator**: side-effect-free FLOPs-band oracle
//! - **Uniform Initializer**: bounded bisection for a single seed ratio
//! - **Trial Ledger**: write-once backup that makes every trial reversible
//! - **Auto-Prune Strategy**: epoch-driven trial/restore loop with a final commit
//!
//! # Toyota Way Principles
//!
//! - **Jidoka** (Quality at Source): a trial that cannot be restored exactly is an error
//! - **Genchi Genbutsu** (Go and See): rewards come from the real evaluation metric
//!
//! # Example
//!
//! ```ignore
//! use entrenar_autoprune::prune::{AutoPruneConfig, AutoPruneStrategy, ChannelPruner, CompressionStrategy};
//! use entrenar_autoprune::search::SaController;
//!
//! let config = AutoPruneConfig::default()
//!     .with_epochs(0, 30)
//!     .with_flops_band(0.5, 0.7)
//!     .with_pruned_params("conv.*_weights");
//!
//! let mut strategy = AutoPruneStrategy::new(config, ChannelPruner, SaController::default())?;
//! strategy.on_compression_begin(&mut ctx)?;
//! ```
//!
//! # References
//!
//! - Li, H., et al. (2017). Pruning filters for efficient ConvNets. ICLR.
//! - He, Y., et al. (2018). AMC: AutoML for model compression. ECCV.

mod codec;
mod config;
mod constraint;
mod ledger;
mod pruner;
mod strategy;
mod uniform;

pub use codec::{ratio_to_token, ratios_to_tokens, token_to_ratio, tokens_to_ratios, Token, MAX_TOKEN, RATIO_QUANTUM};
pub use config::AutoPruneConfig;
pub use constraint::{measure_pruned, BoundConstraint, ConstraintEvaluator, Measurement};
pub use ledger::{BackupEntry, TrialBackup};
pub use pruner::{pruned_channels, ChannelPruner, PruneReport, Pruner};
pub use strategy::{AutoPruneStrategy, CompressionStrategy, EpochOutcome, EpochSchedule, SearchPhase, SkipReason};
pub use uniform::{UniformRatio, UniformRatioSearch};
