//! # Entrenar Auto-Prune
//!
//! Automatic structured-pruning search for training loops.
//!
//! A search controller proposes per-parameter pruning ratios, each proposal
//! is applied to the live model as a reversible trial, scored with an
//! evaluation metric, and rolled back. When the search window closes the
//! best proposal is applied permanently and training continues on the
//! smaller model. Every proposal is kept inside a FLOPs-reduction band.
//!
//! ## Modules
//!
//! - [`graph`]: model graph and tensor-scope contracts plus in-memory implementations
//! - [`prune`]: token codec, constraint oracle, trial ledger and the auto-prune strategy
//! - [`search`]: controller contract, call sequencing and simulated annealing
//! - [`error`]: error taxonomy
//!
//! ## Example
//!
//! ```ignore
//! use entrenar_autoprune::graph::{ConvLayer, Placement, SearchContext, SequentialConvGraph, TensorScope};
//! use entrenar_autoprune::prune::{AutoPruneConfig, AutoPruneStrategy, ChannelPruner, CompressionStrategy};
//! use entrenar_autoprune::search::SaController;
//!
//! let graph = SequentialConvGraph::new(3, vec![
//!     ConvLayer::new("conv1_weights", [64, 3, 3, 3], (32, 32)),
//!     ConvLayer::new("conv2_weights", [128, 64, 3, 3], (16, 16)),
//! ])?;
//! let scope = TensorScope::for_graph(&graph, |_, i| i as f32);
//! let mut ctx = SearchContext::new(graph.clone(), graph, scope, Placement::Cpu);
//!
//! let config = AutoPruneConfig::from_yaml_file("autoprune.yaml")?;
//! let mut strategy = AutoPruneStrategy::new(config, ChannelPruner, SaController::default())?;
//! strategy.on_compression_begin(&mut ctx)?;
//! ```

pub mod error;
pub mod graph;
pub mod prune;
pub mod search;

pub use error::{AutoPruneError, Result};
pub use prune::{AutoPruneConfig, AutoPruneStrategy, CompressionStrategy, EpochOutcome};
pub use search::{SaController, SearchController};
