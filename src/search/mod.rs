//! Search controllers for pruning-ratio search
//!
//! A controller walks the token space one trial at a time:
//! - `SearchController` - the contract the strategy drives
//! - `SequencedController` - rejects out-of-order controller calls
//! - `SaController` - simulated annealing over token vectors

mod annealing;
mod sequenced;
mod traits;

pub use annealing::{SaConfig, SaController};
pub use sequenced::SequencedController;
pub use traits::{ConstraintPredicate, SearchController};
