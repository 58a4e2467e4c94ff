//! Model graph abstractions
//!
//! The search never touches a framework directly. It sees a model through
//! [`ModelGraph`] (shapes, FLOPs, compilation) and [`ParamScope`] (tensor
//! values), bundled per call in a [`SearchContext`].
//!
//! [`SequentialConvGraph`] and [`TensorScope`] are small in-memory
//! implementations used to drive the search end to end.

mod context;
mod conv;
mod scope;
mod traits;

pub use context::SearchContext;
pub use conv::{ConvLayer, SequentialConvGraph};
pub use scope::TensorScope;
pub use traits::{mirror_structure, ModelGraph, ParamScope, Placement};
