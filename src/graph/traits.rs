//! Graph and parameter-storage contracts consumed by the search.
//!
//! - `ModelGraph` - structural view of a model (shapes, FLOPs, compilation)
//! - `ParamScope` - live tensor storage keyed by parameter name
//! - `Placement` - where tensors live when they are written back

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Compute placement for tensor writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    #[default]
    Cpu,
    Cuda(usize),
}

/// Structural view of a trainable model.
///
/// Shapes are metadata: changing one through `set_shape` never touches
/// tensor data, which lives in a [`ParamScope`].
pub trait ModelGraph {
    /// Parameter names in graph order.
    fn parameter_names(&self) -> Vec<String>;

    /// Forward-pass FLOPs at the current shapes.
    fn flops(&self) -> u64;

    /// Total element count across all parameters.
    fn numel_params(&self) -> u64;

    /// Current shape of a parameter.
    fn shape(&self, param: &str) -> Option<&[usize]>;

    /// Overwrite the shape of a parameter.
    fn set_shape(&mut self, param: &str, shape: Vec<usize>) -> Result<()>;

    /// Parameters whose input-channel axis consumes `param`'s output channels.
    fn channel_consumers(&self, param: &str) -> Vec<String>;

    /// Recompute bookkeeping derived from shapes (e.g. conv groups).
    fn resync_structure(&mut self);

    /// Rebuild the executable form after a structural change.
    fn compile(&mut self) -> Result<()>;
}

/// Storage for live parameter tensors.
pub trait ParamScope {
    /// Current value of a parameter.
    fn tensor(&self, param: &str) -> Option<&ArrayD<f32>>;

    /// Replace a parameter's value.
    fn set_tensor(&mut self, param: &str, value: ArrayD<f32>, place: &Placement) -> Result<()>;
}

/// Copy every parameter shape from `source` into `target`.
///
/// Keeps the evaluation graph a structural mirror of the optimization graph
/// without copying any tensor data. Parameters unknown to `target` are
/// skipped.
pub fn mirror_structure<G: ModelGraph>(target: &mut G, source: &G) -> Result<()> {
    for name in source.parameter_names() {
        let Some(shape) = source.shape(&name) else { continue };
        let stale = matches!(target.shape(&name), Some(current) if current != shape);
        if stale {
            target.set_shape(&name, shape.to_vec())?;
        }
    }
    Ok(())
}
