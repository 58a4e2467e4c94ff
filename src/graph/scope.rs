//! Tensor storage backed by `ndarray`.

use std::collections::HashMap;

use ndarray::{ArrayD, IxDyn};

use crate::error::{AutoPruneError, Result};
use crate::graph::{ModelGraph, ParamScope, Placement};

/// Named parameter tensors plus the placement each was last written to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TensorScope {
    tensors: HashMap<String, ArrayD<f32>>,
    placements: HashMap<String, Placement>,
}

impl TensorScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate one tensor per graph parameter, filled by `init(name, flat_index)`.
    pub fn for_graph<G, F>(graph: &G, mut init: F) -> Self
    where
        G: ModelGraph,
        F: FnMut(&str, usize) -> f32,
    {
        let mut scope = Self::new();
        for name in graph.parameter_names() {
            let Some(shape) = graph.shape(&name) else { continue };
            let len: usize = shape.iter().product();
            let data: Vec<f32> = (0..len).map(|i| init(&name, i)).collect();
            if let Ok(tensor) = ArrayD::from_shape_vec(IxDyn(shape), data) {
                scope.insert(name, tensor);
            }
        }
        scope
    }

    /// Register a tensor on the CPU.
    pub fn insert(&mut self, name: impl Into<String>, tensor: ArrayD<f32>) {
        let name = name.into();
        self.placements.insert(name.clone(), Placement::Cpu);
        self.tensors.insert(name, tensor);
    }

    pub fn placement(&self, param: &str) -> Option<Placement> {
        self.placements.get(param).copied()
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }
}

impl ParamScope for TensorScope {
    fn tensor(&self, param: &str) -> Option<&ArrayD<f32>> {
        self.tensors.get(param)
    }

    fn set_tensor(&mut self, param: &str, value: ArrayD<f32>, place: &Placement) -> Result<()> {
        let slot = self
            .tensors
            .get_mut(param)
            .ok_or_else(|| AutoPruneError::UnknownParameter(param.to_string()))?;
        *slot = value;
        self.placements.insert(param.to_string(), *place);
        Ok(())
    }
}
