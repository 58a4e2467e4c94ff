//! In-memory chain of convolution layers.
//!
//! Each layer's weight is `[out, in_per_group, kh, kw]` and its input
//! channels are the previous layer's output channels (the first layer reads
//! the network input). FLOPs per layer are
//! `out * in_per_group * kh * kw * out_h * out_w`.

use crate::error::{AutoPruneError, Result};
use crate::graph::ModelGraph;

/// One convolution weight in a [`SequentialConvGraph`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConvLayer {
    name: String,
    shape: Vec<usize>,
    output_hw: (usize, usize),
    groups: usize,
}

impl ConvLayer {
    /// Create a dense (`groups = 1`) convolution weight.
    pub fn new(name: impl Into<String>, shape: [usize; 4], output_hw: (usize, usize)) -> Self {
        Self { name: name.into(), shape: shape.to_vec(), output_hw, groups: 1 }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn groups(&self) -> usize {
        self.groups
    }

    pub fn output_hw(&self) -> (usize, usize) {
        self.output_hw
    }

    pub fn out_channels(&self) -> usize {
        self.shape[0]
    }

    fn numel(&self) -> u64 {
        self.shape.iter().map(|&d| d as u64).product()
    }

    fn flops(&self) -> u64 {
        let (h, w) = self.output_hw;
        self.numel() * h as u64 * w as u64
    }
}

/// Sequential convolutional network graph.
///
/// # Example
///
/// ```
/// use entrenar_autoprune::graph::{ConvLayer, ModelGraph, SequentialConvGraph};
///
/// let graph = SequentialConvGraph::new(
///     3,
///     vec![
///         ConvLayer::new("conv1_weights", [16, 3, 3, 3], (8, 8)),
///         ConvLayer::new("conv2_weights", [32, 16, 3, 3], (4, 4)),
///     ],
/// )
/// .unwrap();
/// assert_eq!(graph.flops(), 16 * 3 * 9 * 64 + 32 * 16 * 9 * 16);
/// assert_eq!(graph.channel_consumers("conv1_weights"), vec!["conv2_weights"]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SequentialConvGraph {
    input_channels: usize,
    layers: Vec<ConvLayer>,
    compilations: usize,
}

impl SequentialConvGraph {
    /// Build a chain, checking that adjacent layers agree on channel counts.
    pub fn new(input_channels: usize, layers: Vec<ConvLayer>) -> Result<Self> {
        let mut graph = Self { input_channels, layers, compilations: 0 };
        for (i, layer) in graph.layers.iter().enumerate() {
            if layer.shape.contains(&0) {
                return Err(AutoPruneError::Graph(format!(
                    "layer '{}' has a zero dimension: {:?}",
                    layer.name, layer.shape
                )));
            }
            if graph.layers[..i].iter().any(|l| l.name == layer.name) {
                return Err(AutoPruneError::Graph(format!("duplicate layer '{}'", layer.name)));
            }
        }
        graph.resync_structure();
        graph.check_channels()?;
        Ok(graph)
    }

    pub fn layers(&self) -> &[ConvLayer] {
        &self.layers
    }

    /// Number of successful `compile` calls.
    pub fn compilations(&self) -> usize {
        self.compilations
    }

    /// `(name, shape)` for every layer, in graph order.
    pub fn shapes(&self) -> Vec<(String, Vec<usize>)> {
        self.layers.iter().map(|l| (l.name.clone(), l.shape.clone())).collect()
    }

    fn index_of(&self, param: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.name == param)
    }

    fn producer_channels(&self, index: usize) -> usize {
        if index == 0 {
            self.input_channels
        } else {
            self.layers[index - 1].out_channels()
        }
    }

    fn check_channels(&self) -> Result<()> {
        for (i, layer) in self.layers.iter().enumerate() {
            let produced = self.producer_channels(i);
            let consumed = layer.shape[1] * layer.groups;
            if produced != consumed {
                return Err(AutoPruneError::Graph(format!(
                    "layer '{}' consumes {consumed} channels but its input has {produced}",
                    layer.name
                )));
            }
        }
        Ok(())
    }
}

impl ModelGraph for SequentialConvGraph {
    fn parameter_names(&self) -> Vec<String> {
        self.layers.iter().map(|l| l.name.clone()).collect()
    }

    fn flops(&self) -> u64 {
        self.layers.iter().map(ConvLayer::flops).sum()
    }

    fn numel_params(&self) -> u64 {
        self.layers.iter().map(ConvLayer::numel).sum()
    }

    fn shape(&self, param: &str) -> Option<&[usize]> {
        self.index_of(param).map(|i| self.layers[i].shape.as_slice())
    }

    fn set_shape(&mut self, param: &str, shape: Vec<usize>) -> Result<()> {
        let index =
            self.index_of(param).ok_or_else(|| AutoPruneError::UnknownParameter(param.to_string()))?;
        if shape.len() != 4 {
            return Err(AutoPruneError::Graph(format!(
                "conv weight '{param}' needs a 4-d shape, got {shape:?}"
            )));
        }
        self.layers[index].shape = shape;
        Ok(())
    }

    fn channel_consumers(&self, param: &str) -> Vec<String> {
        self.index_of(param)
            .and_then(|i| self.layers.get(i + 1))
            .map(|next| vec![next.name.clone()])
            .unwrap_or_default()
    }

    fn resync_structure(&mut self) {
        for i in 0..self.layers.len() {
            let produced = self.producer_channels(i);
            let per_group = self.layers[i].shape[1];
            self.layers[i].groups = if per_group == 0 { 1 } else { (produced / per_group).max(1) };
        }
    }

    fn compile(&mut self) -> Result<()> {
        self.check_channels()?;
        self.compilations += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_layer() -> SequentialConvGraph {
        SequentialConvGraph::new(
            3,
            vec![
                ConvLayer::new("conv1_weights", [64, 3, 3, 3], (1, 1)),
                ConvLayer::new("conv2_weights", [128, 64, 3, 3], (1, 1)),
                ConvLayer::new("conv3_weights", [256, 128, 3, 3], (1, 1)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_flops_and_numel() {
        let graph = three_layer();
        let expected = 64 * 3 * 9 + 128 * 64 * 9 + 256 * 128 * 9;
        assert_eq!(graph.flops(), expected);
        assert_eq!(graph.numel_params(), expected);
    }

    #[test]
    fn test_spatial_size_scales_flops_not_params() {
        let graph = SequentialConvGraph::new(
            3,
            vec![ConvLayer::new("conv1_weights", [8, 3, 3, 3], (10, 10))],
        )
        .unwrap();
        assert_eq!(graph.numel_params(), 8 * 3 * 9);
        assert_eq!(graph.flops(), 8 * 3 * 9 * 100);
    }

    #[test]
    fn test_rejects_channel_mismatch() {
        let result = SequentialConvGraph::new(
            3,
            vec![
                ConvLayer::new("conv1_weights", [64, 3, 3, 3], (1, 1)),
                ConvLayer::new("conv2_weights", [128, 32, 3, 3], (1, 1)),
            ],
        );
        // 64 / 32 resolves to two groups, which is a valid grouped conv
        assert_eq!(result.unwrap().layers()[1].groups(), 2);

        let result = SequentialConvGraph::new(
            3,
            vec![
                ConvLayer::new("conv1_weights", [64, 3, 3, 3], (1, 1)),
                ConvLayer::new("conv2_weights", [128, 48, 3, 3], (1, 1)),
            ],
        );
        assert!(matches!(result, Err(AutoPruneError::Graph(_))));
    }

    #[test]
    fn test_rejects_duplicate_and_zero_dims() {
        let dup = SequentialConvGraph::new(
            3,
            vec![
                ConvLayer::new("conv_weights", [3, 3, 3, 3], (1, 1)),
                ConvLayer::new("conv_weights", [3, 3, 3, 3], (1, 1)),
            ],
        );
        assert!(dup.is_err());

        let zero =
            SequentialConvGraph::new(3, vec![ConvLayer::new("conv_weights", [0, 3, 3, 3], (1, 1))]);
        assert!(zero.is_err());
    }

    #[test]
    fn test_set_shape_and_compile_consistency() {
        let mut graph = three_layer();
        graph.set_shape("conv1_weights", vec![45, 3, 3, 3]).unwrap();
        graph.resync_structure();
        assert!(graph.compile().is_err(), "consumer still reads 64 channels");
        assert_eq!(graph.compilations(), 0);

        graph.set_shape("conv2_weights", vec![128, 45, 3, 3]).unwrap();
        graph.resync_structure();
        graph.compile().unwrap();
        assert_eq!(graph.compilations(), 1);
    }

    #[test]
    fn test_set_shape_errors() {
        let mut graph = three_layer();
        assert!(matches!(
            graph.set_shape("fc_weights", vec![1, 1, 1, 1]),
            Err(AutoPruneError::UnknownParameter(_))
        ));
        assert!(matches!(graph.set_shape("conv1_weights", vec![64, 3]), Err(AutoPruneError::Graph(_))));
    }

    #[test]
    fn test_channel_consumers() {
        let graph = three_layer();
        assert_eq!(graph.channel_consumers("conv1_weights"), vec!["conv2_weights".to_string()]);
        assert_eq!(graph.channel_consumers("conv2_weights"), vec!["conv3_weights".to_string()]);
        assert!(graph.channel_consumers("conv3_weights").is_empty());
        assert!(graph.channel_consumers("missing").is_empty());
    }

    #[test]
    fn test_mirror_structure_copies_shapes() {
        let mut source = three_layer();
        let mut target = three_layer();
        source.set_shape("conv1_weights", vec![45, 3, 3, 3]).unwrap();
        source.set_shape("conv2_weights", vec![128, 45, 3, 3]).unwrap();

        crate::graph::mirror_structure(&mut target, &source).unwrap();
        assert_eq!(target.shapes(), source.shapes());
        assert_eq!(target.flops(), source.flops());
    }
}
