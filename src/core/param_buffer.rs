use faer::prelude::*;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::{
    Activation, PrettyPrintLayer, Result, Topology,
    error::{Error, check_shape},
};

#[derive(Debug, Clone)]
struct Layer {
    w: Mat<f64>,
    b: Col<f64>,
    phi: Activation,
}

impl Layer {
    fn as_ref(&self) -> LayerRef<'_> {
        LayerRef {
            n: self.w.nrows(),
            n_previous: self.w.ncols(),
            w: self.w.as_ref(),
            b: self.b.as_ref(),
            phi: self.phi,
        }
    }

    fn as_mut(&mut self) -> LayerMut<'_> {
        LayerMut {
            n: self.w.nrows(),
            n_previous: self.w.ncols(),
            w: self.w.as_mut(),
            b: self.b.as_mut(),
            phi: self.phi,
        }
    }
}

/// Immutable view of a layer.
#[derive(Debug, Clone, Copy)]
pub struct LayerRef<'a> {
    /// Number of neurons in this layer.
    pub n: usize,
    /// Number of neurons in the previous layer.
    pub n_previous: usize,
    pub w: MatRef<'a, f64>,
    pub b: ColRef<'a, f64>,
    pub phi: Activation,
}

/// Mutable view of a layer.
/// Values may change, shapes may not.
#[derive(Debug)]
pub struct LayerMut<'a> {
    /// Number of neurons in this layer.
    pub n: usize,
    /// Number of neurons in the previous layer.
    pub n_previous: usize,
    pub w: MatMut<'a, f64>,
    pub b: ColMut<'a, f64>,
    pub phi: Activation,
}

/// Weights and biases of every layer, indexed by layer number `1..=n_layers`.
#[derive(Debug, Clone)]
pub struct ParamBuffer {
    layers: Box<[Layer]>,
}

impl ParamBuffer {
    /// He initialization: `W ~ N(0, 1) * sqrt(2 / n_previous)`, `b ~ N(0, 1)`.
    pub fn initialize(topology: &Topology, rng: &mut impl Rng) -> Self {
        let mut n_previous = topology.n_inputs();
        let mut layers = Vec::with_capacity(topology.n_layers());
        for layer_description in topology.layer_descriptions() {
            let n = layer_description.n_neurons;
            let scale = f64::sqrt(2.0 / n_previous as f64);
            let w = Mat::from_fn(n, n_previous, |_, _| {
                rng.sample::<f64, _>(StandardNormal) * scale
            });
            let b = Col::from_fn(n, |_| rng.sample::<f64, _>(StandardNormal));
            layers.push(Layer {
                w,
                b,
                phi: layer_description.phi,
            });
            n_previous = n;
        }
        Self {
            layers: layers.into_boxed_slice(),
        }
    }

    /// Builds a buffer from explicit `(W, b)` pairs, first layer first.
    ///
    /// Each `W` must have as many columns as the previous `W` has rows, and each `b` as many rows
    /// as its `W`.
    pub fn from_layers(layers: Vec<(Mat<f64>, Col<f64>)>) -> Result<Self> {
        if layers.is_empty() {
            return Err(Error::configuration("a network needs at least one layer"));
        }
        let n_layers = layers.len();
        let mut n_previous = layers[0].0.ncols();
        let layers = layers
            .into_iter()
            .enumerate()
            .map(|(u, (w, b))| {
                check_shape(
                    "ParamBuffer::from_layers",
                    (w.nrows(), n_previous),
                    (w.nrows(), w.ncols()),
                )?;
                check_shape("ParamBuffer::from_layers", (w.nrows(), 1), (b.nrows(), 1))?;
                n_previous = w.nrows();
                let phi = match u + 1 == n_layers {
                    true => Activation::Softmax,
                    false => Activation::Relu,
                };
                Ok(Layer { w, b, phi })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            layers: layers.into_boxed_slice(),
        })
    }

    /// Number of layers in the neural network.
    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn n_inputs(&self) -> usize {
        self.layers.first().map_or(0, |layer| layer.w.ncols())
    }

    pub fn n_outputs(&self) -> usize {
        self.layers.last().map_or(0, |layer| layer.w.nrows())
    }

    /// `[n_inputs, n_1, ..., n_L]`.
    pub fn layer_dims(&self) -> Vec<usize> {
        let mut dims = Vec::with_capacity(self.n_layers() + 1);
        dims.push(self.n_inputs());
        dims.extend(self.layers.iter().map(|layer| layer.w.nrows()));
        dims
    }

    /// Get a immutable view of a layer.
    /// Returns `None` if `i_layer` is not in `1..=n_layers`.
    pub fn layer(&self, i_layer: usize) -> Option<LayerRef<'_>> {
        let layer = self.layers.get(i_layer.checked_sub(1)?)?;
        Some(layer.as_ref())
    }

    /// Get a mutable view of a layer.
    /// Returns `None` if `i_layer` is not in `1..=n_layers`.
    pub fn layer_mut(&mut self, i_layer: usize) -> Option<LayerMut<'_>> {
        let layer = self.layers.get_mut(i_layer.checked_sub(1)?)?;
        Some(layer.as_mut())
    }

    /// All layers, first to last.
    pub fn layers(&self) -> impl DoubleEndedIterator<Item = LayerRef<'_>> + ExactSizeIterator {
        self.layers.iter().map(Layer::as_ref)
    }

    /// Mutable views of all layers, first to last.
    pub fn layers_mut(&mut self) -> impl Iterator<Item = LayerMut<'_>> {
        self.layers.iter_mut().map(Layer::as_mut)
    }

    pub fn pretty_print_layer(&self, i_layer: usize) -> Option<PrettyPrintLayer<'_>> {
        let layer = self.layer(i_layer)?;
        Some(PrettyPrintLayer::params(i_layer, layer))
    }
}
