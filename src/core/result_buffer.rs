use faer::prelude::*;

use crate::Activation;

/// Values one layer's forward pass keeps for its backward pass.
///
/// `w` and `b` borrow the parameters, so no update can happen while a cache is alive.
#[derive(Debug, Clone)]
pub struct LayerCache<'a> {
    /// Activation of the previous layer (the network input for layer 1).
    pub a_prev: Mat<f64>,
    pub w: MatRef<'a, f64>,
    pub b: ColRef<'a, f64>,
    /// Pre-activation. For softmax layers this is already shifted by its column maxima.
    pub z: Mat<f64>,
    pub phi: Activation,
}

impl LayerCache<'_> {
    pub fn batch_size(&self) -> usize {
        self.a_prev.ncols()
    }
}

/// Caches of one forward pass, first layer first.
#[derive(Debug, Clone, Default)]
pub struct ResultBuffer<'a> {
    layers: Vec<LayerCache<'a>>,
}

impl<'a> ResultBuffer<'a> {
    pub(crate) fn with_capacity(n_layers: usize) -> Self {
        Self {
            layers: Vec::with_capacity(n_layers),
        }
    }

    pub(crate) fn push(&mut self, cache: LayerCache<'a>) {
        self.layers.push(cache);
    }

    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    /// Returns `None` if `i_layer` is not in `1..=n_layers`.
    pub fn layer(&self, i_layer: usize) -> Option<&LayerCache<'a>> {
        self.layers.get(i_layer.checked_sub(1)?)
    }

    pub fn output_layer(&self) -> Option<&LayerCache<'a>> {
        self.layers.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LayerCache<'a>> {
        self.layers.iter()
    }
}
