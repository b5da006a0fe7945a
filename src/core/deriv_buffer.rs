use faer::prelude::*;

use crate::PrettyPrintLayer;

/// Gradients of one layer.
#[derive(Debug, Clone)]
pub struct LayerDerivs {
    /// dL / da^(u-1), same shape as the layer's input activation.
    pub da_prev: Mat<f64>,
    pub dw: Mat<f64>,
    pub db: Col<f64>,
}

/// Gradients of every layer for one batch, indexed by layer number `1..=n_layers`.
#[derive(Debug, Clone)]
pub struct DerivBuffer {
    layers: Box<[LayerDerivs]>,
}

impl DerivBuffer {
    /// `layers` are first layer first.
    pub(crate) fn from_layers(layers: Vec<LayerDerivs>) -> Self {
        Self {
            layers: layers.into_boxed_slice(),
        }
    }

    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    /// Returns `None` if `i_layer` is not in `1..=n_layers`.
    pub fn layer(&self, i_layer: usize) -> Option<&LayerDerivs> {
        self.layers.get(i_layer.checked_sub(1)?)
    }

    pub fn layers(&self) -> std::slice::Iter<'_, LayerDerivs> {
        self.layers.iter()
    }

    pub fn pretty_print_layer(&self, i_layer: usize) -> Option<PrettyPrintLayer<'_>> {
        let layer = self.layer(i_layer)?;
        Some(PrettyPrintLayer::derivs(
            i_layer,
            layer.dw.as_ref(),
            layer.db.as_ref(),
        ))
    }
}
