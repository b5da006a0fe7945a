use faer::prelude::*;
use rand::Rng;

use crate::{
    Activation, Error, Result,
    core::{ParamBuffer, cross_entropy, forward},
    evaluate::predict,
};

/// Validated layer dimensions of a network.
///
/// `layer_dims[0]` is the number of input features, the last element is the number of output
/// classes. Every layer but the last is ReLU-activated, the last is softmax-activated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    n_inputs: usize,
    layer_descriptions: Vec<LayerDescription>,
}

impl Topology {
    pub fn from_layer_dims(layer_dims: &[usize]) -> Result<Self> {
        let [n_inputs, layer_sizes @ ..] = layer_dims else {
            return Err(Error::configuration("layer_dims must not be empty"));
        };
        if layer_sizes.is_empty() {
            return Err(Error::configuration(format!(
                "layer_dims needs at least 2 elements (input and output), got {layer_dims:?}"
            )));
        }
        if let Some(i) = layer_dims.iter().position(|&n| n == 0) {
            return Err(Error::configuration(format!(
                "layer_dims[{i}] is zero in {layer_dims:?}"
            )));
        }
        let n_layers = layer_sizes.len();
        let layer_descriptions = layer_sizes
            .iter()
            .enumerate()
            .map(|(u, &n_neurons)| LayerDescription {
                n_neurons,
                phi: match u + 1 == n_layers {
                    true => Activation::Softmax,
                    false => Activation::Relu,
                },
            })
            .collect();
        Ok(Self {
            n_inputs: *n_inputs,
            layer_descriptions,
        })
    }

    pub fn n_inputs(&self) -> usize {
        self.n_inputs
    }

    pub fn n_outputs(&self) -> usize {
        self.layer_descriptions()
            .last()
            .map_or(self.n_inputs, |last_layer| last_layer.n_neurons)
    }

    pub fn layer_descriptions(&self) -> &[LayerDescription] {
        &self.layer_descriptions
    }

    /// Number of layers `L`, not counting the input.
    pub fn n_layers(&self) -> usize {
        self.layer_descriptions().len()
    }

    pub fn layer_dims(&self) -> Vec<usize> {
        let mut dims = Vec::with_capacity(self.n_layers() + 1);
        dims.push(self.n_inputs);
        dims.extend(self.layer_descriptions.iter().map(|layer| layer.n_neurons));
        dims
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerDescription {
    pub n_neurons: usize,
    pub phi: Activation,
}

/// A topology together with its parameters.
#[derive(Debug, Clone)]
pub struct NeuralNetwork {
    topology: Topology,
    params: ParamBuffer,
}

impl NeuralNetwork {
    /// Creates a network with freshly initialized parameters.
    pub fn new(topology: Topology, rng: &mut impl Rng) -> Self {
        let params = ParamBuffer::initialize(&topology, rng);
        Self { topology, params }
    }

    pub fn from_params(params: ParamBuffer) -> Result<Self> {
        let topology = Topology::from_layer_dims(&params.layer_dims())?;
        Ok(Self { topology, params })
    }

    pub fn n_inputs(&self) -> usize {
        self.topology().n_inputs()
    }

    pub fn n_outputs(&self) -> usize {
        self.topology().n_outputs()
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn params(&self) -> &ParamBuffer {
        &self.params
    }

    /// Parameter shapes cannot be changed through `ParamBuffer`'s API, so the topology stays
    /// in sync.
    pub fn params_mut(&mut self) -> &mut ParamBuffer {
        &mut self.params
    }

    pub fn into_params(self) -> ParamBuffer {
        self.params
    }

    /// Class probabilities for each column of `x`.
    pub fn forward(&self, x: MatRef<f64>) -> Result<Mat<f64>> {
        let (a, _caches) = forward(x, &self.params)?;
        Ok(a)
    }

    /// Cross-entropy cost over the columns of `x`.
    pub fn loss(&self, x: MatRef<f64>, y: MatRef<f64>) -> Result<f64> {
        let a = self.forward(x)?;
        cross_entropy(a.as_ref(), y)
    }

    /// Classification accuracy over the columns of `x`.
    pub fn predict(&self, x: MatRef<f64>, y: MatRef<f64>) -> Result<f64> {
        predict(x, y, &self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn assigns_relu_then_softmax() {
        let topology = Topology::from_layer_dims(&[784, 20, 7, 5, 10]).unwrap();
        assert_eq!(topology.n_inputs(), 784);
        assert_eq!(topology.n_outputs(), 10);
        assert_eq!(topology.n_layers(), 4);
        let phis: Vec<_> = topology
            .layer_descriptions()
            .iter()
            .map(|layer| layer.phi)
            .collect();
        assert_eq!(
            phis,
            [
                Activation::Relu,
                Activation::Relu,
                Activation::Relu,
                Activation::Softmax
            ]
        );
        assert_eq!(topology.layer_dims(), [784, 20, 7, 5, 10]);
    }

    #[test]
    fn single_layer_network_is_softmax_only() {
        let topology = Topology::from_layer_dims(&[3, 2]).unwrap();
        assert_eq!(topology.layer_descriptions()[0].phi, Activation::Softmax);
    }

    #[test]
    fn rejects_short_or_zero_dims() {
        for dims in [&[][..], &[5][..], &[4, 0, 2][..]] {
            assert!(matches!(
                Topology::from_layer_dims(dims),
                Err(Error::Configuration { .. })
            ));
        }
    }

    #[test]
    fn from_params_recovers_topology() {
        let mut rng = StdRng::seed_from_u64(3);
        let topology = Topology::from_layer_dims(&[4, 3, 2]).unwrap();
        let nn = NeuralNetwork::new(topology.clone(), &mut rng);
        let rebuilt = NeuralNetwork::from_params(nn.into_params()).unwrap();
        assert_eq!(rebuilt.topology(), &topology);
    }
}
