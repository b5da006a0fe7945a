//! A fully-connected feed-forward network trainer: ReLU hidden layers, a softmax output layer,
//! cross-entropy loss, hand-written back-propagation and mini-batch gradient descent.
//!
//! Samples are columns: an input batch is an `n_inputs × batch_size` matrix and its labels are a
//! one-hot `n_classes × batch_size` matrix.

pub use faer;

mod activation;
mod batchnorm;
pub mod core;
mod error;
mod evaluate;
mod nn;
mod pretty_print;
mod trainer;

pub use activation::*;
pub use batchnorm::*;
pub use crate::core::{DerivBuffer, LayerCache, ParamBuffer, ResultBuffer};
pub use error::{Error, Result, Shape};
pub use evaluate::*;
pub use nn::*;
pub use pretty_print::*;
pub use trainer::*;
