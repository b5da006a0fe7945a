//! Mini-batch training loop.
//!
//! The [`Trainer`] is a small state machine. It starts `Running` and ends either `Converged`
//! (validation accuracy stopped moving) or `Exhausted` (ran out of epochs).

use derive_more::{Deref, Display};
use faer::prelude::*;
use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::{
    NeuralNetwork, Result, Topology,
    core::{apply_derivs, backward, cross_entropy, forward},
    error::{Error, check_shape, shape_of},
    evaluate::predict,
};

/// Hyperparameters of a training run.
///
/// Deserializable from JSON; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// `[n_inputs, hidden..., n_classes]`.
    pub layer_dims: Vec<usize>,
    pub learning_rate: f64,
    /// Maximum number of epochs.
    pub num_iterations: usize,
    pub batch_size: usize,
    /// Batch normalization is only available as the standalone [`apply_batchnorm`]; setting this
    /// logs a warning and trains without it.
    ///
    /// [`apply_batchnorm`]: crate::apply_batchnorm
    pub use_batchnorm: bool,
    /// Training stops once two consecutive validation accuracies differ by less than this.
    /// `0.0` disables the check.
    pub convergence_epsilon: f64,
    /// Share of the examples held out for validation, rounded up.
    pub validation_fraction: f64,
    /// Record history and test for convergence every this many batches.
    ///
    /// The batch counter runs across epochs and is not reset at epoch boundaries, so sampling
    /// points do not line up with the start of each epoch unless `sample_every` divides the
    /// number of batches per epoch. To sample once per epoch, at its first batch, set this to
    /// `ceil(n_train / batch_size)`.
    pub sample_every: usize,
    /// Seeds shuffling and initialization. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            layer_dims: vec![784, 20, 7, 5, 10],
            learning_rate: 0.009,
            num_iterations: 30,
            batch_size: 128,
            use_batchnorm: false,
            convergence_epsilon: 0.001,
            validation_fraction: 0.2,
            sample_every: 100,
            seed: None,
        }
    }
}

impl TrainerConfig {
    /// Checks every field and returns the network topology.
    pub fn validate(&self) -> Result<Topology> {
        let topology = Topology::from_layer_dims(&self.layer_dims)?;
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::configuration(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.num_iterations == 0 {
            return Err(Error::configuration("num_iterations must be positive"));
        }
        if self.batch_size == 0 {
            return Err(Error::configuration("batch_size must be positive"));
        }
        if self.sample_every == 0 {
            return Err(Error::configuration("sample_every must be positive"));
        }
        if !(self.convergence_epsilon.is_finite() && self.convergence_epsilon >= 0.0) {
            return Err(Error::configuration(format!(
                "convergence_epsilon must be non-negative, got {}",
                self.convergence_epsilon
            )));
        }
        if !(self.validation_fraction > 0.0 && self.validation_fraction < 1.0) {
            return Err(Error::configuration(format!(
                "validation_fraction must be in (0, 1), got {}",
                self.validation_fraction
            )));
        }
        Ok(topology)
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum TrainerState {
    #[display("running")]
    Running,
    #[display("converged at epoch {epoch}, step {step}")]
    Converged { epoch: usize, step: usize },
    #[display("exhausted")]
    Exhausted,
}

impl TrainerState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistorySample {
    /// Index of this sample in the history.
    pub step: usize,
    pub epoch: usize,
    /// Global batch counter, across epochs.
    pub batch: usize,
    /// Cost of the batch being trained on. NaN if it could not be computed.
    pub cost: f64,
    pub validation_accuracy: f64,
}

/// Costs and validation accuracies sampled during training, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Deref)]
pub struct History {
    samples: Vec<HistorySample>,
}

impl History {
    pub(crate) fn push(&mut self, sample: HistorySample) {
        self.samples.push(sample);
    }

    pub fn costs(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|sample| sample.cost)
    }

    pub fn validation_accuracies(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|sample| sample.validation_accuracy)
    }
}

/// Detects a plateau in validation accuracy.
///
/// This fires on *any* plateau, including an early one where two coincidentally equal accuracies
/// are seen before the network has learned anything.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceMonitor {
    epsilon: f64,
    previous: Option<f64>,
}

impl ConvergenceMonitor {
    pub fn new(epsilon: f64) -> Self {
        Self {
            epsilon,
            previous: None,
        }
    }

    /// Records `accuracy` and returns whether it differs from the previous one by less than
    /// epsilon. Always `false` for the first observation.
    pub fn observe(&mut self, accuracy: f64) -> bool {
        let converged = self
            .previous
            .is_some_and(|previous| (previous - accuracy).abs() < self.epsilon);
        self.previous = Some(accuracy);
        converged
    }
}

/// Examples split into a training part and a held-out validation part.
#[derive(Debug, Clone)]
pub struct Split {
    pub x_train: Mat<f64>,
    pub y_train: Mat<f64>,
    pub x_validation: Mat<f64>,
    pub y_validation: Mat<f64>,
}

fn select_columns(m: MatRef<f64>, indices: &[usize]) -> Mat<f64> {
    Mat::from_fn(m.nrows(), indices.len(), |i, j| m[(i, indices[j])])
}

/// Shuffles the columns of `x` and `y` together and holds out `ceil(validation_fraction * n)` of
/// them for validation.
pub fn split_validation(
    x: MatRef<f64>,
    y: MatRef<f64>,
    validation_fraction: f64,
    rng: &mut impl Rng,
) -> Result<Split> {
    check_shape("split_validation", (y.nrows(), x.ncols()), shape_of(y))?;
    let n = x.ncols();
    let n_validation = (validation_fraction * n as f64).ceil() as usize;
    if n_validation == 0 || n_validation >= n {
        return Err(Error::configuration(format!(
            "cannot hold out {n_validation} of {n} examples for validation"
        )));
    }
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    let (validation, train) = indices.split_at(n_validation);
    Ok(Split {
        x_train: select_columns(x, train),
        y_train: select_columns(y, train),
        x_validation: select_columns(x, validation),
        y_validation: select_columns(y, validation),
    })
}

/// Cost of the batch being trained on. Numerical failures are logged and recorded as NaN so
/// that training carries on.
fn batch_cost(a: MatRef<f64>, y: MatRef<f64>) -> Result<f64> {
    match cross_entropy(a, y) {
        Ok(cost) => Ok(cost),
        Err(err @ Error::Numerical { .. }) => {
            warn!(%err, "recording NaN cost");
            Ok(f64::NAN)
        }
        Err(err) => Err(err),
    }
}

/// Final state of a finished training run.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub state: TrainerState,
    pub network: NeuralNetwork,
    pub history: History,
    pub train_accuracy: f64,
    pub validation_accuracy: f64,
}

#[derive(Debug)]
pub struct Trainer {
    config: TrainerConfig,
    nn: NeuralNetwork,
    split: Split,
    history: History,
    monitor: ConvergenceMonitor,
    state: TrainerState,
    epoch: usize,
    n_batches: usize,
}

impl Trainer {
    /// Validates `config`, splits off the validation set and initializes the parameters.
    ///
    /// `x` holds one example per column, `y` the matching one-hot labels.
    pub fn new(config: TrainerConfig, x: MatRef<f64>, y: MatRef<f64>) -> Result<Self> {
        let topology = config.validate()?;
        check_shape(
            "Trainer::new",
            (topology.n_inputs(), x.ncols()),
            shape_of(x),
        )?;
        check_shape(
            "Trainer::new",
            (topology.n_outputs(), x.ncols()),
            shape_of(y),
        )?;
        if config.use_batchnorm {
            warn!("batch normalization is not part of the forward pass, training without it");
        }
        let mut rng = config
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        let split = split_validation(x, y, config.validation_fraction, &mut rng)?;
        let nn = NeuralNetwork::new(topology, &mut rng);
        info!(
            layer_dims = ?config.layer_dims,
            n_train = split.x_train.ncols(),
            n_validation = split.x_validation.ncols(),
            "starting training"
        );
        Ok(Self {
            monitor: ConvergenceMonitor::new(config.convergence_epsilon),
            config,
            nn,
            split,
            history: History::default(),
            state: TrainerState::Running,
            epoch: 0,
            n_batches: 0,
        })
    }

    pub fn state(&self) -> TrainerState {
        self.state
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn network(&self) -> &NeuralNetwork {
        &self.nn
    }

    pub fn split(&self) -> &Split {
        &self.split
    }

    /// Number of completed epochs.
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    /// Runs one epoch over the training split, unless training already ended.
    pub fn run_epoch(&mut self) -> Result<TrainerState> {
        if self.state.is_terminal() {
            return Ok(self.state);
        }
        let n_train = self.split.x_train.ncols();
        let batch_size = self.config.batch_size;
        for start in (0..n_train).step_by(batch_size) {
            let n = batch_size.min(n_train - start);
            let x = self.split.x_train.as_ref().subcols(start, n);
            let y = self.split.y_train.as_ref().subcols(start, n);
            let derivs = {
                let (a, caches) = forward(x, self.nn.params())?;
                if self.n_batches % self.config.sample_every == 0 {
                    let validation_accuracy = predict(
                        self.split.x_validation.as_ref(),
                        self.split.y_validation.as_ref(),
                        self.nn.params(),
                    )?;
                    let cost = batch_cost(a.as_ref(), y)?;
                    let step = self.history.len();
                    self.history.push(HistorySample {
                        step,
                        epoch: self.epoch,
                        batch: self.n_batches,
                        cost,
                        validation_accuracy,
                    });
                    info!(step, epoch = self.epoch, validation_accuracy, cost, "training step");
                    if self.monitor.observe(validation_accuracy) {
                        self.state = TrainerState::Converged {
                            epoch: self.epoch,
                            step,
                        };
                        info!(epoch = self.epoch, step, validation_accuracy, "converged");
                        return Ok(self.state);
                    }
                }
                backward(a.as_ref(), y, &caches)?
            };
            apply_derivs(self.nn.params_mut(), &derivs, self.config.learning_rate)?;
            self.n_batches += 1;
        }
        self.epoch += 1;
        debug!(epoch = self.epoch, "finished epoch");
        if self.epoch >= self.config.num_iterations {
            self.state = TrainerState::Exhausted;
            info!(epochs = self.epoch, "no convergence, stopping");
        }
        Ok(self.state)
    }

    /// Runs epochs until training converges or runs out of epochs.
    pub fn run(&mut self) -> Result<TrainerState> {
        while !self.state.is_terminal() {
            self.run_epoch()?;
        }
        Ok(self.state)
    }

    /// Evaluates the final accuracies and hands out the trained network.
    pub fn finish(self) -> Result<TrainingOutcome> {
        let train_accuracy = self
            .nn
            .predict(self.split.x_train.as_ref(), self.split.y_train.as_ref())?;
        let validation_accuracy = self.nn.predict(
            self.split.x_validation.as_ref(),
            self.split.y_validation.as_ref(),
        )?;
        info!(
            state = %self.state,
            train_accuracy,
            validation_accuracy,
            "training finished"
        );
        Ok(TrainingOutcome {
            state: self.state,
            network: self.nn,
            history: self.history,
            train_accuracy,
            validation_accuracy,
        })
    }
}

/// Trains a network from scratch on `x`/`y` until it converges or runs out of epochs.
pub fn train(config: TrainerConfig, x: MatRef<f64>, y: MatRef<f64>) -> Result<TrainingOutcome> {
    let mut trainer = Trainer::new(config, x, y)?;
    trainer.run()?;
    trainer.finish()
}
