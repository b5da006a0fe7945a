use std::{fs, path::PathBuf};

use anyhow::Context as _;
use clap::Parser;
use ffnet::{TrainerConfig, faer::prelude::*, train};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Normal};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Trains a network on Gaussian blobs, one blob per class.
#[derive(Debug, Parser)]
struct Args {
    /// JSON training config. Command line flags override its fields.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Comma separated, e.g. `2,16,8,3`.
    #[arg(long, value_delimiter = ',')]
    layer_dims: Option<Vec<usize>>,
    #[arg(long)]
    learning_rate: Option<f64>,
    /// Maximum number of epochs.
    #[arg(long)]
    epochs: Option<usize>,
    #[arg(long)]
    batch_size: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
    /// Number of examples to generate.
    #[arg(long, default_value_t = 600)]
    samples: usize,
    /// Print the learned parameters.
    #[arg(long)]
    print_params: bool,
}

fn demo_config() -> TrainerConfig {
    TrainerConfig {
        layer_dims: vec![2, 16, 8, 3],
        learning_rate: 0.05,
        num_iterations: 200,
        batch_size: 32,
        sample_every: 10,
        ..Default::default()
    }
}

/// `n_samples` points around one center per class, with one-hot labels.
fn gaussian_blobs(
    n_inputs: usize,
    n_classes: usize,
    n_samples: usize,
    rng: &mut impl Rng,
) -> anyhow::Result<(Mat<f64>, Mat<f64>)> {
    let noise = Normal::new(0.0, 1.0)?;
    let classes: Vec<usize> = (0..n_samples).map(|_| rng.random_range(0..n_classes)).collect();
    // Class c sits 4 units out along feature c % n_inputs, further out for every wrap-around.
    let center = |c: usize, f: usize| match f == c % n_inputs {
        true => 4.0 * (1 + c / n_inputs) as f64,
        false => 0.0,
    };
    let x = Mat::from_fn(n_inputs, n_samples, |f, j| {
        center(classes[j], f) + noise.sample(rng)
    });
    let y = Mat::from_fn(n_classes, n_samples, |k, j| match classes[j] == k {
        true => 1.0,
        false => 0.0,
    });
    Ok((x, y))
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();

    let mut config: TrainerConfig = match &args.config {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&json)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => demo_config(),
    };
    if let Some(layer_dims) = args.layer_dims {
        config.layer_dims = layer_dims;
    }
    if let Some(learning_rate) = args.learning_rate {
        config.learning_rate = learning_rate;
    }
    if let Some(epochs) = args.epochs {
        config.num_iterations = epochs;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    let topology = config.validate()?;

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
        None => StdRng::from_os_rng(),
    };
    let (x, y) = gaussian_blobs(
        topology.n_inputs(),
        topology.n_outputs(),
        args.samples,
        &mut rng,
    )?;

    let outcome = train(config, x.as_ref(), y.as_ref())?;
    info!(
        state = %outcome.state,
        n_samples = outcome.history.len(),
        train_accuracy = outcome.train_accuracy,
        validation_accuracy = outcome.validation_accuracy,
        "done"
    );

    if args.print_params {
        let params = outcome.network.params();
        for i_layer in 1..=params.n_layers() {
            if let Some(layer) = params.pretty_print_layer(i_layer) {
                println!("=== Layer #{i_layer} ===\n\n{layer}\n");
            }
        }
    }
    Ok(())
}
