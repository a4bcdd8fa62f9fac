use std::path::PathBuf;

use anyhow::{ensure, Result};
use clap::{Parser, ValueEnum};
use machine_learning::Device;
use serde::Serialize;

/// The architecture to train.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Two hidden fully connected layers.
    Fc,
    /// Three convolutional stages and a fully connected head.
    Conv,
}

/// Trains a classifier on CIFAR-10 and reports its test set performance.
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Args {
    /// Directory holding the binary version of the dataset.
    #[arg(short, long, default_value = "data/cifar-10-batches-bin")]
    pub data_dir: PathBuf,
    #[arg(short, long, value_enum, default_value_t = ModelKind::Fc)]
    pub model: ModelKind,
    #[arg(short, long, default_value_t = 1e-3)]
    pub learning_rate: f32,
    #[arg(short, long, default_value_t = 1e-3)]
    pub weight_decay: f32,
    /// Width of the first hidden layer of the fully connected model.
    #[arg(long, default_value_t = 100)]
    pub hidden1: usize,
    /// Width of the second hidden layer of the fully connected model.
    #[arg(long, default_value_t = 100)]
    pub hidden2: usize,
    #[arg(short, long, default_value_t = 10)]
    pub epochs: usize,
    #[arg(short, long, default_value_t = 64)]
    pub batch_size: usize,
    /// Iterations of the single batch sanity check, 0 skips it.
    #[arg(long, default_value_t = 20)]
    pub overfit_iters: usize,
    /// Share of the training images held out for validation.
    #[arg(long, default_value_t = 0.1)]
    pub val_fraction: f64,
    #[arg(short, long, default_value_t = 0)]
    pub seed: u64,
    /// Split convolution and pooling batches across threads.
    #[arg(short, long)]
    pub parallel: bool,
    /// Writes the loss curves and the evaluation to this file as JSON.
    #[arg(long)]
    pub json: Option<PathBuf>,
}

impl Args {
    pub fn device(&self) -> Device {
        if self.parallel {
            Device::Parallel
        } else {
            Device::Cpu
        }
    }

    /// Checks the arguments the models and loaders don't validate themselves.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.batch_size > 0, "the batch size must be positive");
        ensure!(
            self.val_fraction > 0. && self.val_fraction < 1.,
            "the validation fraction must be within (0, 1), got {}",
            self.val_fraction
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::parse_from(["deepnets"]);

        assert_eq!(args.model, ModelKind::Fc);
        assert_eq!((args.hidden1, args.hidden2), (100, 100));
        assert_eq!((args.epochs, args.batch_size), (10, 64));
        assert_eq!(args.device(), Device::Cpu);
        assert!(args.json.is_none());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn parses_flags() {
        let args = Args::parse_from([
            "deepnets", "-m", "conv", "-l", "0.01", "--parallel", "-b", "32", "--json", "out.json",
        ]);

        assert_eq!(args.model, ModelKind::Conv);
        assert_eq!(args.learning_rate, 0.01);
        assert_eq!(args.batch_size, 32);
        assert_eq!(args.device(), Device::Parallel);
        assert_eq!(args.json, Some(PathBuf::from("out.json")));
    }

    #[test]
    fn rejects_bad_values() {
        let args = Args::parse_from(["deepnets", "-b", "0"]);
        assert!(args.validate().is_err());

        let args = Args::parse_from(["deepnets", "--val-fraction", "1"]);
        assert!(args.validate().is_err());

        assert!(Args::try_parse_from(["deepnets", "-m", "rnn"]).is_err());
    }
}
