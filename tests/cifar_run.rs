use std::{fs, path::PathBuf};

use clap::Parser;
use deepnets::{
    cifar::{self, CLASSES, IMAGE_SHAPE, TEST_FILE, TRAIN_FILES},
    config::{Args, ModelKind},
    experiment,
};
use machine_learning::{dataset::Batch, Context};
use rand::{rngs::StdRng, SeedableRng};

const PLANE_LEN: usize = 32 * 32;

/// An image whose label picks which channel is lit.
fn record(label: u8) -> Vec<u8> {
    let mut record = vec![label];
    for c in 0..3 {
        let value = if usize::from(label) % 3 == c { 200 } else { 20 };
        record.extend(std::iter::repeat_n(value + label, PLANE_LEN));
    }
    record
}

fn write_dataset(name: &str, per_file: usize) -> PathBuf {
    let dir = std::env::temp_dir().join(name);
    fs::create_dir_all(&dir).unwrap();

    let mut label = 0u8;
    let mut next_file = |n: usize| {
        let mut bytes = Vec::new();
        for _ in 0..n {
            bytes.extend(record(label));
            label = (label + 1) % 10;
        }
        bytes
    };

    for file in TRAIN_FILES {
        fs::write(dir.join(file), next_file(per_file)).unwrap();
    }
    fs::write(dir.join(TEST_FILE), next_file(6)).unwrap();

    dir
}

#[test]
fn loads_every_training_file() {
    let dir = write_dataset("deepnets-load", 3);

    let train = cifar::load_train(&dir).unwrap();
    let test = cifar::load_test(&dir).unwrap();

    assert_eq!(train.len(), 15);
    assert_eq!(test.len(), 6);
    assert_eq!(train.sample_shape(), &[3, 32, 32]);
    assert_eq!(&train.ys()[..4], &[0, 1, 2, 3]);
}

#[test]
fn runs_end_to_end() {
    let dir = write_dataset("deepnets-run", 4);
    let args = Args::parse_from([
        "deepnets",
        "--data-dir",
        dir.to_str().unwrap(),
        "--hidden1",
        "8",
        "--hidden2",
        "8",
        "--epochs",
        "2",
        "--batch-size",
        "4",
        "--overfit-iters",
        "3",
        "--val-fraction",
        "0.25",
        "--seed",
        "1",
    ]);

    let summary = experiment::run(&args).unwrap();

    assert_eq!(summary.model, ModelKind::Fc);
    assert_eq!(summary.parameters, 3072 * 8 + 8 + 8 * 8 + 8 + 8 * 10 + 10);
    assert_eq!(summary.history.len(), 2);

    let sanity_check = summary.sanity_check.as_ref().unwrap();
    assert_eq!(sanity_check.history.len(), 3);
    assert!((0. ..=1.).contains(&sanity_check.train_accuracy));

    let evaluation = &summary.evaluation;
    assert_eq!(evaluation.y_true.len(), 6);
    assert_eq!(evaluation.confusion.total(), 6);
    assert!(evaluation.report.to_string().contains("truck"));

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["history"]["train"].as_array().unwrap().len(), 2);
    assert_eq!(json["model"], "fc");
}

#[test]
fn builds_the_conv_model() {
    let args = Args::parse_from(["deepnets", "-m", "conv", "--parallel"]);
    let ctx = Context::new(args.device());

    let mut model = experiment::build_model(&args, &ctx, &mut StdRng::seed_from_u64(0)).unwrap();
    assert_eq!(model.network().size(), 5_852_234);
    assert!(model.network().optimizer().is_some());

    let batch = Batch::zeros(2, &IMAGE_SHAPE);
    let logits = model.forward(&ctx.no_grad(), batch.x.view()).unwrap();
    assert_eq!(logits.dim(), (2, CLASSES.len()));
    assert!(logits.iter().all(|l| l.is_finite()));
}

#[test]
fn missing_data_fails() {
    let args = Args::parse_from([
        "deepnets",
        "--data-dir",
        std::env::temp_dir().join("deepnets-nowhere").to_str().unwrap(),
    ]);

    let err = experiment::run(&args).unwrap_err();
    assert!(format!("{err:#}").contains("data_batch_1.bin"));
}
