//! Reader for the binary distribution of CIFAR-10.
//!
//! Every file is a sequence of records made of one label byte followed by the 32x32 red, green
//! and blue planes of the image, one byte per pixel.

use std::{fs, path::Path};

use anyhow::{ensure, Context, Result};
use machine_learning::dataset::Dataset;

pub const CLASSES: [&str; 10] = [
    "plane", "car", "bird", "cat", "deer", "dog", "frog", "horse", "ship", "truck",
];

/// Per channel mean of the training images, after scaling to `[0, 1]`.
pub const MEAN: [f32; 3] = [0.49139968, 0.48215841, 0.44653091];
/// Per channel standard deviation of the training images, after scaling to `[0, 1]`.
pub const STD: [f32; 3] = [0.24703223, 0.24348513, 0.26158784];

pub const IMAGE_SHAPE: [usize; 3] = [3, 32, 32];

pub const TRAIN_FILES: [&str; 5] = [
    "data_batch_1.bin",
    "data_batch_2.bin",
    "data_batch_3.bin",
    "data_batch_4.bin",
    "data_batch_5.bin",
];
pub const TEST_FILE: &str = "test_batch.bin";

const PLANE_LEN: usize = 32 * 32;
const IMAGE_LEN: usize = 3 * PLANE_LEN;
const RECORD_LEN: usize = 1 + IMAGE_LEN;

/// Decodes a buffer of records, appending the normalized images to `xs` and their labels to `ys`.
///
/// # Arguments
/// * `bytes` - The raw contents of a batch file.
/// * `xs` - The destination of the pixels, `IMAGE_LEN` values per record.
/// * `ys` - The destination of the labels.
///
/// # Returns
/// An error if the buffer holds a partial record or a label isn't one of the 10 classes.
pub fn parse_records(bytes: &[u8], xs: &mut Vec<f32>, ys: &mut Vec<usize>) -> Result<()> {
    ensure!(
        bytes.len() % RECORD_LEN == 0,
        "{} bytes is not a whole number of {RECORD_LEN} byte records",
        bytes.len()
    );

    xs.reserve(bytes.len() / RECORD_LEN * IMAGE_LEN);
    for (i, record) in bytes.chunks_exact(RECORD_LEN).enumerate() {
        let (label, image) = (record[0], &record[1..]);
        ensure!(
            (label as usize) < CLASSES.len(),
            "record {i} has label {label}"
        );

        ys.push(label as usize);
        for (c, plane) in image.chunks_exact(PLANE_LEN).enumerate() {
            xs.extend(
                plane
                    .iter()
                    .map(|&p| (p as f32 / 255. - MEAN[c]) / STD[c]),
            );
        }
    }

    Ok(())
}

fn load(dir: &Path, files: &[&str]) -> Result<Dataset> {
    let mut xs = Vec::new();
    let mut ys = Vec::new();

    for file in files {
        let path = dir.join(file);
        let bytes = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        parse_records(&bytes, &mut xs, &mut ys)
            .with_context(|| format!("parsing {}", path.display()))?;
    }

    Ok(Dataset::new(IMAGE_SHAPE.to_vec(), xs, ys)?)
}

/// Loads the 50000 training images from the five `data_batch_*.bin` files of `dir`.
pub fn load_train(dir: &Path) -> Result<Dataset> {
    load(dir, &TRAIN_FILES)
}

/// Loads the 10000 test images from the `test_batch.bin` file of `dir`.
pub fn load_test(dir: &Path) -> Result<Dataset> {
    load(dir, &[TEST_FILE])
}
