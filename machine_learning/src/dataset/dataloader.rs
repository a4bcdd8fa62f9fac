use std::{num::NonZeroUsize, sync::Arc};

use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use super::{Batch, BatchSource, Dataset};
use crate::{MlErr, Result};

/// A restartable batch iterator over a subset of a shared dataset.
///
/// Batches are copied out of the dataset in the order of `indices`, the last one may be short.
/// When shuffling is enabled the order is reshuffled on every `reset`.
#[derive(Debug, Clone)]
pub struct DataLoader {
    dataset: Arc<Dataset>,
    indices: Vec<usize>,
    batch_size: NonZeroUsize,
    shuffle: Option<StdRng>,
    cursor: usize,
}

impl DataLoader {
    /// Creates a new `DataLoader` over every sample of `dataset`, in order.
    pub fn new(dataset: Arc<Dataset>, batch_size: NonZeroUsize) -> Self {
        let indices = (0..dataset.len()).collect();

        Self {
            dataset,
            indices,
            batch_size,
            shuffle: None,
            cursor: 0,
        }
    }

    /// Creates a new `DataLoader` over the given subset of `dataset`.
    ///
    /// # Arguments
    /// * `dataset` - The shared dataset.
    /// * `indices` - The samples this loader yields, e.g. one part of `random_split`.
    /// * `batch_size` - The maximum amount of samples per batch.
    ///
    /// # Returns
    /// An error if an index is out of bounds.
    pub fn with_indices(
        dataset: Arc<Dataset>,
        indices: Vec<usize>,
        batch_size: NonZeroUsize,
    ) -> Result<Self> {
        if let Some(&idx) = indices.iter().find(|&&idx| idx >= dataset.len()) {
            return Err(MlErr::SizeMismatch {
                what: "dataset index",
                got: idx,
                expected: dataset.len(),
            });
        }

        Ok(Self {
            dataset,
            indices,
            batch_size,
            shuffle: None,
            cursor: 0,
        })
    }

    /// Enables reshuffling the samples on every reset, seeded for reproducibility.
    pub fn shuffled(mut self, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        self.indices.shuffle(&mut rng);
        self.shuffle = Some(rng);
        self.cursor = 0;
        self
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch_size.get()
    }

    #[inline]
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }
}

impl BatchSource for DataLoader {
    fn reset(&mut self) {
        if let Some(rng) = &mut self.shuffle {
            self.indices.shuffle(rng);
        }

        self.cursor = 0;
    }

    fn next_batch(&mut self) -> Result<Option<Batch>> {
        if self.cursor >= self.indices.len() {
            return Ok(None);
        }

        let end = (self.cursor + self.batch_size.get()).min(self.indices.len());
        let batch = self.dataset.gather(&self.indices[self.cursor..end])?;

        self.cursor = end;
        Ok(Some(batch))
    }

    fn num_batches(&self) -> usize {
        self.indices.len().div_ceil(self.batch_size.get())
    }
}
