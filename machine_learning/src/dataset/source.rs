use super::Batch;
use crate::Result;

/// A finite batch iterator that can be restarted.
///
/// Trainers call `reset` at the start of every epoch and then drain the source with `next_batch`.
pub trait BatchSource {
    /// Rewinds the source to its first batch.
    fn reset(&mut self);

    /// Yields the next batch, or `None` once the source is exhausted.
    fn next_batch(&mut self) -> Result<Option<Batch>>;

    /// The amount of batches a full pass yields.
    fn num_batches(&self) -> usize;
}

/// A fixed sequence of already materialized batches.
#[derive(Debug, Clone, Default)]
pub struct BatchList {
    batches: Vec<Batch>,
    cursor: usize,
}

impl BatchList {
    pub fn new(batches: Vec<Batch>) -> Self {
        Self { batches, cursor: 0 }
    }
}

impl From<Vec<Batch>> for BatchList {
    fn from(batches: Vec<Batch>) -> Self {
        Self::new(batches)
    }
}

impl BatchSource for BatchList {
    fn reset(&mut self) {
        self.cursor = 0;
    }

    fn next_batch(&mut self) -> Result<Option<Batch>> {
        let batch = self.batches.get(self.cursor).cloned();
        self.cursor += usize::from(batch.is_some());
        Ok(batch)
    }

    fn num_batches(&self) -> usize {
        self.batches.len()
    }
}
