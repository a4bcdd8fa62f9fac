use serde::Serialize;

/// The training and validation losses of a run, one entry per iteration or epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LossHistory {
    pub train: Vec<f32>,
    pub val: Vec<f32>,
}

impl LossHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            train: Vec::with_capacity(capacity),
            val: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, train_loss: f32, val_loss: f32) {
        self.train.push(train_loss);
        self.val.push(val_loss);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.train.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.train.is_empty()
    }

    /// The latest training and validation losses.
    pub fn last(&self) -> Option<(f32, f32)> {
        Some((*self.train.last()?, *self.val.last()?))
    }
}
