use machine_learning::{evaluation::Evaluation, training::LossHistory, Device};
use serde::Serialize;

use crate::config::ModelKind;

/// The outcome of the single batch sanity check.
#[derive(Debug, Clone, Serialize)]
pub struct SanityCheck {
    pub history: LossHistory,
    pub train_accuracy: f32,
}

/// Everything a run produced, in the shape written as JSON for plotting.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub model: ModelKind,
    pub device: Device,
    pub parameters: usize,
    pub sanity_check: Option<SanityCheck>,
    pub history: LossHistory,
    pub evaluation: Evaluation,
}
