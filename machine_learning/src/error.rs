use std::{
    error::Error,
    fmt::{self, Display},
};

use ndarray::ShapeError;

use crate::context::Device;

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    Shape(ShapeError),
    LabelOutOfRange {
        label: usize,
        num_classes: usize,
    },
    OptimizerNotConfigured,
    MissingForwardCache {
        layer: &'static str,
    },
    DeviceMismatch {
        model: Device,
        context: Device,
    },
    EmptyBatches {
        what: &'static str,
    },
    InvalidConfig(String),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => format!("There's a size mismatch in {what}, got {got} and expected {expected}"),
            MlErr::Shape(e) => format!("Tensor shape is incompatible with the layer: {e}"),
            MlErr::LabelOutOfRange { label, num_classes } => {
                format!("Label {label} is out of range for {num_classes} classes")
            }
            MlErr::OptimizerNotConfigured => {
                "Tried to take an optimizer step before configuring the optimizer".to_string()
            }
            MlErr::MissingForwardCache { layer } => format!(
                "The {layer} layer has no cached activations, backward requires a gradient tracking forward pass"
            ),
            MlErr::DeviceMismatch { model, context } => {
                format!("The model lives on {model} but the context targets {context}")
            }
            MlErr::EmptyBatches { what } => format!("There were no {what} to process"),
            MlErr::InvalidConfig(msg) => format!("Invalid configuration: {msg}"),
        };

        write!(f, "{s}")
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Shape(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ShapeError> for MlErr {
    fn from(value: ShapeError) -> Self {
        Self::Shape(value)
    }
}
