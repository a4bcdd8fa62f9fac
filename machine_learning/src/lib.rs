pub mod arch;
pub mod context;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod metrics;
pub mod models;
pub mod optimization;
pub mod training;

pub use context::{Context, Device};
pub use error::{MlErr, Result};
