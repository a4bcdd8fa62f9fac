mod batch_norm;
mod conv;
mod dense;
mod flatten;
mod layer;
mod max_pool;

pub use batch_norm::BatchNorm2d;
pub use conv::{Conv2d, ConvSpec};
pub use dense::Dense;
pub use flatten::Flatten;
pub use layer::Layer;
pub use max_pool::MaxPool2d;
