mod dataloader;
mod dataset;
mod source;
mod split;

pub use dataloader::DataLoader;
pub use dataset::{Batch, Dataset};
pub use source::{BatchList, BatchSource};
pub use split::random_split;
