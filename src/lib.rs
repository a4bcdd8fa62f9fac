pub mod cifar;
pub mod config;
pub mod experiment;
pub mod summary;
