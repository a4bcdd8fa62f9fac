mod classifier;
mod conv_net;
mod fully_connected;

pub use classifier::{Classifier, Network, argmax_rows};
pub use conv_net::ConvNet;
pub use fully_connected::{FullyConnected, FullyConnectedConfig};
