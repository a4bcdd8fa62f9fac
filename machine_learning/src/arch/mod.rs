pub mod activations;
pub mod initialization;
pub mod layers;
pub mod loss;
mod params;
mod sequential;

pub use params::{BackIter, FrontIter, ParamStore};
pub use sequential::Sequential;
