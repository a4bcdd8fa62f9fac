mod history;
mod small_batch;
mod step;
mod trainer;

pub use history::LossHistory;
pub use small_batch::train_small;
pub use step::{batch_loss, fit_batch};
pub use trainer::train;
