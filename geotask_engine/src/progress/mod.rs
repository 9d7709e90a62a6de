mod factory;
mod handle;
mod types;

pub use factory::ProgressFactory;
pub use handle::ProgressHandle;
pub use types::{ProgressId, ProgressState};
