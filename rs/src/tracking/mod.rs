pub mod filter;
pub mod progress;

pub use filter::PositionFilter;
pub use progress::{Progress, ProgressTracker};
