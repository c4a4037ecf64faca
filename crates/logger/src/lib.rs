//! Shared tracing setup for the statewatch binaries.

mod subscriber;

pub use subscriber::{LogFormat, init, try_init};
pub use tracing::level_filters::LevelFilter;
