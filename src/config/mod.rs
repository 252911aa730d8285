//! Configuration for group stages.

mod parallel;

pub use parallel::{GroupConfig, MAX_LIMIT};
