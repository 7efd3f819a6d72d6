//! ferrobind-agent — Pipeline orchestration and configuration for the `ferrobind` binary.

pub mod config;
pub mod pipeline;

pub use config::Config;
pub use pipeline::{Pipeline, RunOutcome};
