//! Output module for reporting acquisition progress

pub mod stats;

pub use stats::{load_statistics, print_statistics, run_duration_seconds, HarvestStatistics};
