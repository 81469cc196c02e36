pub mod config;
pub mod logging;
pub mod scheduler;

pub use scheduler::{CycleReport, Scheduler};
