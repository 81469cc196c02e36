mod output;
mod retention;

pub use output::ensure_output_dir;
pub use retention::{retention_cutoff, sweep_expired, SweepReport};
