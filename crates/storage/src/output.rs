use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Creates the backup output directory and any missing parents.
pub fn ensure_output_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("create output directory: {}", dir.display()))
}
