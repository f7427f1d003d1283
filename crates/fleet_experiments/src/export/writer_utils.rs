use std::fs::File;
use std::path::Path;

use crate::error::{ExperimentError, ExperimentResult};

pub(crate) fn ensure_not_empty<T>(items: &[T]) -> ExperimentResult<()> {
    if items.is_empty() {
        return Err(ExperimentError::Export("no results to export".into()));
    }
    Ok(())
}

/// Creates the file, and any missing parent directories.
pub(crate) fn create_output_file(path: impl AsRef<Path>) -> ExperimentResult<File> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(File::create(path)?)
}
