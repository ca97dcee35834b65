//! Input discovery - walks input directories into a dispatch-ready result.

use std::path::{Path, PathBuf};

use contracts::{DispatcherReadyResult, FileDescriptor};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::CliError;

/// Discover files under `inputs` and attach `urls`
///
/// Directory contents are visited in file-name order so routing input is
/// stable between runs. A plain file is recorded under its parent directory.
pub fn discover(
    inputs: &[PathBuf],
    urls: &[String],
    recursive: bool,
) -> Result<DispatcherReadyResult, CliError> {
    let mut result = DispatcherReadyResult::new();

    for input in inputs {
        if !input.exists() {
            return Err(CliError::input_not_found(input));
        }

        if input.is_file() {
            let root = input.parent().map(Path::to_path_buf).unwrap_or_default();
            match FileDescriptor::from_path(input) {
                Ok(file) => result.add_files(root, vec![file]),
                Err(e) => warn!(path = %input.display(), error = %e, "Cannot read file metadata"),
            }
            continue;
        }

        let files = walk(input, recursive);
        info!(root = %input.display(), files = files.len(), "Discovered files");
        result.add_files(input.clone(), files);
    }

    for url in urls {
        result.add_url(url.clone());
    }

    Ok(result)
}

fn walk(root: &Path, recursive: bool) -> Vec<FileDescriptor> {
    let mut walker = WalkDir::new(root).sort_by_file_name();
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                match FileDescriptor::from_path(entry.path()) {
                    Ok(file) => files.push(file),
                    Err(e) => {
                        warn!(path = %entry.path().display(), error = %e, "Cannot read file metadata")
                    }
                }
            }
            Ok(entry) => debug!(path = %entry.path().display(), "Skipping non-file entry"),
            Err(e) => warn!(error = %e, "Error walking directory"),
        }
    }
    files
}
