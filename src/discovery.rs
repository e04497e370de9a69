//! Input discovery: turn the `--input_path` argument into an ordered file list.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{RepackError, Result};

/// Container files under `input`.
///
/// A file path is returned as-is, whatever its extension. A directory yields
/// the files whose extension equals `extension`, directly inside it or at any
/// depth when `recursive` is set. The list is sorted so runs are reproducible.
pub fn discover_inputs(input: &Path, recursive: bool, extension: &str) -> Result<Vec<PathBuf>> {
    let metadata = fs::metadata(input).map_err(|e| RepackError::io(input, "stat", e))?;
    if metadata.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();
    for entry in WalkDir::new(input).max_depth(max_depth).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable path during discovery: {}", e);
                continue;
            }
        };
        if entry.file_type().is_file() && entry.path().extension() == Some(OsStr::new(extension))
        {
            files.push(entry.into_path());
        }
    }
    files.sort();

    log::info!(
        "Found {} input file(s) under {}",
        files.len(),
        input.display()
    );
    Ok(files)
}
