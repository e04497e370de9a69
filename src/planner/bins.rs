//! Label routing: split one input container into `{root}/{label}/{basename}`.
//!
//! Each input file is an independent unit. Two units can still target the
//! same destination (same label, same basename from different directories),
//! so every destination is opened under its `DestinationLocks` entry.

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::binning::BinningTable;
use crate::container::{Container, ContainerBackend, OpenMode};
use crate::copy::{copy_read, CopyStats};
use crate::error::{RepackError, Result};
use crate::report::WorkResult;

/// One lock per destination path, shared by all workers of a run.
#[derive(Debug, Default)]
pub struct DestinationLocks {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl DestinationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock guarding `path`, created on first request.
    pub fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(path.to_path_buf()).or_default())
    }

    /// Number of distinct destinations seen so far.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Group read ids by label, keeping listing order within a label.
/// Reads without a label are dropped.
pub fn group_by_label<'a>(
    read_ids: &'a [String],
    table: &'a BinningTable,
) -> BTreeMap<&'a str, Vec<&'a str>> {
    let mut binned: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for read_id in read_ids {
        if let Some(label) = table.label(read_id) {
            binned.entry(label).or_default().push(read_id.as_str());
        }
    }
    binned
}

/// `{output_root}/{label}/{basename}`
pub fn destination_path(output_root: &Path, label: &str, basename: &OsStr) -> PathBuf {
    output_root.join(label).join(basename)
}

/// Route every labelled read of `input` into its label's destination.
///
/// Never fails: an unopenable input yields a skipped result, an unopenable
/// destination is counted in `labels_failed`, a failed read in `stats.failed`.
pub fn bin_input<B: ContainerBackend>(
    backend: &B,
    input: &Path,
    table: &BinningTable,
    output_root: &Path,
    locks: &DestinationLocks,
) -> WorkResult {
    let Some(basename) = input.file_name() else {
        log::error!("Failed to copy files from {}: no file name", input.display());
        return WorkResult::skipped(input, "input path has no file name");
    };

    let opened = backend
        .open(input, OpenMode::Read)
        .and_then(|src| src.read_ids().map(|ids| (src, ids)));
    let (mut src, read_ids) = match opened {
        Ok(opened) => opened,
        Err(e) => {
            log::error!("Failed to copy files from {}: {}", input.display(), e);
            return WorkResult::skipped(input, e.to_string());
        }
    };

    let binned = group_by_label(&read_ids, table);
    let mut stats = CopyStats::default();
    let mut outputs = Vec::with_capacity(binned.len());
    let mut labels_failed = 0;

    for (label, ids) in &binned {
        let dest = destination_path(output_root, label, basename);
        match copy_into(backend, &mut src, &dest, ids, locks) {
            Ok(label_stats) => {
                stats.merge(&label_stats);
                outputs.push(dest);
            }
            Err(e) => {
                log::error!("Failed to write to {}: {}", dest.display(), e);
                labels_failed += 1;
            }
        }
    }

    if let Err(e) = src.close() {
        log::warn!("Failed to close input {}: {}", input.display(), e);
    }
    log::debug!(
        "Binned {} of {} reads from {} into {} label(s)",
        stats.attempted(),
        read_ids.len(),
        input.display(),
        binned.len()
    );

    let mut result = WorkResult::completed(input, stats, outputs);
    result.labels_failed = labels_failed;
    result
}

/// Copy `ids` into one destination while holding its lock.
fn copy_into<B: ContainerBackend>(
    backend: &B,
    src: &mut B::Handle,
    dest: &Path,
    ids: &[&str],
    locks: &DestinationLocks,
) -> Result<CopyStats> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| RepackError::io(parent, "create_dir", e))?;
    }

    let lock = locks.lock_for(dest);
    let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

    let mut out = backend.open(dest, OpenMode::Append)?;
    let mut stats = CopyStats::default();
    for read_id in ids {
        stats.record(&copy_read(src, &mut out, read_id));
    }
    out.close()?;
    Ok(stats)
}
