//! Copy a single read between containers.
//!
//! A copy is idempotent (a read already in the destination is left alone) but
//! not atomic: groups written before a mid-copy failure stay in the
//! destination.

use crate::container::Container;
use crate::error::CopyError;

/// What `copy_read` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    /// The read was written with this many groups.
    Copied { groups: usize },
    /// The destination already held the read; nothing was written.
    AlreadyPresent,
}

/// Copy `read_id` from `src` into `dest`.
///
/// Failures are logged with the read id and destination path and returned as
/// a `CopyError`; callers count them and move on to the next read.
pub fn copy_read<S, D>(src: &mut S, dest: &mut D, read_id: &str) -> Result<CopyOutcome, CopyError>
where
    S: Container + ?Sized,
    D: Container + ?Sized,
{
    if dest.contains_read(read_id) {
        log::debug!(
            "Read '{}' already present in {}, skipping",
            read_id,
            dest.path().display()
        );
        return Ok(CopyOutcome::AlreadyPresent);
    }

    let result = src.get_read(read_id).and_then(|read| {
        dest.create_read(read_id, &read.run_id)?;
        for group in &read.groups {
            dest.copy_group(read_id, group)?;
        }
        Ok(read.groups.len())
    });

    match result {
        Ok(groups) => Ok(CopyOutcome::Copied { groups }),
        Err(source) => {
            let err = CopyError::new(read_id, dest.path(), source);
            log::error!("{}", err);
            Err(err)
        }
    }
}

/// Per-read counters accumulated by the planners.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CopyStats {
    pub copied: usize,
    pub already_present: usize,
    pub failed: usize,
}

impl CopyStats {
    /// Record the outcome of one `copy_read` call.
    pub fn record(&mut self, outcome: &Result<CopyOutcome, CopyError>) {
        match outcome {
            Ok(CopyOutcome::Copied { .. }) => self.copied += 1,
            Ok(CopyOutcome::AlreadyPresent) => self.already_present += 1,
            Err(_) => self.failed += 1,
        }
    }

    /// Reads attempted, whatever the outcome.
    pub fn attempted(&self) -> usize {
        self.copied + self.already_present + self.failed
    }

    pub fn merge(&mut self, other: &CopyStats) {
        self.copied += other.copied;
        self.already_present += other.already_present;
        self.failed += other.failed;
    }
}
