//! Per-unit results and run summaries.
//!
//! A `WorkResult` describes one unit of work: an input file in binning and
//! sequential batch mode, an output container when a batch plan runs on the
//! pool. Results feed progress reporting and the final summary; no planner
//! reads another unit's result.

use std::path::{Path, PathBuf};

use crate::copy::CopyStats;

/// Whether a unit ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkStatus {
    Completed,
    /// The unit contributed nothing (e.g. its input could not be opened).
    Skipped { reason: String },
}

/// Outcome of one unit of work.
#[derive(Debug, Clone)]
pub struct WorkResult {
    /// Input file, or output container for planned batches.
    pub path: PathBuf,
    pub status: WorkStatus,
    pub stats: CopyStats,
    /// Destinations that could not be opened or closed (binning mode).
    pub labels_failed: usize,
    /// Output containers this unit wrote to.
    pub outputs: Vec<PathBuf>,
}

impl WorkResult {
    pub fn completed(path: &Path, stats: CopyStats, outputs: Vec<PathBuf>) -> Self {
        Self {
            path: path.to_path_buf(),
            status: WorkStatus::Completed,
            stats,
            labels_failed: 0,
            outputs,
        }
    }

    pub fn skipped(path: &Path, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            status: WorkStatus::Skipped {
                reason: reason.into(),
            },
            stats: CopyStats::default(),
            labels_failed: 0,
            outputs: Vec::new(),
        }
    }

    /// File name of `path`, for progress lines.
    pub fn basename(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn is_completed(&self) -> bool {
        self.status == WorkStatus::Completed
    }
}

/// Aggregate of every unit of a run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub units: Vec<WorkResult>,
}

impl RunSummary {
    pub fn new(units: Vec<WorkResult>) -> Self {
        Self { units }
    }

    pub fn totals(&self) -> CopyStats {
        let mut totals = CopyStats::default();
        for unit in &self.units {
            totals.merge(&unit.stats);
        }
        totals
    }

    pub fn units_skipped(&self) -> usize {
        self.units.iter().filter(|u| !u.is_completed()).count()
    }

    pub fn labels_failed(&self) -> usize {
        self.units.iter().map(|u| u.labels_failed).sum()
    }

    /// Every output container written, sorted and deduplicated.
    pub fn outputs(&self) -> Vec<PathBuf> {
        let mut outputs: Vec<PathBuf> = self
            .units
            .iter()
            .flat_map(|u| u.outputs.iter().cloned())
            .collect();
        outputs.sort();
        outputs.dedup();
        outputs
    }

    /// Whether every unit completed and every read was written or already present.
    pub fn is_clean(&self) -> bool {
        self.units_skipped() == 0 && self.labels_failed() == 0 && self.totals().failed == 0
    }

    pub fn log(&self) {
        let totals = self.totals();
        log::info!(
            "Processed {} unit(s): {} reads copied, {} already present, {} outputs written",
            self.units.len(),
            totals.copied,
            totals.already_present,
            self.outputs().len()
        );
        if !self.is_clean() {
            log::warn!(
                "Run finished with failures: {} unit(s) skipped, {} destination(s) failed, {} read(s) failed",
                self.units_skipped(),
                self.labels_failed(),
                totals.failed
            );
        }
    }
}

/// Progress sink advanced once per completed unit.
///
/// Called from worker threads in parallel modes.
pub trait Progress: Sync {
    /// Number of units the run will report.
    fn start(&self, _units: usize) {}

    fn advance(&self, result: &WorkResult);

    fn finish(&self) {}
}

impl<F> Progress for F
where
    F: Fn(&WorkResult) + Sync,
{
    fn advance(&self, result: &WorkResult) {
        self(result)
    }
}

/// Progress sink that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn advance(&self, _result: &WorkResult) {}
}
