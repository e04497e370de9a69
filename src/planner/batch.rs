//! Fixed-size batching: pack reads into `{base}_{index}.{ext}` outputs.
//!
//! Two executions of the same policy:
//! - `repackage_batches`: one control loop, one `BatchCursor`, inputs and
//!   read ids in listing order.
//! - `plan_batches` + `repackage_batches_parallel`: list everything up front,
//!   cut the global read sequence into batch-sized assignments, then write
//!   each output on its own worker. Same file names and read → output mapping
//!   as the sequential loop, no shared cursor.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rayon::ThreadPool;

use crate::config::RepackConfig;
use crate::container::{Container, ContainerBackend, OpenMode};
use crate::copy::{copy_read, CopyStats};
use crate::error::{FirstErrorCapture, RepackError, Result};
use crate::report::{Progress, RunSummary, WorkResult};

/// Where and how big batch outputs are.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub output_root: PathBuf,
    pub filename_base: String,
    pub extension: String,
    /// Reads per output; `<= 0` means a single unbounded output.
    pub batch_size: i64,
}

impl BatchOptions {
    /// `{output_root}/{filename_base}_{index}.{extension}`
    pub fn output_path(&self, index: usize) -> PathBuf {
        self.output_root.join(format!(
            "{}_{}.{}",
            self.filename_base, index, self.extension
        ))
    }

    /// Batch limit, `None` when unbounded.
    pub fn limit(&self) -> Option<usize> {
        if self.batch_size > 0 {
            Some(self.batch_size as usize)
        } else {
            None
        }
    }
}

impl From<&RepackConfig> for BatchOptions {
    fn from(config: &RepackConfig) -> Self {
        Self {
            output_root: config.output.clone(),
            filename_base: config.filename_base.clone(),
            extension: config.extension.clone(),
            batch_size: config.batch_size,
        }
    }
}

/// Position in the output sequence. Only ever moves forward.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchCursor {
    pub output_index: usize,
    pub reads_in_output: usize,
}

impl BatchCursor {
    /// Place one read, rolling over first if the current output is full.
    ///
    /// Returns true when a rollover happened.
    pub fn place(&mut self, limit: Option<usize>) -> bool {
        let rolled = matches!(limit, Some(l) if self.reads_in_output >= l);
        if rolled {
            self.output_index += 1;
            self.reads_in_output = 0;
        }
        self.reads_in_output += 1;
        rolled
    }
}

/// The single open batch output. Closed on rollover, at the end of the run, or on drop.
struct BatchWriter<'a, B: ContainerBackend> {
    backend: &'a B,
    options: &'a BatchOptions,
    handle: Option<B::Handle>,
}

impl<'a, B: ContainerBackend> BatchWriter<'a, B> {
    fn new(backend: &'a B, options: &'a BatchOptions) -> Self {
        Self {
            backend,
            options,
            handle: None,
        }
    }

    /// Handle for output `index`, opened on first use.
    ///
    /// Returns the handle and, when it was just opened, its path.
    fn current(&mut self, index: usize) -> Result<(&mut B::Handle, Option<PathBuf>)> {
        let (handle, opened) = match self.handle.take() {
            Some(handle) => (handle, None),
            None => {
                let path = self.options.output_path(index);
                let handle = self.backend.open(&path, OpenMode::Append)?;
                log::info!("Writing batch output {}", path.display());
                (handle, Some(path))
            }
        };
        Ok((self.handle.insert(handle), opened))
    }

    /// Close the open output, if any, and report the failure.
    fn finish_current(&mut self) -> Result<()> {
        match self.handle.take() {
            Some(mut handle) => handle.close(),
            None => Ok(()),
        }
    }

    fn close_current(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            if let Err(e) = handle.close() {
                log::error!(
                    "Failed to close batch output {}: {}",
                    handle.path().display(),
                    e
                );
            }
        }
    }
}

impl<B: ContainerBackend> Drop for BatchWriter<'_, B> {
    fn drop(&mut self) {
        self.close_current();
    }
}

/// Open an input and list its reads; logs and returns the error on failure.
fn open_input<B: ContainerBackend>(backend: &B, input: &Path) -> Result<(B::Handle, Vec<String>)> {
    let listed = backend
        .open(input, OpenMode::Read)
        .and_then(|src| src.read_ids().map(|ids| (src, ids)));
    if let Err(e) = &listed {
        log::error!("Failed to copy files from {}: {}", input.display(), e);
    }
    listed
}

fn close_input<C: Container>(mut src: C) {
    if let Err(e) = src.close() {
        log::warn!("Failed to close input {}: {}", src.path().display(), e);
    }
}

/// Sequential fixed-size batching over `inputs` in order.
///
/// Progress advances once per input file. An input that cannot be opened is
/// skipped; an output that cannot be created or closed aborts the run.
pub fn repackage_batches<B: ContainerBackend>(
    backend: &B,
    inputs: &[PathBuf],
    options: &BatchOptions,
    progress: &dyn Progress,
) -> Result<RunSummary> {
    let limit = options.limit();
    let mut cursor = BatchCursor::default();
    let mut writer = BatchWriter::new(backend, options);
    let mut units = Vec::with_capacity(inputs.len());

    progress.start(inputs.len());
    for input in inputs {
        let result = match open_input(backend, input) {
            Err(e) => WorkResult::skipped(input, e.to_string()),
            Ok((mut src, read_ids)) => {
                let mut stats = CopyStats::default();
                let mut outputs = Vec::new();
                for read_id in &read_ids {
                    if cursor.place(limit) {
                        writer.finish_current()?;
                    }
                    let (dest, opened) = writer.current(cursor.output_index)?;
                    stats.record(&copy_read(&mut src, dest, read_id));
                    outputs.extend(opened);
                }
                close_input(src);
                WorkResult::completed(input, stats, outputs)
            }
        };
        progress.advance(&result);
        units.push(result);
    }
    writer.finish_current()?;
    progress.finish();

    Ok(RunSummary::new(units))
}

// ============================================================================
// Partitioned execution
// ============================================================================

/// Contiguous run of reads taken from one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSlice {
    pub input: PathBuf,
    pub read_ids: Vec<String>,
}

/// Everything that goes into one batch output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchAssignment {
    pub output_index: usize,
    pub sources: Vec<SourceSlice>,
}

impl BatchAssignment {
    pub fn read_count(&self) -> usize {
        self.sources.iter().map(|s| s.read_ids.len()).sum()
    }
}

/// Read → output assignment for a whole run, computed before any write.
#[derive(Debug, Default)]
pub struct BatchPlan {
    pub assignments: Vec<BatchAssignment>,
    /// Inputs that could not be listed.
    pub skipped: Vec<WorkResult>,
}

/// List every input and assign its reads to outputs with the same cursor
/// rules as the sequential loop.
pub fn plan_batches<B: ContainerBackend>(
    backend: &B,
    inputs: &[PathBuf],
    limit: Option<usize>,
) -> BatchPlan {
    let mut plan = BatchPlan::default();
    let mut cursor = BatchCursor::default();

    for input in inputs {
        let read_ids = match open_input(backend, input) {
            Ok((src, read_ids)) => {
                close_input(src);
                read_ids
            }
            Err(e) => {
                plan.skipped.push(WorkResult::skipped(input, e.to_string()));
                continue;
            }
        };

        for read_id in read_ids {
            cursor.place(limit);
            if plan.assignments.len() <= cursor.output_index {
                plan.assignments.push(BatchAssignment {
                    output_index: cursor.output_index,
                    sources: Vec::new(),
                });
            }
            let sources = &mut plan.assignments[cursor.output_index].sources;
            match sources.last_mut() {
                Some(slice) if slice.input == *input => slice.read_ids.push(read_id),
                _ => sources.push(SourceSlice {
                    input: input.clone(),
                    read_ids: vec![read_id],
                }),
            }
        }
    }

    log::info!(
        "Planned {} batch output(s) from {} input file(s)",
        plan.assignments.len(),
        inputs.len() - plan.skipped.len()
    );
    plan
}

/// Write one planned output. Only an output that cannot be created is an error.
pub fn execute_assignment<B: ContainerBackend>(
    backend: &B,
    assignment: &BatchAssignment,
    options: &BatchOptions,
) -> Result<WorkResult> {
    let output = options.output_path(assignment.output_index);
    let mut dest = backend.open(&output, OpenMode::Append)?;
    let mut stats = CopyStats::default();

    for slice in &assignment.sources {
        match backend.open(&slice.input, OpenMode::Read) {
            Ok(mut src) => {
                for read_id in &slice.read_ids {
                    stats.record(&copy_read(&mut src, &mut dest, read_id));
                }
                close_input(src);
            }
            Err(e) => {
                log::error!(
                    "Failed to copy {} read(s) from {} into {}: {}",
                    slice.read_ids.len(),
                    slice.input.display(),
                    output.display(),
                    e
                );
                stats.failed += slice.read_ids.len();
            }
        }
    }

    dest.close()?;
    Ok(WorkResult::completed(&output, stats, vec![output.clone()]))
}

/// Plan, then write every batch output in parallel on `pool`.
///
/// Progress advances once per output container.
pub fn repackage_batches_parallel<B: ContainerBackend>(
    backend: &B,
    inputs: &[PathBuf],
    options: &BatchOptions,
    pool: &ThreadPool,
    progress: &dyn Progress,
) -> Result<RunSummary> {
    let plan = plan_batches(backend, inputs, options.limit());
    let failure = FirstErrorCapture::new();

    progress.start(plan.assignments.len());
    let written: Vec<WorkResult> = pool.install(|| {
        plan.assignments
            .par_iter()
            .filter_map(|assignment| {
                if failure.has_error() {
                    return None;
                }
                match execute_assignment(backend, assignment, options) {
                    Ok(result) => {
                        progress.advance(&result);
                        Some(result)
                    }
                    Err(e) => {
                        failure.store(e);
                        None
                    }
                }
            })
            .collect()
    });
    progress.finish();

    if let Some(e) = failure.take() {
        return Err(e);
    }
    let mut units = plan.skipped;
    units.extend(written);
    Ok(RunSummary::new(units))
}

/// Map the pool build error into the library error type.
pub(crate) fn pool_error(e: rayon::ThreadPoolBuildError) -> RepackError {
    RepackError::config(format!("failed to build worker pool: {}", e))
}
