//! Run driver: discover inputs, prepare the output root, dispatch to a planner.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::binning::BinningTable;
use crate::config::RepackConfig;
use crate::container::ContainerBackend;
use crate::discovery::discover_inputs;
use crate::error::{RepackError, Result};
use crate::planner::batch::pool_error;
use crate::planner::{
    bin_input, repackage_batches, repackage_batches_parallel, BatchOptions, DestinationLocks,
};
use crate::report::{Progress, RunSummary, WorkResult};

/// Validate `config`, load the binning table if one is configured, and run.
///
/// A malformed binning file fails before any output is touched.
pub fn run<B: ContainerBackend>(
    backend: &B,
    config: &RepackConfig,
    progress: &dyn Progress,
) -> Result<RunSummary> {
    config.validate()?;

    let summary = match &config.binning_file {
        Some(path) => {
            let table = BinningTable::load(path)?;
            log::debug!("Binning into {} distinct label(s)", table.labels().len());
            run_binning(backend, config, &table, progress)?
        }
        None => run_batch(backend, config, progress)?,
    };

    summary.log();
    Ok(summary)
}

/// One `bin_input` unit per input file on a pool of `config.threads` workers.
pub fn run_binning<B: ContainerBackend>(
    backend: &B,
    config: &RepackConfig,
    table: &BinningTable,
    progress: &dyn Progress,
) -> Result<RunSummary> {
    let inputs = prepare(config)?;
    let pool = build_pool(config.threads)?;
    let locks = DestinationLocks::new();

    progress.start(inputs.len());
    let units: Vec<WorkResult> = pool.install(|| {
        inputs
            .par_iter()
            .map(|input| {
                let result = bin_input(backend, input, table, &config.output, &locks);
                if result.is_completed() {
                    log::info!("Completed {}", result.basename());
                }
                progress.advance(&result);
                result
            })
            .collect()
    });
    progress.finish();

    Ok(RunSummary::new(units))
}

/// Fixed-size batching: the sequential cursor for one thread, the
/// precomputed plan otherwise.
pub fn run_batch<B: ContainerBackend>(
    backend: &B,
    config: &RepackConfig,
    progress: &dyn Progress,
) -> Result<RunSummary> {
    let inputs = prepare(config)?;
    let options = BatchOptions::from(config);

    if config.threads <= 1 {
        repackage_batches(backend, &inputs, &options, progress)
    } else {
        let pool = build_pool(config.threads)?;
        repackage_batches_parallel(backend, &inputs, &options, &pool, progress)
    }
}

fn prepare(config: &RepackConfig) -> Result<Vec<PathBuf>> {
    let inputs = discover_inputs(&config.input, config.recursive, &config.extension)?;
    create_output_root(&config.output)?;
    Ok(inputs)
}

fn create_output_root(root: &Path) -> Result<()> {
    fs::create_dir_all(root).map_err(|e| RepackError::io(root, "create_dir", e))
}

fn build_pool(threads: usize) -> Result<ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(pool_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{Group, MemoryBackend};
    use crate::report::NoProgress;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    fn seed_inputs(backend: &MemoryBackend, dir: &Path, files: &[(&str, &[&str])]) {
        for (name, ids) in files {
            let path = dir.join(name);
            fs::write(&path, b"").unwrap();
            for id in *ids {
                backend.insert_read(&path, id, "run", vec![Group::new("Raw", id.as_bytes().to_vec())]);
            }
        }
    }

    #[test]
    fn test_run_batch_uses_config_layout() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let backend = MemoryBackend::new();
        seed_inputs(&backend, input.path(), &[("a.fast5", &["r1", "r2", "r3"])]);

        let mut config = RepackConfig::new(input.path(), output.path().join("out"));
        config.batch_size = 2;
        config.filename_base = "chunk".to_string();
        let summary = run(&backend, &config, &NoProgress).unwrap();

        assert_eq!(summary.totals().copied, 3);
        let root = output.path().join("out");
        assert!(root.is_dir());
        assert_eq!(backend.read_ids(root.join("chunk_0.fast5")).unwrap(), vec!["r1", "r2"]);
        assert_eq!(backend.read_ids(root.join("chunk_1.fast5")).unwrap(), vec!["r3"]);
    }

    #[test]
    fn test_run_binning_reports_every_unit() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let backend = MemoryBackend::new();
        seed_inputs(
            &backend,
            input.path(),
            &[("a.fast5", &["r1", "r2"]), ("b.fast5", &["r3"])],
        );
        let table: BinningTable = [("r1", "A"), ("r3", "A")].into_iter().collect();
        let mut config = RepackConfig::new(input.path(), output.path());
        config.threads = 2;

        let seen = AtomicUsize::new(0);
        let progress = |_: &WorkResult| {
            seen.fetch_add(1, Ordering::SeqCst);
        };
        let summary = run_binning(&backend, &config, &table, &progress).unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(summary.units.len(), 2);
        assert_eq!(summary.totals().copied, 2);
        assert_eq!(
            backend.read_ids(output.path().join("A").join("a.fast5")).unwrap(),
            vec!["r1"]
        );
        assert_eq!(
            backend.read_ids(output.path().join("A").join("b.fast5")).unwrap(),
            vec!["r3"]
        );
    }

    #[test]
    fn test_malformed_binning_file_is_fatal() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let backend = MemoryBackend::new();
        seed_inputs(&backend, input.path(), &[("a.fast5", &["r1"])]);
        let bins = input.path().join("bins.tsv");
        fs::write(&bins, "r1\tA\nbroken line\n").unwrap();

        let mut config = RepackConfig::new(input.path(), output.path().join("out"));
        config.binning_file = Some(bins);
        let err = run(&backend, &config, &NoProgress).unwrap_err();

        assert!(matches!(
            err,
            RepackError::MalformedBinningEntry { line_number: 2, .. }
        ));
        assert!(!output.path().join("out").exists());
        assert_eq!(backend.paths().len(), 1);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = RepackConfig::new("/in", "/out");
        config.threads = 0;
        assert!(matches!(
            run(&MemoryBackend::new(), &config, &NoProgress),
            Err(RepackError::Config(_))
        ));
    }
}
