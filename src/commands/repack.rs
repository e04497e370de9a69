//! `mrepack repack`: resolve configuration and drive a run with a progress bar.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use mrepack::{parse_config, FileBackend, Progress, RepackConfig, RunSettings, RunSummary, WorkResult};

use super::args::RepackArgs;

/// Progress sink backed by an `indicatif` bar, one tick per finished unit.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new(hidden: bool) -> Self {
        let bar = if hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(0)
        };
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {wide_bar} {pos}/{len} {msg}",
        ) {
            bar.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
        }
        Self { bar }
    }
}

impl Progress for BarProgress {
    fn start(&self, units: usize) {
        self.bar.set_length(units as u64);
    }

    fn advance(&self, result: &WorkResult) {
        self.bar.set_message(result.basename());
        self.bar.inc(1);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// Layer defaults, the optional run file and the flags into one config.
pub fn resolve_config(args: &RepackArgs) -> Result<RepackConfig> {
    let file_settings = match &args.config {
        Some(path) => parse_config(path)
            .with_context(|| format!("Failed to load run file {}", path.display()))?,
        None => RunSettings::default(),
    };
    let settings = file_settings.overlay(args.settings());
    RepackConfig::from_settings(settings).context("Invalid repack configuration")
}

pub fn run_repack(args: &RepackArgs, quiet: bool) -> Result<RunSummary> {
    let config = resolve_config(args)?;
    log::info!(
        "Repacking {} into {} ({} mode, {} thread(s))",
        config.input.display(),
        config.output.display(),
        if config.is_binning() { "binning" } else { "batch" },
        config.threads
    );

    let progress = BarProgress::new(quiet);
    let summary = mrepack::run(&FileBackend, &config, &progress)
        .with_context(|| format!("Repack of {} failed", config.input.display()))?;

    let totals = summary.totals();
    eprintln!(
        "Copied {} read(s) into {} output file(s); {} already present, {} failed",
        totals.copied,
        summary.outputs().len(),
        totals.already_present,
        totals.failed
    );
    Ok(summary)
}
