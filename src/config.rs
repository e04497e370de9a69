//! Run configuration.
//!
//! Settings come from an optional TOML run file and from the command line;
//! command-line values win. Relative paths in a run file are resolved against
//! the file's directory.
//!
//! ```toml
//! [run]
//! input = "reads/"
//! save_path = "repacked/"
//! binning_file = "adapters.tsv"   # omit for batch mode
//! filename_base = "batch"
//! batch_size = 4000
//! recursive = true
//! threads = 8
//! extension = "fast5"
//! ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_EXTENSION, DEFAULT_FILENAME_BASE, DEFAULT_THREADS,
};
use crate::error::{RepackError, Result};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub run: RunSettings,
}

/// Every setting optional, so file and CLI values can be layered.
#[derive(Debug, Default, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RunSettings {
    pub input: Option<PathBuf>,
    pub save_path: Option<PathBuf>,
    pub binning_file: Option<PathBuf>,
    pub filename_base: Option<String>,
    pub batch_size: Option<i64>,
    pub recursive: Option<bool>,
    pub threads: Option<usize>,
    pub extension: Option<String>,
}

impl RunSettings {
    /// Values from `over` replace values in `self`.
    pub fn overlay(self, over: RunSettings) -> RunSettings {
        RunSettings {
            input: over.input.or(self.input),
            save_path: over.save_path.or(self.save_path),
            binning_file: over.binning_file.or(self.binning_file),
            filename_base: over.filename_base.or(self.filename_base),
            batch_size: over.batch_size.or(self.batch_size),
            recursive: over.recursive.or(self.recursive),
            threads: over.threads.or(self.threads),
            extension: over.extension.or(self.extension),
        }
    }

    fn resolve_paths(self, base: &Path) -> RunSettings {
        RunSettings {
            input: self.input.map(|p| resolve_path(base, &p)),
            save_path: self.save_path.map(|p| resolve_path(base, &p)),
            binning_file: self.binning_file.map(|p| resolve_path(base, &p)),
            ..self
        }
    }
}

/// Fully resolved configuration for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepackConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Present: label binning. Absent: fixed-size batching.
    pub binning_file: Option<PathBuf>,
    pub filename_base: String,
    pub batch_size: i64,
    pub recursive: bool,
    pub threads: usize,
    pub extension: String,
}

impl RepackConfig {
    /// Batch-mode configuration with every default applied.
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            binning_file: None,
            filename_base: DEFAULT_FILENAME_BASE.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            recursive: false,
            threads: DEFAULT_THREADS,
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    /// Build from layered settings; `input` and `save_path` are required.
    pub fn from_settings(settings: RunSettings) -> Result<Self> {
        let input = settings
            .input
            .ok_or_else(|| RepackError::config("missing input path"))?;
        let output = settings
            .save_path
            .ok_or_else(|| RepackError::config("missing save path"))?;

        let mut config = RepackConfig::new(input, output);
        config.binning_file = settings.binning_file;
        if let Some(base) = settings.filename_base {
            config.filename_base = base;
        }
        if let Some(batch_size) = settings.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(recursive) = settings.recursive {
            config.recursive = recursive;
        }
        if let Some(threads) = settings.threads {
            config.threads = threads;
        }
        if let Some(ext) = settings.extension {
            config.extension = ext.trim_start_matches('.').to_string();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn is_binning(&self) -> bool {
        self.binning_file.is_some()
    }

    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(RepackError::config("threads must be at least 1"));
        }
        if self.filename_base.is_empty() || self.filename_base.contains(['/', '\\']) {
            return Err(RepackError::config(format!(
                "filename base must be a plain file name (got {:?})",
                self.filename_base
            )));
        }
        if self.extension.is_empty() || self.extension.contains(['/', '\\', '.']) {
            return Err(RepackError::config(format!(
                "extension must be non-empty without dots or separators (got {:?})",
                self.extension
            )));
        }
        Ok(())
    }
}

/// Parse a TOML run file, resolving its relative paths against its directory.
pub fn parse_config(path: &Path) -> Result<RunSettings> {
    let contents =
        fs::read_to_string(path).map_err(|e| RepackError::io(path, "read config", e))?;

    let config: ConfigFile = toml::from_str(&contents).map_err(|e| {
        RepackError::config(format!("failed to parse {}: {}", path.display(), e))
    })?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(config.run.resolve_paths(base))
}

pub fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
