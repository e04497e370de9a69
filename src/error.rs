//! Unified error type for the mrepack library.
//!
//! Library code returns `RepackError`; the CLI wraps it in `anyhow::Result`
//! and adds command-level context.
//!
//! # Error Categories
//!
//! - **Io**: File system operations (open, read, write, create_dir)
//! - **Format**: Container file is not a valid record log (magic, truncation)
//! - **MalformedBinningEntry**: A binning line without exactly two tab-separated fields
//! - **Container**: Container API misuse or missing data (unknown read, duplicate read)
//! - **Config**: Invalid run configuration
//! - **Encoding**: Varint decoding errors

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::encoding::VarIntError;

/// Unified error type for the mrepack library.
#[derive(Debug)]
pub enum RepackError {
    /// I/O error with path context.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: std::io::Error,
    },

    /// Invalid container file (magic bytes, version, truncated record).
    Format { path: PathBuf, detail: String },

    /// Binning table line that does not split into read id and label.
    MalformedBinningEntry {
        path: PathBuf,
        line_number: usize,
        line: String,
    },

    /// Container-level failure (missing read, duplicate read, wrong mode).
    Container { path: PathBuf, detail: String },

    /// Invalid run configuration.
    Config(String),

    /// Encoding/decoding error.
    Encoding(String),
}

impl fmt::Display for RepackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepackError::Io {
                path,
                operation,
                source,
            } => {
                write!(
                    f,
                    "I/O error during {} on '{}': {}",
                    operation,
                    path.display(),
                    source
                )
            }
            RepackError::Format { path, detail } => {
                write!(f, "Invalid container '{}': {}", path.display(), detail)
            }
            RepackError::MalformedBinningEntry {
                path,
                line_number,
                line,
            } => {
                write!(
                    f,
                    "Malformed binning entry at {}:{}: expected '<read_id>\\t<label>', got {:?}",
                    path.display(),
                    line_number,
                    line
                )
            }
            RepackError::Container { path, detail } => {
                write!(f, "Container error in '{}': {}", path.display(), detail)
            }
            RepackError::Config(msg) => write!(f, "Configuration error: {}", msg),
            RepackError::Encoding(msg) => write!(f, "Encoding error: {}", msg),
        }
    }
}

impl std::error::Error for RepackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RepackError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RepackError {
    fn from(err: std::io::Error) -> Self {
        RepackError::Io {
            path: PathBuf::new(),
            operation: "unknown",
            source: err,
        }
    }
}

impl From<VarIntError> for RepackError {
    fn from(err: VarIntError) -> Self {
        RepackError::Encoding(err.to_string())
    }
}

/// Convenience type alias for Results using RepackError.
pub type Result<T> = std::result::Result<T, RepackError>;

impl RepackError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, operation: &'static str, source: std::io::Error) -> Self {
        RepackError::Io {
            path: path.into(),
            operation,
            source,
        }
    }

    /// Create a container format error.
    pub fn format(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        RepackError::Format {
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// Create a container API error.
    pub fn container(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        RepackError::Container {
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        RepackError::Config(msg.into())
    }

    /// Create an encoding error.
    pub fn encoding(msg: impl Into<String>) -> Self {
        RepackError::Encoding(msg.into())
    }
}

/// Failure to copy a single read; never aborts the run.
///
/// Carries the read id and destination so the caller can log or count it.
#[derive(Debug)]
pub struct CopyError {
    pub read_id: String,
    pub destination: PathBuf,
    pub source: RepackError,
}

impl CopyError {
    pub fn new(read_id: &str, destination: &Path, source: RepackError) -> Self {
        Self {
            read_id: read_id.to_string(),
            destination: destination.to_path_buf(),
            source,
        }
    }
}

impl fmt::Display for CopyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Failed to add read '{}' to '{}': {}",
            self.read_id,
            self.destination.display(),
            self.source
        )
    }
}

impl std::error::Error for CopyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

// ============================================================================
// Thread-safe error capture
// ============================================================================

/// Thread-safe error capture that stores only the first error.
///
/// Pool workers use this to surface a fatal error (e.g. an output container
/// that cannot be created) after the pool has been joined.
pub struct FirstErrorCapture {
    has_error: AtomicBool,
    error: Mutex<Option<RepackError>>,
}

impl FirstErrorCapture {
    /// Create a new, empty error capture.
    pub fn new() -> Self {
        Self {
            has_error: AtomicBool::new(false),
            error: Mutex::new(None),
        }
    }

    /// Store an error, but only if no error has been stored yet.
    /// Returns true if this error was stored, false if an error already existed.
    pub fn store(&self, err: RepackError) -> bool {
        if self
            .has_error
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            if let Ok(mut guard) = self.error.lock() {
                *guard = Some(err);
            }
            true
        } else {
            false
        }
    }

    /// Take the stored error, if any.
    pub fn take(&self) -> Option<RepackError> {
        if self.has_error.load(Ordering::SeqCst) {
            self.error.lock().ok().and_then(|mut g| g.take())
        } else {
            None
        }
    }

    /// Check if an error has been stored.
    pub fn has_error(&self) -> bool {
        self.has_error.load(Ordering::SeqCst)
    }
}

impl Default for FirstErrorCapture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display() {
        let err = RepackError::io(
            "/data/in/batch_0.fast5",
            "open",
            std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/data/in/batch_0.fast5"));
        assert!(msg.contains("open"));
        assert!(msg.contains("file not found"));
    }

    #[test]
    fn test_malformed_binning_display() {
        let err = RepackError::MalformedBinningEntry {
            path: PathBuf::from("bins.tsv"),
            line_number: 7,
            line: "read_7 A extra".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("bins.tsv:7"));
        assert!(msg.contains("read_7 A extra"));
    }

    #[test]
    fn test_copy_error_carries_context() {
        let err = CopyError::new(
            "read_42",
            Path::new("/out/A/file.fast5"),
            RepackError::container("/in/file.fast5", "read not found"),
        );
        let msg = err.to_string();
        assert!(msg.contains("read_42"));
        assert!(msg.contains("/out/A/file.fast5"));
        assert!(msg.contains("read not found"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_error_source_chain() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "not found");
        let err = RepackError::io("/path", "open", io_err);
        assert!(std::error::Error::source(&err).is_some());
        assert!(std::error::Error::source(&RepackError::config("x")).is_none());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: RepackError = io_err.into();

        match err {
            RepackError::Io { operation, .. } => assert_eq!(operation, "unknown"),
            _ => panic!("Expected Io variant"),
        }
    }

    #[test]
    fn test_first_error_capture_stores_first() {
        let capture = FirstErrorCapture::new();

        assert!(capture.store(RepackError::config("first error")));
        assert!(!capture.store(RepackError::config("second error")));

        let err = capture.take().expect("Should have error");
        assert!(err.to_string().contains("first error"));
    }

    #[test]
    fn test_first_error_capture_empty() {
        let capture = FirstErrorCapture::default();
        assert!(capture.take().is_none());
        assert!(!capture.has_error());
    }
}
