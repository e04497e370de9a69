//! Constants used throughout the mrepack library: run defaults and the
//! container record-log format definition.

// ============================================================================
// Run Defaults
// ============================================================================

/// Default number of reads per batch output container.
pub const DEFAULT_BATCH_SIZE: i64 = 4000;

/// Default root of batch output file names (`batch_0.fast5`, ...).
pub const DEFAULT_FILENAME_BASE: &str = "batch";

/// Default container file extension, used for discovery and batch outputs.
pub const DEFAULT_EXTENSION: &str = "fast5";

/// Default worker count.
pub const DEFAULT_THREADS: usize = 1;

// ============================================================================
// Container Record Log
// ============================================================================

/// Magic bytes at the start of every container file.
pub(crate) const CONTAINER_MAGIC: &[u8; 4] = b"MRC1";

/// Current container format version.
pub(crate) const CONTAINER_VERSION: u32 = 1;

/// Header length: magic + u32 version.
pub(crate) const CONTAINER_HEADER_LEN: u64 = 8;

/// Record tag: new read (`id`, `run_id`).
pub(crate) const RECORD_READ: u8 = 0x01;

/// Record tag: group payload (`read_id`, `name`, `data`).
pub(crate) const RECORD_GROUP: u8 = 0x02;

/// Buffer size for scanning container files (1MB).
pub(crate) const READ_BUF_SIZE: usize = 1024 * 1024;

/// Upper bound on a single id/name string in a container file.
pub(crate) const MAX_STRING_LENGTH: u64 = 64 * 1024;

/// Pending write buffer size before records are pushed to disk (8MB).
pub(crate) const WRITE_BUF_SIZE: usize = 8 * 1024 * 1024;
