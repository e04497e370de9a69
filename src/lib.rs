//! mrepack: redistribute reads held in multi-read container files.
//!
//! Two policies over the same copy primitive:
//! - batching packs reads into `{base}_{n}.{ext}` outputs of a fixed size;
//! - binning routes each read to `{label}/{basename}` according to a
//!   `read_id<TAB>label` table.
//!
//! Container storage sits behind [`ContainerBackend`]; [`FileBackend`] is the
//! on-disk implementation, [`MemoryBackend`] an in-process one.

pub mod binning;
pub mod config;
pub mod constants;
pub mod container;
pub mod copy;
pub mod discovery;
mod encoding;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod planner;
pub mod report;

pub use binning::BinningTable;
pub use config::{parse_config, RepackConfig, RunSettings};
pub use container::{
    Container, ContainerBackend, FileBackend, FileContainer, Group, MemoryBackend,
    MemoryContainer, OpenMode, ReadRecord,
};
pub use copy::{copy_read, CopyOutcome, CopyStats};
pub use discovery::discover_inputs;
pub use error::{CopyError, RepackError, Result};
pub use orchestrator::{run, run_batch, run_binning};
pub use planner::{
    bin_input, plan_batches, repackage_batches, repackage_batches_parallel, BatchOptions,
    BatchPlan, DestinationLocks,
};
pub use report::{NoProgress, Progress, RunSummary, WorkResult, WorkStatus};
