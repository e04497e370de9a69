//! Container access: the capability the repackaging engine consumes.
//!
//! A container is a path-addressed store of reads. Each read has a `run_id`
//! and a set of named, opaque groups. The engine only ever talks to a
//! `ContainerBackend` (to open handles) and to the `Container` handles it
//! returns, so planners can be exercised against `MemoryBackend` as easily as
//! against real files.
//!
//! Two backends are provided:
//! - [`FileBackend`]: single-file append-only record log (`MRC1`)
//! - [`MemoryBackend`]: shared in-memory store with failure injection

use std::path::Path;

use crate::error::Result;

pub mod file;
pub mod memory;

pub use file::{FileBackend, FileContainer};
pub use memory::{MemoryBackend, MemoryContainer};

/// How a container is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Existing container, read-only.
    Read,
    /// Create the container if absent, otherwise append to it.
    Append,
}

/// One named data group of a read. The payload is never interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    pub data: Vec<u8>,
}

impl Group {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// A read as fetched from a source container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRecord {
    pub run_id: String,
    pub groups: Vec<Group>,
}

/// An open container handle.
///
/// Handles are owned by whoever opened them and must be closed by that owner.
pub trait Container {
    /// Path this handle was opened from.
    fn path(&self) -> &Path;

    /// Read ids in listing order.
    fn read_ids(&self) -> Result<Vec<String>>;

    /// Whether `read_id` is already stored in this container.
    fn contains_read(&self, read_id: &str) -> bool;

    /// Fetch a read's run id and all of its groups.
    fn get_read(&mut self, read_id: &str) -> Result<ReadRecord>;

    /// Create an empty read entry. Fails if the id already exists.
    fn create_read(&mut self, read_id: &str, run_id: &str) -> Result<()>;

    /// Copy one group verbatim into an existing read.
    fn copy_group(&mut self, read_id: &str, group: &Group) -> Result<()>;

    /// Flush pending writes and release the handle. Calling twice is a no-op.
    fn close(&mut self) -> Result<()>;
}

/// Opens container handles. Shared by every worker of a run.
pub trait ContainerBackend: Send + Sync {
    type Handle: Container;

    fn open(&self, path: &Path, mode: OpenMode) -> Result<Self::Handle>;
}
