//! In-memory container backend.
//!
//! All containers live in one shared store keyed by path. A handle works on
//! its own snapshot of the container and commits it back on `close` (or on
//! drop), the same visibility a file gives to a second opener after the first
//! one flushed. Tests seed inputs with [`MemoryBackend::insert_read`] and
//! inject failures with [`MemoryBackend::corrupt_container`],
//! [`MemoryBackend::corrupt_read`] and [`MemoryBackend::corrupt_group`].

use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Container, ContainerBackend, Group, OpenMode, ReadRecord};
use crate::error::{RepackError, Result};

#[derive(Debug, Default, Clone)]
struct StoredContainer {
    order: Vec<String>,
    reads: HashMap<String, ReadRecord>,
}

#[derive(Debug, Default)]
struct MemoryStore {
    containers: HashMap<PathBuf, StoredContainer>,
    corrupt_containers: HashSet<PathBuf>,
    corrupt_reads: HashSet<(PathBuf, String)>,
    corrupt_groups: HashSet<(PathBuf, String, String)>,
}

/// Shared in-memory store of containers. Cloning shares the store.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    store: Arc<Mutex<MemoryStore>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a read to a container, creating the container if needed.
    pub fn insert_read(
        &self,
        path: impl AsRef<Path>,
        read_id: &str,
        run_id: &str,
        groups: Vec<Group>,
    ) {
        let mut store = self.lock();
        let container = store
            .containers
            .entry(path.as_ref().to_path_buf())
            .or_default();
        if !container.reads.contains_key(read_id) {
            container.order.push(read_id.to_string());
        }
        container.reads.insert(
            read_id.to_string(),
            ReadRecord {
                run_id: run_id.to_string(),
                groups,
            },
        );
    }

    /// Make every subsequent `open` of `path` fail.
    pub fn corrupt_container(&self, path: impl AsRef<Path>) {
        self.lock()
            .corrupt_containers
            .insert(path.as_ref().to_path_buf());
    }

    /// Make `get_read` fail for one read of `path`.
    pub fn corrupt_read(&self, path: impl AsRef<Path>, read_id: &str) {
        self.lock()
            .corrupt_reads
            .insert((path.as_ref().to_path_buf(), read_id.to_string()));
    }

    /// Make `copy_group` fail when writing `group_name` of `read_id` into `path`.
    pub fn corrupt_group(&self, path: impl AsRef<Path>, read_id: &str, group_name: &str) {
        self.lock().corrupt_groups.insert((
            path.as_ref().to_path_buf(),
            read_id.to_string(),
            group_name.to_string(),
        ));
    }

    /// Whether a container exists at `path`.
    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.lock().containers.contains_key(path.as_ref())
    }

    /// All container paths, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.lock().containers.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Read ids of a container in listing order.
    pub fn read_ids(&self, path: impl AsRef<Path>) -> Option<Vec<String>> {
        self.lock()
            .containers
            .get(path.as_ref())
            .map(|c| c.order.clone())
    }

    /// A stored read.
    pub fn read(&self, path: impl AsRef<Path>, read_id: &str) -> Option<ReadRecord> {
        self.lock()
            .containers
            .get(path.as_ref())
            .and_then(|c| c.reads.get(read_id).cloned())
    }
}

impl ContainerBackend for MemoryBackend {
    type Handle = MemoryContainer;

    fn open(&self, path: &Path, mode: OpenMode) -> Result<MemoryContainer> {
        let store = self.lock();
        if store.corrupt_containers.contains(path) {
            return Err(RepackError::format(path, "container marked corrupt"));
        }

        let data = match (store.containers.get(path), mode) {
            (Some(existing), _) => existing.clone(),
            (None, OpenMode::Append) => StoredContainer::default(),
            (None, OpenMode::Read) => {
                return Err(RepackError::io(
                    path,
                    "open",
                    std::io::Error::new(ErrorKind::NotFound, "no such container"),
                ))
            }
        };
        let corrupt_reads = store
            .corrupt_reads
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, id)| id.clone())
            .collect();
        let corrupt_groups = store
            .corrupt_groups
            .iter()
            .filter(|(p, _, _)| p == path)
            .map(|(_, id, name)| (id.clone(), name.clone()))
            .collect();

        Ok(MemoryContainer {
            path: path.to_path_buf(),
            mode,
            data,
            corrupt_reads,
            corrupt_groups,
            store: Arc::clone(&self.store),
            open: true,
        })
    }
}

/// Handle on an in-memory container snapshot.
pub struct MemoryContainer {
    path: PathBuf,
    mode: OpenMode,
    data: StoredContainer,
    corrupt_reads: HashSet<String>,
    corrupt_groups: HashSet<(String, String)>,
    store: Arc<Mutex<MemoryStore>>,
    open: bool,
}

impl MemoryContainer {
    fn ensure_writable(&self) -> Result<()> {
        if self.mode != OpenMode::Append {
            return Err(RepackError::container(&self.path, "container opened read-only"));
        }
        if !self.open {
            return Err(RepackError::container(&self.path, "container is closed"));
        }
        Ok(())
    }
}

impl Container for MemoryContainer {
    fn path(&self) -> &Path {
        &self.path
    }

    fn read_ids(&self) -> Result<Vec<String>> {
        Ok(self.data.order.clone())
    }

    fn contains_read(&self, read_id: &str) -> bool {
        self.data.reads.contains_key(read_id)
    }

    fn get_read(&mut self, read_id: &str) -> Result<ReadRecord> {
        if self.corrupt_reads.contains(read_id) {
            return Err(RepackError::format(
                &self.path,
                format!("read '{}' is corrupt", read_id),
            ));
        }
        self.data.reads.get(read_id).cloned().ok_or_else(|| {
            RepackError::container(&self.path, format!("read '{}' not found", read_id))
        })
    }

    fn create_read(&mut self, read_id: &str, run_id: &str) -> Result<()> {
        self.ensure_writable()?;
        if self.data.reads.contains_key(read_id) {
            return Err(RepackError::container(
                &self.path,
                format!("read '{}' already exists", read_id),
            ));
        }
        self.data.order.push(read_id.to_string());
        self.data.reads.insert(
            read_id.to_string(),
            ReadRecord {
                run_id: run_id.to_string(),
                groups: Vec::new(),
            },
        );
        Ok(())
    }

    fn copy_group(&mut self, read_id: &str, group: &Group) -> Result<()> {
        self.ensure_writable()?;
        if self
            .corrupt_groups
            .contains(&(read_id.to_string(), group.name.clone()))
        {
            return Err(RepackError::container(
                &self.path,
                format!("failed to write group '{}' of read '{}'", group.name, read_id),
            ));
        }
        let read = self.data.reads.get_mut(read_id).ok_or_else(|| {
            RepackError::container(
                &self.path,
                format!("cannot add group '{}' to unknown read '{}'", group.name, read_id),
            )
        })?;
        if read.groups.iter().any(|g| g.name == group.name) {
            return Err(RepackError::container(
                &self.path,
                format!("read '{}' already has group '{}'", read_id, group.name),
            ));
        }
        read.groups.push(group.clone());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        if self.mode == OpenMode::Append {
            let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
            store
                .containers
                .insert(self.path.clone(), std::mem::take(&mut self.data));
        }
        Ok(())
    }
}

impl Drop for MemoryContainer {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_commits_on_close() {
        let backend = MemoryBackend::new();
        let path = Path::new("/out/batch_0.fast5");

        let mut c = backend.open(path, OpenMode::Append).unwrap();
        c.create_read("r1", "run").unwrap();
        c.copy_group("r1", &Group::new("Raw", vec![1u8])).unwrap();
        assert!(!backend.exists(path));
        c.close().unwrap();

        assert_eq!(backend.read_ids(path).unwrap(), vec!["r1"]);
        assert_eq!(backend.read(path, "r1").unwrap().groups.len(), 1);
    }

    #[test]
    fn test_read_mode_missing_container() {
        let backend = MemoryBackend::new();
        let err = backend
            .open(Path::new("/in/missing.fast5"), OpenMode::Read)
            .err()
            .unwrap();
        assert!(matches!(err, RepackError::Io { .. }));
    }

    #[test]
    fn test_corruption_injection() {
        let backend = MemoryBackend::new();
        backend.insert_read("/in/a.fast5", "r1", "run", vec![]);
        backend.insert_read("/in/a.fast5", "r2", "run", vec![]);
        backend.corrupt_read("/in/a.fast5", "r2");

        let mut c = backend.open(Path::new("/in/a.fast5"), OpenMode::Read).unwrap();
        assert!(c.get_read("r1").is_ok());
        assert!(c.get_read("r2").is_err());

        backend.corrupt_container("/in/a.fast5");
        assert!(backend.open(Path::new("/in/a.fast5"), OpenMode::Read).is_err());
    }

    #[test]
    fn test_read_mode_does_not_commit() {
        let backend = MemoryBackend::new();
        backend.insert_read("/in/a.fast5", "r1", "run", vec![]);
        let mut c = backend.open(Path::new("/in/a.fast5"), OpenMode::Read).unwrap();
        assert!(c.create_read("r2", "run").is_err());
        c.close().unwrap();
        assert_eq!(backend.read_ids("/in/a.fast5").unwrap(), vec!["r1"]);
    }
}
