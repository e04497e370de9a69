//! Helpers shared by the integration tests.

#![allow(dead_code)]

use anyhow::Result;
use std::path::{Path, PathBuf};

use mrepack::{Container, FileContainer, Group, OpenMode, ReadRecord};

/// Write a container holding `ids`, each with a run id and two groups.
pub fn write_container(path: &Path, ids: &[String]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut container = FileContainer::open(path, OpenMode::Append)?;
    for id in ids {
        container.create_read(id, &format!("run_{}", id.len()))?;
        container.copy_group(id, &Group::new("Raw", id.as_bytes().to_vec()))?;
        container.copy_group(id, &Group::new("channel_id", vec![1, 2, 3]))?;
    }
    container.close()?;
    Ok(())
}

/// `count` read ids prefixed with `prefix`.
pub fn ids(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{}_{:03}", prefix, i)).collect()
}

pub fn read_ids(path: &Path) -> Result<Vec<String>> {
    let container = FileContainer::open(path, OpenMode::Read)?;
    Ok(container.read_ids()?)
}

pub fn get_read(path: &Path, read_id: &str) -> Result<ReadRecord> {
    let mut container = FileContainer::open(path, OpenMode::Read)?;
    Ok(container.get_read(read_id)?)
}

/// Every regular file under `root`, sorted, relative to `root`.
pub fn tree(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.path().strip_prefix(root).ok().map(Path::to_path_buf))
        .collect();
    files.sort();
    files
}
