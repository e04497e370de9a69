//! `mrepack inspect`: list the reads of a container.

use anyhow::{Context, Result};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use mrepack::{Container, FileContainer, OpenMode};

/// Write `read_id<TAB>run_id` per read, in listing order. With `groups`,
/// each read is followed by indented `group_name<TAB>bytes` lines.
pub fn inspect_container<W: Write>(path: &Path, groups: bool, out: &mut W) -> Result<usize> {
    let mut container = FileContainer::open(path, OpenMode::Read)
        .with_context(|| format!("Failed to open container {}", path.display()))?;
    let read_ids = container.read_ids()?;

    for read_id in &read_ids {
        writeln!(out, "{}\t{}", read_id, container.run_id(read_id).unwrap_or(""))?;
        if groups {
            for (name, size) in container.group_sizes(read_id).unwrap_or_default() {
                writeln!(out, "  {}\t{}", name, size)?;
            }
        }
    }
    out.flush()?;
    container.close()?;

    log::info!("{} read(s) in {}", container.read_count(), path.display());
    Ok(read_ids.len())
}

pub fn run_inspect(path: &Path, groups: bool) -> Result<()> {
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    inspect_container(path, groups, &mut out)?;
    Ok(())
}
