//! Single-file container backed by an append-only record log.
//!
//! # File Format (v1)
//! - Header: magic "MRC1", version u32 LE
//! - Records, back to back until EOF:
//!   - `0x01` read:  id, run_id
//!   - `0x02` group: read_id, name, data
//!
//! Every string and payload is written as `<varint len><bytes>`. Opening a
//! container scans the whole log once and keeps an in-memory index of read
//! ids (in creation order) and group payload offsets; payloads are only read
//! back on `get_read`. Appends go to the end of the file, so a container can
//! be reopened and extended across runs.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::{Container, ContainerBackend, Group, OpenMode, ReadRecord};
use crate::constants::{
    CONTAINER_HEADER_LEN, CONTAINER_MAGIC, CONTAINER_VERSION, MAX_STRING_LENGTH, READ_BUF_SIZE,
    RECORD_GROUP, RECORD_READ, WRITE_BUF_SIZE,
};
use crate::encoding::{decode_varint, put_bytes, put_varint, MAX_VARINT_BYTES};
use crate::error::{RepackError, Result};

/// Opens [`FileContainer`]s on the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileBackend;

impl ContainerBackend for FileBackend {
    type Handle = FileContainer;

    fn open(&self, path: &Path, mode: OpenMode) -> Result<FileContainer> {
        FileContainer::open(path, mode)
    }
}

#[derive(Debug)]
struct GroupSlot {
    name: String,
    offset: u64,
    len: u64,
}

#[derive(Debug)]
struct ReadSlot {
    run_id: String,
    groups: Vec<GroupSlot>,
}

/// Open handle on a container file.
pub struct FileContainer {
    path: PathBuf,
    mode: OpenMode,
    file: Option<File>,
    /// Encoded records not yet written to `file`.
    pending: Vec<u8>,
    /// Logical end of the log, including `pending`.
    end_offset: u64,
    order: Vec<String>,
    reads: HashMap<String, ReadSlot>,
}

impl FileContainer {
    /// Open a container file.
    ///
    /// `Read` requires an existing, well-formed file. `Append` creates the
    /// file (header included) when it is absent or empty.
    pub fn open(path: &Path, mode: OpenMode) -> Result<Self> {
        let file = match mode {
            OpenMode::Read => File::open(path).map_err(|e| RepackError::io(path, "open", e))?,
            OpenMode::Append => OpenOptions::new()
                .read(true)
                .append(true)
                .create(true)
                .open(path)
                .map_err(|e| RepackError::io(path, "create", e))?,
        };
        let file_len = file
            .metadata()
            .map_err(|e| RepackError::io(path, "stat", e))?
            .len();

        let mut container = FileContainer {
            path: path.to_path_buf(),
            mode,
            file: None,
            pending: Vec::new(),
            end_offset: file_len,
            order: Vec::new(),
            reads: HashMap::new(),
        };

        if file_len == 0 {
            if mode == OpenMode::Read {
                return Err(RepackError::format(path, "empty file, missing header"));
            }
            container.pending.extend_from_slice(CONTAINER_MAGIC);
            container
                .pending
                .extend_from_slice(&CONTAINER_VERSION.to_le_bytes());
            container.end_offset = CONTAINER_HEADER_LEN;
        } else {
            let (order, reads) = scan_log(path, &file, file_len)?;
            container.order = order;
            container.reads = reads;
        }

        container.file = Some(file);
        Ok(container)
    }

    /// Number of reads in the container.
    pub fn read_count(&self) -> usize {
        self.order.len()
    }

    /// Run id of a read, without loading its groups.
    pub fn run_id(&self, read_id: &str) -> Option<&str> {
        self.reads.get(read_id).map(|slot| slot.run_id.as_str())
    }

    /// Group names and payload sizes of a read, without loading payloads.
    pub fn group_sizes(&self, read_id: &str) -> Option<Vec<(&str, u64)>> {
        self.reads.get(read_id).map(|slot| {
            slot.groups
                .iter()
                .map(|g| (g.name.as_str(), g.len))
                .collect()
        })
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.mode != OpenMode::Append {
            return Err(RepackError::container(&self.path, "container opened read-only"));
        }
        if self.file.is_none() {
            return Err(RepackError::container(&self.path, "container is closed"));
        }
        Ok(())
    }

    fn append_parts(&mut self, parts: &[&[u8]]) -> Result<()> {
        for part in parts {
            self.pending.extend_from_slice(part);
            self.end_offset += part.len() as u64;
        }
        if self.pending.len() >= WRITE_BUF_SIZE {
            self.flush_pending()?;
        }
        Ok(())
    }

    fn flush_pending(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| RepackError::container(&self.path, "container is closed"))?;
        file.write_all(&self.pending)
            .map_err(|e| RepackError::io(&self.path, "write", e))?;
        self.pending.clear();
        Ok(())
    }
}

impl Container for FileContainer {
    fn path(&self) -> &Path {
        &self.path
    }

    fn read_ids(&self) -> Result<Vec<String>> {
        Ok(self.order.clone())
    }

    fn contains_read(&self, read_id: &str) -> bool {
        self.reads.contains_key(read_id)
    }

    fn get_read(&mut self, read_id: &str) -> Result<ReadRecord> {
        self.flush_pending()?;

        let slot = self
            .reads
            .get(read_id)
            .ok_or_else(|| {
                RepackError::container(&self.path, format!("read '{}' not found", read_id))
            })?;
        let mut file: &File = self
            .file
            .as_ref()
            .ok_or_else(|| RepackError::container(&self.path, "container is closed"))?;

        let mut groups = Vec::with_capacity(slot.groups.len());
        for group in &slot.groups {
            let mut data = vec![0u8; group.len as usize];
            file.seek(SeekFrom::Start(group.offset))
                .and_then(|_| file.read_exact(&mut data))
                .map_err(|e| RepackError::io(&self.path, "read group", e))?;
            groups.push(Group {
                name: group.name.clone(),
                data,
            });
        }

        Ok(ReadRecord {
            run_id: slot.run_id.clone(),
            groups,
        })
    }

    fn create_read(&mut self, read_id: &str, run_id: &str) -> Result<()> {
        self.ensure_writable()?;
        if self.reads.contains_key(read_id) {
            return Err(RepackError::container(
                &self.path,
                format!("read '{}' already exists", read_id),
            ));
        }

        let mut record = vec![RECORD_READ];
        put_bytes(&mut record, read_id.as_bytes());
        put_bytes(&mut record, run_id.as_bytes());
        self.append_parts(&[&record])?;

        self.order.push(read_id.to_string());
        self.reads.insert(
            read_id.to_string(),
            ReadSlot {
                run_id: run_id.to_string(),
                groups: Vec::new(),
            },
        );
        Ok(())
    }

    fn copy_group(&mut self, read_id: &str, group: &Group) -> Result<()> {
        self.ensure_writable()?;
        match self.reads.get(read_id) {
            None => {
                return Err(RepackError::container(
                    &self.path,
                    format!("cannot add group '{}' to unknown read '{}'", group.name, read_id),
                ))
            }
            Some(slot) if slot.groups.iter().any(|g| g.name == group.name) => {
                return Err(RepackError::container(
                    &self.path,
                    format!("read '{}' already has group '{}'", read_id, group.name),
                ))
            }
            Some(_) => {}
        }

        let mut prefix = vec![RECORD_GROUP];
        put_bytes(&mut prefix, read_id.as_bytes());
        put_bytes(&mut prefix, group.name.as_bytes());
        put_varint(&mut prefix, group.data.len() as u64);
        let offset = self.end_offset + prefix.len() as u64;
        self.append_parts(&[&prefix, &group.data])?;

        if let Some(slot) = self.reads.get_mut(read_id) {
            slot.groups.push(GroupSlot {
                name: group.name.clone(),
                offset,
                len: group.data.len() as u64,
            });
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.file.is_none() {
            return Ok(());
        }
        let flushed = self.flush_pending();
        self.file = None;
        flushed
    }
}

impl Drop for FileContainer {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Failed to close container '{}': {}", self.path.display(), e);
        }
    }
}

// ============================================================================
// Log scanning
// ============================================================================

type ScannedIndex = (Vec<String>, HashMap<String, ReadSlot>);

fn scan_log(path: &Path, file: &File, file_len: u64) -> Result<ScannedIndex> {
    let mut reader = LogReader {
        inner: BufReader::with_capacity(READ_BUF_SIZE, file),
        pos: 0,
        len: file_len,
        path,
    };

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != CONTAINER_MAGIC {
        return Err(RepackError::format(path, "invalid magic bytes"));
    }
    let mut version = [0u8; 4];
    reader.read_exact(&mut version)?;
    let version = u32::from_le_bytes(version);
    if version != CONTAINER_VERSION {
        return Err(RepackError::format(
            path,
            format!("unsupported version {} (expected {})", version, CONTAINER_VERSION),
        ));
    }

    let mut order = Vec::new();
    let mut reads: HashMap<String, ReadSlot> = HashMap::new();

    while reader.pos < file_len {
        let record_offset = reader.pos;
        let mut tag = [0u8; 1];
        reader.read_exact(&mut tag)?;
        match tag[0] {
            RECORD_READ => {
                let id = reader.read_string()?;
                let run_id = reader.read_string()?;
                if reads.contains_key(&id) {
                    return Err(RepackError::format(
                        path,
                        format!("duplicate read '{}' at offset {}", id, record_offset),
                    ));
                }
                order.push(id.clone());
                reads.insert(
                    id,
                    ReadSlot {
                        run_id,
                        groups: Vec::new(),
                    },
                );
            }
            RECORD_GROUP => {
                let read_id = reader.read_string()?;
                let name = reader.read_string()?;
                let len = reader.read_varint()?;
                let offset = reader.pos;
                reader.skip(len)?;
                let slot = reads.get_mut(&read_id).ok_or_else(|| {
                    RepackError::format(
                        path,
                        format!(
                            "group '{}' for unknown read '{}' at offset {}",
                            name, read_id, record_offset
                        ),
                    )
                })?;
                slot.groups.push(GroupSlot { name, offset, len });
            }
            other => {
                return Err(RepackError::format(
                    path,
                    format!("unknown record tag 0x{:02x} at offset {}", other, record_offset),
                ))
            }
        }
    }

    Ok((order, reads))
}

/// Position-tracking reader that turns short reads into format errors.
struct LogReader<'a> {
    inner: BufReader<&'a File>,
    pos: u64,
    len: u64,
    path: &'a Path,
}

impl LogReader<'_> {
    fn truncated(&self) -> RepackError {
        RepackError::format(self.path, format!("truncated record at offset {}", self.pos))
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        match self.inner.read_exact(buf) {
            Ok(()) => {
                self.pos += buf.len() as u64;
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(self.truncated()),
            Err(e) => Err(RepackError::io(self.path, "read", e)),
        }
    }

    fn read_varint(&mut self) -> Result<u64> {
        let mut buf = [0u8; MAX_VARINT_BYTES];
        for i in 0..MAX_VARINT_BYTES {
            self.read_exact(&mut buf[i..i + 1])?;
            if buf[i] & 0x80 == 0 {
                let (value, _) = decode_varint(&buf[..=i])?;
                return Ok(value);
            }
        }
        Ok(decode_varint(&buf)?.0)
    }

    fn read_string(&mut self) -> Result<String> {
        let len = self.read_varint()?;
        if len > MAX_STRING_LENGTH {
            return Err(RepackError::format(
                self.path,
                format!("string length {} exceeds limit at offset {}", len, self.pos),
            ));
        }
        let mut bytes = vec![0u8; len as usize];
        self.read_exact(&mut bytes)?;
        String::from_utf8(bytes)
            .map_err(|_| RepackError::format(self.path, format!("invalid UTF-8 before offset {}", self.pos)))
    }

    fn skip(&mut self, len: u64) -> Result<()> {
        if len > self.len.saturating_sub(self.pos) {
            return Err(self.truncated());
        }
        self.inner
            .seek_relative(len as i64)
            .map_err(|e| RepackError::io(self.path, "seek", e))?;
        self.pos += len;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_sample(path: &Path) {
        let mut c = FileContainer::open(path, OpenMode::Append).unwrap();
        c.create_read("read_a", "run_1").unwrap();
        c.copy_group("read_a", &Group::new("Raw", vec![1u8, 2, 3])).unwrap();
        c.copy_group("read_a", &Group::new("channel_id", b"ch7".to_vec()))
            .unwrap();
        c.create_read("read_b", "run_2").unwrap();
        c.copy_group("read_b", &Group::new("Raw", vec![9u8; 300])).unwrap();
        c.close().unwrap();
    }

    #[test]
    fn test_reopen_preserves_reads_and_groups() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reads.fast5");
        write_sample(&path);

        let mut c = FileContainer::open(&path, OpenMode::Read).unwrap();
        assert_eq!(c.read_ids().unwrap(), vec!["read_a", "read_b"]);
        assert_eq!(c.read_count(), 2);
        assert_eq!(c.run_id("read_b"), Some("run_2"));

        let read = c.get_read("read_a").unwrap();
        assert_eq!(read.run_id, "run_1");
        assert_eq!(
            read.groups,
            vec![
                Group::new("Raw", vec![1u8, 2, 3]),
                Group::new("channel_id", b"ch7".to_vec())
            ]
        );
        assert_eq!(c.get_read("read_b").unwrap().groups[0].data.len(), 300);
    }

    #[test]
    fn test_append_extends_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reads.fast5");
        write_sample(&path);

        {
            let mut c = FileContainer::open(&path, OpenMode::Append).unwrap();
            assert!(c.contains_read("read_a"));
            c.create_read("read_c", "run_1").unwrap();
            c.copy_group("read_c", &Group::new("Raw", vec![4u8])).unwrap();
        } // closed on drop

        let mut c = FileContainer::open(&path, OpenMode::Read).unwrap();
        assert_eq!(c.read_ids().unwrap(), vec!["read_a", "read_b", "read_c"]);
        assert_eq!(c.get_read("read_c").unwrap().groups[0].data, vec![4u8]);
    }

    #[test]
    fn test_get_read_sees_unflushed_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.fast5");
        let mut c = FileContainer::open(&path, OpenMode::Append).unwrap();
        c.create_read("r1", "run").unwrap();
        c.copy_group("r1", &Group::new("Raw", b"abc".to_vec())).unwrap();
        assert_eq!(c.get_read("r1").unwrap().groups[0].data, b"abc");
    }

    #[test]
    fn test_read_mode_rejects_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reads.fast5");
        write_sample(&path);

        let mut c = FileContainer::open(&path, OpenMode::Read).unwrap();
        let err = c.create_read("read_z", "run").unwrap_err();
        assert!(matches!(err, RepackError::Container { .. }));
    }

    #[test]
    fn test_duplicate_read_and_group_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.fast5");
        let mut c = FileContainer::open(&path, OpenMode::Append).unwrap();
        c.create_read("r1", "run").unwrap();
        assert!(c.create_read("r1", "run").is_err());
        c.copy_group("r1", &Group::new("Raw", vec![1u8])).unwrap();
        assert!(c.copy_group("r1", &Group::new("Raw", vec![2u8])).is_err());
        assert!(c.copy_group("missing", &Group::new("Raw", vec![2u8])).is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = FileContainer::open(&dir.path().join("nope.fast5"), OpenMode::Read)
            .err()
            .unwrap();
        assert!(matches!(err, RepackError::Io { operation: "open", .. }));
    }

    #[test]
    fn test_truncated_file_is_format_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reads.fast5");
        write_sample(&path);

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 10]).unwrap();

        let err = FileContainer::open(&path, OpenMode::Read).err().unwrap();
        match err {
            RepackError::Format { detail, .. } => assert!(detail.contains("truncated")),
            other => panic!("Expected Format error, got {other}"),
        }
    }

    #[test]
    fn test_bad_magic_is_format_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("junk.fast5");
        std::fs::write(&path, b"\x89HDF\r\n\x1a\n....").unwrap();
        let err = FileContainer::open(&path, OpenMode::Read).err().unwrap();
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn test_oversized_group_length_is_format_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("huge.fast5");
        let mut bytes = CONTAINER_MAGIC.to_vec();
        bytes.extend_from_slice(&CONTAINER_VERSION.to_le_bytes());
        bytes.push(RECORD_GROUP);
        put_bytes(&mut bytes, b"r");
        put_bytes(&mut bytes, b"g");
        put_varint(&mut bytes, u64::MAX);
        std::fs::write(&path, &bytes).unwrap();

        match FileContainer::open(&path, OpenMode::Read) {
            Err(RepackError::Format { detail, .. }) => assert!(detail.contains("truncated")),
            Err(other) => panic!("Expected Format error, got {other}"),
            Ok(_) => panic!("Expected Format error, got a container"),
        }
    }

    #[test]
    fn test_empty_file_read_mode_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.fast5");
        std::fs::write(&path, b"").unwrap();
        assert!(FileContainer::open(&path, OpenMode::Read).is_err());

        // Append mode turns the empty file into a valid container.
        let mut c = FileContainer::open(&path, OpenMode::Append).unwrap();
        c.close().unwrap();
        let c = FileContainer::open(&path, OpenMode::Read).unwrap();
        assert_eq!(c.read_count(), 0);
    }
}
