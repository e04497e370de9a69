//! Read id → label assignment loaded from a two-column, tab-separated file.
//!
//! Format: one `<read_id>\t<label>` entry per line, no header. A line that
//! does not split into exactly two fields makes the whole table invalid;
//! routing is never attempted from a partial table.

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::{RepackError, Result};

/// Immutable read id → label mapping.
#[derive(Debug, Default, Clone)]
pub struct BinningTable {
    labels: HashMap<String, String>,
}

impl BinningTable {
    /// Load a table from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| RepackError::io(path, "open binning file", e))?;
        Self::from_reader(BufReader::new(file), path)
    }

    /// Parse a table from any line source. `source` is only used in errors.
    ///
    /// Surrounding whitespace is stripped from each line before splitting.
    /// When a read id appears more than once, the last entry wins.
    pub fn from_reader<R: BufRead>(reader: R, source: &Path) -> Result<Self> {
        let mut labels = HashMap::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| RepackError::io(source, "read binning file", e))?;
            let mut fields = line.trim().split('\t');
            match (fields.next(), fields.next(), fields.next()) {
                (Some(read_id), Some(label), None) => {
                    labels.insert(read_id.to_string(), label.to_string());
                }
                _ => {
                    return Err(RepackError::MalformedBinningEntry {
                        path: PathBuf::from(source),
                        line_number: idx + 1,
                        line: line.clone(),
                    })
                }
            }
        }

        log::info!(
            "Loaded {} binning entries from {}",
            labels.len(),
            source.display()
        );
        Ok(Self { labels })
    }

    /// Label assigned to a read, if any.
    pub fn label(&self, read_id: &str) -> Option<&str> {
        self.labels.get(read_id).map(String::as_str)
    }

    /// Distinct labels, sorted.
    pub fn labels(&self) -> Vec<&str> {
        self.labels
            .values()
            .map(String::as_str)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for BinningTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            labels: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(text: &str) -> Result<BinningTable> {
        BinningTable::from_reader(Cursor::new(text), Path::new("bins.tsv"))
    }

    #[test]
    fn test_parse_two_columns() {
        let table = parse("read_1\tA\nread_2\tB\nread_3\tA\n").unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.label("read_1"), Some("A"));
        assert_eq!(table.label("read_2"), Some("B"));
        assert_eq!(table.label("read_9"), None);
        assert_eq!(table.labels(), vec!["A", "B"]);
    }

    #[test]
    fn test_last_entry_wins() {
        let table = parse("read_1\tA\nread_1\tC\n").unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.label("read_1"), Some("C"));
    }

    #[test]
    fn test_crlf_and_trailing_whitespace_stripped() {
        let table = parse("read_1\tA\r\nread_2\tB  \n").unwrap();
        assert_eq!(table.label("read_1"), Some("A"));
        assert_eq!(table.label("read_2"), Some("B"));
    }

    #[test]
    fn test_too_many_fields_is_fatal() {
        let err = parse("read_1\tA\nread_2\tB\textra\n").unwrap_err();
        match err {
            RepackError::MalformedBinningEntry {
                line_number, line, ..
            } => {
                assert_eq!(line_number, 2);
                assert_eq!(line, "read_2\tB\textra");
            }
            other => panic!("Expected MalformedBinningEntry, got {other}"),
        }
    }

    #[test]
    fn test_single_field_is_fatal() {
        assert!(matches!(
            parse("read_1 A\n"),
            Err(RepackError::MalformedBinningEntry { line_number: 1, .. })
        ));
    }

    #[test]
    fn test_blank_line_is_fatal() {
        assert!(parse("read_1\tA\n\nread_2\tB\n").is_err());
    }

    #[test]
    fn test_empty_input_is_empty_table() {
        let table = parse("").unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_from_iterator() {
        let table: BinningTable = [("r1", "A"), ("r2", "B")].into_iter().collect();
        assert_eq!(table.label("r2"), Some("B"));
    }
}
