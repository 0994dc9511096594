//! Journal Module
//!
//! JSON-lines journal: one header line followed by one record per line.
//!
//! ```text
//! {"magic":"photo_cache.journal","format":1,"app_version":3,"value_count":1}
//! {"op":"dirty","key":"3f7a..."}
//! {"op":"clean","key":"3f7a...","lengths":[48211]}
//! {"op":"read","key":"3f7a..."}
//! {"op":"remove","key":"3f7a..."}
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;

pub(crate) const JOURNAL_FILE: &str = "journal";
pub(crate) const JOURNAL_TMP_FILE: &str = "journal.tmp";
pub(crate) const JOURNAL_BACKUP_FILE: &str = "journal.bkp";

const MAGIC: &str = "photo_cache.journal";
const FORMAT_VERSION: u32 = 1;

// == Header ==
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct JournalHeader {
    pub magic: String,
    pub format: u32,
    pub app_version: u32,
    pub value_count: usize,
}

impl JournalHeader {
    pub fn new(app_version: u32, value_count: usize) -> Self {
        Self {
            magic: MAGIC.to_string(),
            format: FORMAT_VERSION,
            app_version,
            value_count,
        }
    }

    /// True when a stored header was written by this format and settings.
    pub fn matches(&self, app_version: u32, value_count: usize) -> bool {
        *self == Self::new(app_version, value_count)
    }
}

// == Record ==
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub(crate) enum Record {
    /// An edit started; a matching clean or nothing follows.
    Dirty { key: String },
    /// An edit committed with the given per-slot lengths.
    Clean { key: String, lengths: Vec<u64> },
    /// Entry removed (evicted or deleted).
    Remove { key: String },
    /// Entry read; only affects recency.
    Read { key: String },
}

// == Replay ==
#[derive(Debug)]
pub(crate) struct Replay {
    pub header: JournalHeader,
    pub records: Vec<Record>,
    /// The file ended in an unparsable line (torn write).
    pub truncated: bool,
}

/// Reads a journal file. A bad header is an error; a bad record ends the
/// replay at that point and sets `truncated`.
pub(crate) fn read_journal(path: &Path) -> Result<Replay, StorageError> {
    let reader = BufReader::new(File::open(path)?);
    let mut lines = reader.lines();

    let header_line = lines
        .next()
        .ok_or_else(|| StorageError::CorruptJournal("empty journal".to_string()))??;
    let header: JournalHeader = serde_json::from_str(&header_line)
        .map_err(|e| StorageError::CorruptJournal(format!("bad header: {}", e)))?;

    let mut records = Vec::new();
    let mut truncated = false;
    for line in lines {
        let line = match line {
            Ok(line) => line,
            Err(_) => {
                truncated = true;
                break;
            }
        };
        match serde_json::from_str::<Record>(&line) {
            Ok(record) => records.push(record),
            Err(_) => {
                truncated = true;
                break;
            }
        }
    }

    Ok(Replay {
        header,
        records,
        truncated,
    })
}

// == Journal Writer ==
/// Append handle on the live journal.
#[derive(Debug)]
pub(crate) struct JournalWriter {
    writer: BufWriter<File>,
}

impl JournalWriter {
    /// Opens an existing journal for appending.
    pub fn open_append(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Creates (truncating) a journal and writes its header.
    pub fn create(path: &Path, header: &JournalHeader) -> io::Result<Self> {
        let file = File::create(path)?;
        let mut journal = Self {
            writer: BufWriter::new(file),
        };
        journal.write_line(header)?;
        Ok(journal)
    }

    pub fn append(&mut self, record: &Record) -> io::Result<()> {
        self.write_line(record)
    }

    /// Pushes buffered records to the OS.
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Pushes buffered records to durable storage.
    pub fn sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()
    }

    fn write_line<T: Serialize>(&mut self, value: &T) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, value)?;
        self.writer.write_all(b"\n")
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_record_wire_format() {
        let record = Record::Clean {
            key: "abc".to_string(),
            lengths: vec![10, 20],
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"op":"clean","key":"abc","lengths":[10,20]}"#);
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(JOURNAL_FILE);

        let mut journal = JournalWriter::create(&path, &JournalHeader::new(7, 1)).unwrap();
        journal.append(&Record::Dirty { key: "k".into() }).unwrap();
        journal
            .append(&Record::Clean {
                key: "k".into(),
                lengths: vec![5],
            })
            .unwrap();
        journal.sync().unwrap();

        let replay = read_journal(&path).unwrap();
        assert!(replay.header.matches(7, 1));
        assert!(!replay.header.matches(8, 1));
        assert_eq!(replay.records.len(), 2);
        assert!(!replay.truncated);
    }

    #[test]
    fn test_torn_tail_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(JOURNAL_FILE);

        let mut journal = JournalWriter::create(&path, &JournalHeader::new(1, 1)).unwrap();
        journal.append(&Record::Read { key: "k".into() }).unwrap();
        journal.flush().unwrap();
        drop(journal);

        let mut contents = fs::read_to_string(&path).unwrap();
        contents.push_str("{\"op\":\"clea");
        fs::write(&path, contents).unwrap();

        let replay = read_journal(&path).unwrap();
        assert_eq!(replay.records, vec![Record::Read { key: "k".into() }]);
        assert!(replay.truncated);
    }

    #[test]
    fn test_garbage_header_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(JOURNAL_FILE);
        fs::write(&path, "not a journal\n").unwrap();

        assert!(matches!(
            read_journal(&path),
            Err(StorageError::CorruptJournal(_))
        ));
    }
}
