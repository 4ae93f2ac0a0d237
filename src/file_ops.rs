//! Sequential and random-access iterators over the append-only log
//!
//! `scan_all` walks the log line by line tracking byte offsets as it goes;
//! `by_offsets` seeks directly to each requested offset. Both mirror
//! `pysql/util.read_lines` plus the `char_no`/`CHAR_NUM_FIELD_NAME`
//! handling `storagemanager/storage.py` does inline — split out here into
//! their own iterators so `StorageManager` doesn't do its own file
//! bookkeeping.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

use serde_json::{Map, Value as JsonValue};

use crate::error::{DocStoreError, DocStoreResult};
use crate::storage_manager::CHAR_NO_FIELD;

fn strip_line_ending(buf: &mut Vec<u8>) {
    while matches!(buf.last(), Some(b'\n') | Some(b'\r')) {
        buf.pop();
    }
}

fn parse_record(buf: &[u8], offset: u64) -> DocStoreResult<Map<String, JsonValue>> {
    match serde_json::from_slice(buf) {
        Ok(JsonValue::Object(map)) => Ok(map),
        Ok(_) => Err(DocStoreError::Corruption(format!(
            "log line at offset {} is not a JSON object",
            offset
        ))),
        Err(e) => Err(DocStoreError::Corruption(format!(
            "malformed log line at offset {}: {}",
            offset, e
        ))),
    }
}

/// Sequential reader over every record in the log, in file order.
///
/// A blank line is skipped; a malformed line yields an error and the scan
/// stops (subsequent calls to `next` return `None`).
pub struct ScanAll {
    reader: BufReader<File>,
    offset: u64,
    include_offset: bool,
    done: bool,
}

impl ScanAll {
    /// Opens `path` for a fresh sequential scan from the start.
    pub fn open(path: &Path, include_offset: bool) -> io::Result<Self> {
        Ok(Self {
            reader: BufReader::new(File::open(path)?),
            offset: 0,
            include_offset,
            done: false,
        })
    }
}

impl Iterator for ScanAll {
    type Item = DocStoreResult<Map<String, JsonValue>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let start_offset = self.offset;
            let mut buf = Vec::new();
            let bytes_read = match self.reader.read_until(b'\n', &mut buf) {
                Ok(n) => n,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            };
            if bytes_read == 0 {
                self.done = true;
                return None;
            }
            self.offset += bytes_read as u64;
            strip_line_ending(&mut buf);
            if buf.is_empty() {
                continue;
            }

            return Some(parse_record(&buf, start_offset).map(|mut record| {
                if self.include_offset {
                    record.insert(CHAR_NO_FIELD.to_string(), JsonValue::from(start_offset));
                }
                record
            }));
        }
    }
}

/// Random-access reader that fetches one record per requested offset, in
/// the order the offsets were given.
pub struct ByOffsets {
    file: File,
    offsets: std::vec::IntoIter<u64>,
    include_offset: bool,
}

impl ByOffsets {
    /// Opens `path` for lookups at `offsets`, preserving input order.
    pub fn open(path: &Path, offsets: Vec<u64>, include_offset: bool) -> io::Result<Self> {
        Ok(Self {
            file: File::open(path)?,
            offsets: offsets.into_iter(),
            include_offset,
        })
    }
}

impl Iterator for ByOffsets {
    type Item = DocStoreResult<Map<String, JsonValue>>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.offsets.next()?;

        if let Err(e) = self.file.seek(SeekFrom::Start(offset)) {
            return Some(Err(e.into()));
        }

        let mut buf = Vec::new();
        let mut reader = BufReader::new(&mut self.file);
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => {
                return Some(Err(DocStoreError::Corruption(format!(
                    "offset {} is past the end of the log",
                    offset
                ))))
            }
            Ok(_) => {}
            Err(e) => return Some(Err(e.into())),
        }
        strip_line_ending(&mut buf);

        Some(parse_record(&buf, offset).map(|mut record| {
            if self.include_offset {
                record.insert(CHAR_NO_FIELD.to_string(), JsonValue::from(offset));
            }
            record
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_log(path: &Path, lines: &[&str]) {
        let mut f = File::create(path).unwrap();
        for line in lines {
            writeln!(f, "{}", line).unwrap();
        }
    }

    #[test]
    fn test_scan_all_yields_records_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.data");
        write_log(&path, &[r#"{"a":1}"#, r#"{"a":2}"#]);

        let records: Vec<_> = ScanAll::open(&path, false)
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["a"], serde_json::json!(1));
        assert_eq!(records[1]["a"], serde_json::json!(2));
    }

    #[test]
    fn test_scan_all_skips_blank_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.data");
        write_log(&path, &[r#"{"a":1}"#, "", r#"{"a":2}"#]);

        let records: Vec<_> = ScanAll::open(&path, false)
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_scan_all_include_offset_attaches_char_no() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.data");
        write_log(&path, &[r#"{"a":1}"#, r#"{"a":2}"#]);

        let records: Vec<_> = ScanAll::open(&path, true)
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(records[0][CHAR_NO_FIELD], serde_json::json!(0));
        assert_eq!(records[1][CHAR_NO_FIELD], serde_json::json!(8));
    }

    #[test]
    fn test_scan_all_malformed_line_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.data");
        write_log(&path, &[r#"{"a":1}"#, "not json"]);

        let mut iter = ScanAll::open(&path, false).unwrap();
        assert!(iter.next().unwrap().is_ok());
        assert!(iter.next().unwrap().is_err());
    }

    #[test]
    fn test_by_offsets_fetches_in_input_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.data");
        write_log(&path, &[r#"{"a":1}"#, r#"{"a":2}"#, r#"{"a":3}"#]);

        let records: Vec<_> = ByOffsets::open(&path, vec![16, 0], false)
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(records[0]["a"], serde_json::json!(3));
        assert_eq!(records[1]["a"], serde_json::json!(1));
    }
}
