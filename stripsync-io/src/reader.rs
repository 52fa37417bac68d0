//! Memory-mapped file readers.
//!

use crate::scanner::{LineScanner, LineSpan};
use crate::{Error, Result};
use memmap2::Mmap;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use stripsync_core::EventStream;

/// A memory-mapped file reader.
///
/// Uses memmap2 to efficiently access file contents without
/// loading the entire file into memory.
pub struct MappedFileReader {
    mmap: Mmap,
    path: PathBuf,
}

impl MappedFileReader {
    /// Opens a file for memory-mapped reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        // This is the standard safety contract for memory mapping.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| {
            Error::MmapError(format!("{}: {e}", path.as_ref().display()))
        })?;
        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Returns the file contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Path the file was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Random-access stream of JSON-lines records backed by a file mapping.
///
/// Line offsets are indexed once on open; each read parses a single line.
pub struct JsonlStream<T> {
    reader: MappedFileReader,
    lines: Vec<LineSpan>,
    _record: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> JsonlStream<T> {
    /// Opens a JSON-lines file and indexes its records.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = MappedFileReader::open(path)?;
        let lines = LineScanner::scan_lines(reader.as_bytes());
        Ok(Self {
            reader,
            lines,
            _record: PhantomData,
        })
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Returns true if the file holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// File size in bytes.
    #[must_use]
    pub fn file_size(&self) -> usize {
        self.reader.len()
    }

    /// Path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.reader.path()
    }

    /// Parses record `index`.
    ///
    /// # Errors
    /// Returns `NotFound` past the end, or `Parse` with the file line number.
    pub fn record(&self, index: usize) -> Result<T> {
        let span = self.lines.get(index).ok_or(stripsync_core::Error::NotFound {
            index,
            len: self.lines.len(),
        })?;
        serde_json::from_slice(&self.reader.as_bytes()[span.range()]).map_err(|source| {
            Error::Parse {
                line: span.line,
                source,
            }
        })
    }

    /// Iterates over all records in file order.
    pub fn iter(&self) -> impl Iterator<Item = Result<T>> + '_ {
        (0..self.len()).map(|index| self.record(index))
    }
}

impl<T: DeserializeOwned> EventStream for JsonlStream<T> {
    type Record = T;

    fn len(&self) -> usize {
        self.lines.len()
    }

    fn read(&self, index: usize) -> stripsync_core::Result<T> {
        self.record(index).map_err(|err| match err {
            Error::CoreError(core) => core,
            other => stripsync_core::Error::InvalidRecord {
                index,
                reason: other.to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use stripsync_core::Clocked;
    use tempfile::NamedTempFile;

    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct Tick {
        clock: u64,
    }

    impl Clocked for Tick {
        fn clock(&self) -> u64 {
            self.clock
        }
    }

    fn write_lines(lines: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(lines.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_mapped_reader() {
        let file = write_lines("abc");
        let reader = MappedFileReader::open(file.path()).unwrap();
        assert_eq!(reader.as_bytes(), b"abc");
        assert_eq!(reader.len(), 3);
        assert_eq!(reader.path(), file.path());
    }

    #[test]
    fn test_random_access() {
        let file = write_lines("{\"clock\":5}\n{\"clock\":7}\n\n{\"clock\":9}\n");
        let stream: JsonlStream<Tick> = JsonlStream::open(file.path()).unwrap();

        assert_eq!(stream.len(), 3);
        assert_eq!(stream.read(2).unwrap().clock(), 9);
        assert_eq!(stream.read(0).unwrap().clock(), 5);
        assert_eq!(
            stream.read(3),
            Err(stripsync_core::Error::NotFound { index: 3, len: 3 })
        );
    }

    #[test]
    fn test_parse_error_line_number() {
        let file = write_lines("{\"clock\":5}\n\n{\"clock\":oops}\n");
        let stream: JsonlStream<Tick> = JsonlStream::open(file.path()).unwrap();

        match stream.record(1) {
            Err(Error::Parse { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected parse error, got {other:?}"),
        }
        assert!(matches!(
            stream.read(1),
            Err(stripsync_core::Error::InvalidRecord { index: 1, .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(JsonlStream::<Tick>::open("/nonexistent/stream.jsonl").is_err());
    }
}
