// rust/textdata-core/src/dataset/iterator.rs

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Result, ReaderError};

use super::traits::TextExample;

/// Yields the lines of a list of text files, one example per line.
///
/// Files are read in list order and opened lazily, one at a time, so an
/// unreadable file surfaces only when the reader reaches it. Trailing
/// whitespace (including the line terminator) is stripped; empty lines are
/// kept and yield empty examples.
///
/// After the first error the iterator is exhausted.
pub struct TextLines {
    files: Arc<[PathBuf]>,
    file_index: usize,
    current: Option<(PathBuf, Lines<BufReader<File>>)>,
    line_number: u64,
    exhausted: bool,
}

impl TextLines {
    /// Create a line reader over `files`.
    pub fn new(files: Arc<[PathBuf]>) -> Self {
        Self {
            files,
            file_index: 0,
            current: None,
            line_number: 0,
            exhausted: false,
        }
    }

    /// Read the next line across all files.
    ///
    /// Returns `Ok(None)` once every file has been read.
    ///
    /// # Errors
    ///
    /// Returns `ReaderError::Storage` if a file cannot be opened or a line
    /// cannot be read (including invalid UTF-8).
    pub fn next_example(&mut self) -> Result<Option<TextExample>> {
        if self.exhausted {
            return Ok(None);
        }

        loop {
            if self.current.is_none() && !self.open_next()? {
                self.exhausted = true;
                return Ok(None);
            }

            let Some((path, lines)) = self.current.as_mut() else {
                continue;
            };

            match lines.next() {
                Some(Ok(line)) => {
                    self.line_number += 1;
                    return Ok(Some(TextExample::new(line.trim_end())));
                }
                Some(Err(e)) => {
                    self.exhausted = true;
                    return Err(ReaderError::storage_with_source(
                        path.clone(),
                        format!("failed to read line {}", self.line_number + 1),
                        e,
                    ));
                }
                None => self.current = None,
            }
        }
    }

    /// Open the next file in the list. Returns `false` when none are left.
    fn open_next(&mut self) -> Result<bool> {
        let Some(path) = self.files.get(self.file_index).cloned() else {
            return Ok(false);
        };
        self.file_index += 1;
        self.line_number = 0;

        let file = File::open(&path).map_err(|e| {
            self.exhausted = true;
            ReaderError::storage_with_source(&path, "failed to open text file", e)
        })?;

        self.current = Some((path, BufReader::new(file).lines()));
        Ok(true)
    }
}

impl Iterator for TextLines {
    type Item = Result<TextExample>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_example().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn texts(iter: TextLines) -> Vec<String> {
        iter.map(|r| r.unwrap().text).collect()
    }

    #[test]
    fn test_reads_files_in_order() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        fs::write(&a, "one\ntwo\n").unwrap();
        fs::write(&b, "three\n").unwrap();

        let lines = TextLines::new(vec![a, b].into());
        assert_eq!(texts(lines), vec!["one", "two", "three"]);
    }

    #[test]
    fn test_strips_trailing_whitespace() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.txt");
        fs::write(&path, "  lead kept  \r\ntabs\t\t\nlast").unwrap();

        let lines = TextLines::new(vec![path].into());
        assert_eq!(texts(lines), vec!["  lead kept", "tabs", "last"]);
    }

    #[test]
    fn test_keeps_empty_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.txt");
        fs::write(&path, "a\n\n\nb\n").unwrap();

        let lines = TextLines::new(vec![path].into());
        assert_eq!(texts(lines), vec!["a", "", "", "b"]);
    }

    #[test]
    fn test_empty_file_list() {
        let mut lines = TextLines::new(Vec::new().into());
        assert!(lines.next().is_none());
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_missing_file_is_lazy_error() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.txt");
        fs::write(&good, "fine\n").unwrap();
        let missing = dir.path().join("missing.txt");

        let mut lines = TextLines::new(vec![good, missing].into());

        assert_eq!(lines.next().unwrap().unwrap().text, "fine");
        assert!(matches!(
            lines.next(),
            Some(Err(ReaderError::Storage { .. }))
        ));
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_invalid_utf8_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.txt");
        fs::write(&path, [b'o', b'k', b'\n', 0xff, 0xfe, b'\n']).unwrap();

        let mut lines = TextLines::new(vec![path].into());

        assert_eq!(lines.next().unwrap().unwrap().text, "ok");
        assert!(matches!(
            lines.next(),
            Some(Err(ReaderError::Storage { .. }))
        ));
        assert!(lines.next().is_none());
    }
}
