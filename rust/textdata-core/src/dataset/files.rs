// rust/textdata-core/src/dataset/files.rs

//! Discovery of dataset files and selection of split files.

use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::error::{Result, ReaderError};

/// Extension of the files making up a text dataset.
pub const TEXT_FILE_EXTENSION: &str = "txt";

/// Patterns used when no `split_pattern` extra is given.
pub const DEFAULT_SPLIT_PATTERNS: [&str; 2] = ["**/{split}.{ext}", "{split}/*.{ext}"];

/// Lists the text files of a dataset.
///
/// A path that is not a directory is taken as the only file of the dataset.
/// Otherwise all `*.txt` files below the directory are returned, sorted by
/// path so that every process sees the same order.
///
/// # Errors
///
/// Returns `ReaderError::DatasetLoad` if the directory cannot be walked.
pub fn list_text_files(path: &Path, name: &str) -> Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();

    for entry in WalkDir::new(path).follow_links(true) {
        let entry = entry.map_err(|e| {
            ReaderError::dataset_load_with_source(
                name,
                format!(
                    "the text files under the '{}' directory cannot be retrieved",
                    path.display()
                ),
                e,
            )
        })?;

        if entry.file_type().is_dir() {
            continue;
        }

        let is_text = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == TEXT_FILE_EXTENSION);

        if is_text {
            files.push(entry.into_path());
        }
    }

    files.sort();

    Ok(files)
}

/// One or more glob patterns selecting the files of a split.
///
/// Patterns may contain `{split}` and `{ext}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitPattern {
    One(String),
    Many(Vec<String>),
}

impl SplitPattern {
    /// Reads a pattern from a free-form option value (a string or an array
    /// of strings).
    ///
    /// # Errors
    ///
    /// Returns `ReaderError::Config` for any other value type.
    pub fn from_value(value: &toml::Value) -> Result<Self> {
        match value {
            toml::Value::String(pattern) => Ok(Self::One(pattern.clone())),
            toml::Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        ReaderError::config(format!(
                            "split_pattern entries must be strings, got {}",
                            item.type_str()
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()
                .map(Self::Many),
            other => Err(ReaderError::config(format!(
                "split_pattern must be a string or an array of strings, got {}",
                other.type_str()
            ))),
        }
    }

    fn patterns(&self) -> Vec<&str> {
        match self {
            Self::One(pattern) => vec![pattern.as_str()],
            Self::Many(patterns) => patterns.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for SplitPattern {
    fn from(pattern: &str) -> Self {
        Self::One(pattern.to_string())
    }
}

/// Selects the files belonging to `split`.
///
/// Patterns containing a `/` are matched against the path relative to
/// `base`. Without a base they match if any trailing part of the path
/// does, so `train/*.txt` selects `/data/corpus/train/a.txt`. Patterns
/// without a `/` are matched against the file name. With `split == None` every file is
/// returned.
///
/// # Errors
///
/// Returns `ReaderError::Config` if a pattern is not a valid glob.
pub fn filter_split(
    files: &[PathBuf],
    base: Option<&Path>,
    split: Option<&str>,
    extension: &str,
    split_pattern: Option<&SplitPattern>,
) -> Result<Vec<PathBuf>> {
    let Some(split) = split else {
        return Ok(files.to_vec());
    };

    let raw_patterns = match split_pattern {
        Some(pattern) => pattern.patterns(),
        None => DEFAULT_SPLIT_PATTERNS.to_vec(),
    };

    let matcher = SplitMatcher::new(&raw_patterns, split, extension)?;

    Ok(files
        .iter()
        .filter(|file| matcher.is_match(file, base))
        .cloned()
        .collect())
}

struct SplitMatcher {
    by_path: GlobSet,
    by_name: GlobSet,
}

impl SplitMatcher {
    fn new(raw_patterns: &[&str], split: &str, extension: &str) -> Result<Self> {
        let mut by_path = GlobSetBuilder::new();
        let mut by_name = GlobSetBuilder::new();

        for raw in raw_patterns {
            let pattern = raw.replace("{split}", split).replace("{ext}", extension);

            let glob = GlobBuilder::new(&pattern)
                .literal_separator(true)
                .build()
                .map_err(|e| {
                    ReaderError::config_with_source(format!("invalid split pattern '{pattern}'"), e)
                })?;

            if pattern.contains('/') {
                by_path.add(glob);
            } else {
                by_name.add(glob);
            }
        }

        let by_path = by_path
            .build()
            .map_err(|e| ReaderError::config_with_source("invalid split patterns", e))?;
        let by_name = by_name
            .build()
            .map_err(|e| ReaderError::config_with_source("invalid split patterns", e))?;

        Ok(Self { by_path, by_name })
    }

    fn is_match(&self, file: &Path, base: Option<&Path>) -> bool {
        if !self.by_path.is_empty() {
            let by_path = match base.and_then(|base| file.strip_prefix(base).ok()) {
                Some(relative) => self.by_path.is_match(relative),
                // No root to strip: any trailing part of the path may be
                // the dataset-relative one.
                None => (0..file.iter().count()).any(|skip| {
                    self.by_path
                        .is_match(file.iter().skip(skip).collect::<PathBuf>())
                }),
            };

            if by_path {
                return true;
            }
        }

        file.file_name()
            .is_some_and(|file_name| self.by_name.is_match(file_name))
    }
}
