// rust/textdata-core/src/dataset/text.rs

//! Line-oriented text datasets.
//!
//! A [`GenericTextDataset`] is a sorted list of `.txt` files. Each call to
//! [`TextDataset::create_reader`] assembles a fresh lazy pipeline over the
//! files of the requested split:
//!
//! ```text
//! read -> example shuffle -> shard -> encode -> bucket/batch
//!      -> batch shuffle -> collate -> truncate -> prefetch -> wrap
//! ```
//!
//! Shuffling before sharding uses the same seed on every rank, so all ranks
//! agree on the pre-shard order without talking to each other. Randomness
//! after sharding is offset by the rank.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use super::bucketing::{Bucket, BucketByLength, BucketByLengthOptions};
use super::buckets::{create_bucket_sizes_aligned, BucketSpec};
use super::collate::Collater;
use super::files::{filter_split, list_text_files, SplitPattern, TEXT_FILE_EXTENSION};
use super::iterator::TextLines;
use super::options::{Batching, TextReadOptions};
use super::parallel::{ParallelMap, ParallelMapConfig};
use super::prefetch::{BoxedStream, PrefetchConfig, Prefetcher};
use super::reader::TextDataReader;
use super::sharding::Shard;
use super::shuffle::WindowShuffle;
use super::traits::{EncodedExample, SequenceData, TextExample};
use crate::encoder::{TextEncoder, TokenId};
use crate::error::{Result, ReaderError};
use crate::gang::{validate_coordinates, Gang};

/// Extras key holding a custom split pattern.
pub const SPLIT_PATTERN_KEY: &str = "split_pattern";

/// A dataset that can be read as batches of token sequences.
pub trait TextDataset {
    /// Creates a reader over `split` of the dataset.
    ///
    /// # Arguments
    ///
    /// * `text_encoder` - Turns each line into token ids.
    /// * `pad_idx` - Padding id; `None` requires uniformly long batches.
    /// * `gang` - Rank and world size of the calling process.
    /// * `min_seq_len` - Shortest sequence kept, in tokens.
    /// * `max_seq_len` - Longest sequence kept, in tokens.
    /// * `options` - Read options; defaults when `None`.
    /// * `split` - Split to read; all files when `None`.
    ///
    /// # Errors
    ///
    /// Fails before any file is read if the gang coordinates, the sequence
    /// bounds, the batching options or the split pattern are invalid.
    #[allow(clippy::too_many_arguments)]
    fn create_reader(
        &self,
        text_encoder: Arc<dyn TextEncoder>,
        pad_idx: Option<TokenId>,
        gang: &dyn Gang,
        min_seq_len: usize,
        max_seq_len: usize,
        options: Option<TextReadOptions>,
        split: Option<&str>,
    ) -> Result<TextDataReader>;
}

/// A text dataset backed by a list of files, one example per line.
#[derive(Debug, Clone)]
pub struct GenericTextDataset {
    name: String,
    root: Option<PathBuf>,
    files: Arc<[PathBuf]>,
}

impl GenericTextDataset {
    /// Creates a dataset over `files`, read in the given order.
    pub fn new(name: impl Into<String>, files: Vec<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: None,
            files: files.into(),
        }
    }

    /// Loads the dataset stored at `path`, either a single text file or a
    /// directory searched recursively for `.txt` files.
    ///
    /// # Errors
    ///
    /// Returns `ReaderError::DatasetLoad` if the directory cannot be walked.
    pub fn from_path(path: impl AsRef<Path>, name: impl Into<String>) -> Result<Self> {
        let path = path.as_ref();
        let name = name.into();

        let files = list_text_files(path, &name)?;

        tracing::info!(
            "Loaded text dataset '{}' from {} ({} files)",
            name,
            path.display(),
            files.len()
        );

        Ok(Self {
            name,
            root: path.is_dir().then(|| path.to_path_buf()),
            files: files.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory the dataset was loaded from, if any.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Files belonging to `split`, honouring a `split_pattern` extra.
    ///
    /// # Errors
    ///
    /// Returns `ReaderError::Config` if the split pattern is malformed.
    pub fn split_files(
        &self,
        split: Option<&str>,
        extras: &BTreeMap<String, toml::Value>,
    ) -> Result<Vec<PathBuf>> {
        let split_pattern = extras
            .get(SPLIT_PATTERN_KEY)
            .map(SplitPattern::from_value)
            .transpose()?;

        filter_split(
            &self.files,
            self.root(),
            split,
            TEXT_FILE_EXTENSION,
            split_pattern.as_ref(),
        )
    }
}

impl TextDataset for GenericTextDataset {
    fn create_reader(
        &self,
        text_encoder: Arc<dyn TextEncoder>,
        pad_idx: Option<TokenId>,
        gang: &dyn Gang,
        min_seq_len: usize,
        max_seq_len: usize,
        options: Option<TextReadOptions>,
        split: Option<&str>,
    ) -> Result<TextDataReader> {
        let options = options.unwrap_or_default();

        let rank = gang.rank();
        let world_size = gang.size();
        validate_coordinates(rank, world_size)?;

        if options.num_accumulate == 0 {
            return Err(ReaderError::config("num_accumulate must be greater than 0"));
        }
        if min_seq_len > max_seq_len {
            return Err(ReaderError::config(format!(
                "min_seq_len ({min_seq_len}) must be less than or equal to max_seq_len ({max_seq_len})"
            )));
        }

        let batching = BatchPlan::new(&options, min_seq_len, max_seq_len)?;

        let files = self.split_files(split, &options.extras)?;
        if files.is_empty() {
            tracing::warn!(
                "No files of dataset '{}' match split {:?}; the reader will be empty",
                self.name,
                split
            );
        }

        tracing::debug!(
            "Creating reader for '{}' (split {:?}): {} files, rank {}/{}, {} batching{}, seed {}",
            self.name,
            split,
            files.len(),
            rank,
            world_size,
            options.batching.kind(),
            batching.describe(),
            options.seed
        );

        let plan = ReadPlan {
            dataset_name: self.name.clone(),
            split: split.map(str::to_string),
            files: files.into(),
            encoder: text_encoder,
            collater: Collater::new(pad_idx),
            rank,
            world_size,
            batching,
            options,
        };

        TextDataReader::new(Arc::new(plan))
    }
}

/// Batch construction resolved at reader creation.
#[derive(Debug, Clone)]
enum BatchPlan {
    Length {
        spec: BucketSpec,
        options: BucketByLengthOptions,
    },
    Static {
        batch_size: usize,
        min_seq_len: usize,
        max_seq_len: usize,
        drop_remainder: bool,
    },
}

impl BatchPlan {
    fn new(options: &TextReadOptions, min_seq_len: usize, max_seq_len: usize) -> Result<Self> {
        match &options.batching {
            Batching::Length(length) => {
                let spec = create_bucket_sizes_aligned(
                    max_seq_len,
                    min_seq_len,
                    length.max_num_elements,
                    length.num_seqs_multiple_of,
                )?;

                Ok(Self::Length {
                    spec,
                    options: BucketByLengthOptions {
                        min_data_len: min_seq_len,
                        skip_below_min_examples: length.skip_below_min_examples,
                        skip_above_max_examples: length.skip_above_max_examples,
                        drop_remainder: options.drop_remainder,
                    },
                })
            }
            Batching::Static(batching) => {
                if batching.batch_size == 0 {
                    return Err(ReaderError::config("batch_size must be greater than 0"));
                }

                Ok(Self::Static {
                    batch_size: batching.batch_size,
                    min_seq_len,
                    max_seq_len,
                    drop_remainder: options.drop_remainder,
                })
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Length { spec, .. } => format!(" ({} buckets)", spec.len()),
            Self::Static { batch_size, .. } => format!(" (batch size {batch_size})"),
        }
    }
}

/// A collated batch together with the examples it was built from.
pub(crate) type Collated = (SequenceData, Vec<EncodedExample>);

/// Everything needed to (re)build the pipeline of one reader.
pub(crate) struct ReadPlan {
    pub(crate) dataset_name: String,
    pub(crate) split: Option<String>,
    files: Arc<[PathBuf]>,
    encoder: Arc<dyn TextEncoder>,
    collater: Collater,
    rank: u32,
    world_size: u32,
    batching: BatchPlan,
    pub(crate) options: TextReadOptions,
}

impl ReadPlan {
    /// Builds the pipeline and starts prefetching.
    pub(crate) fn start(&self) -> Result<Prefetcher<Collated>> {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stream = self.stream(&stop_flag)?;

        let config = PrefetchConfig {
            buffer_size: self.options.num_prefetch,
            thread_name: format!("textdata-prefetch-{}", self.rank),
            stop_flag: Some(stop_flag),
        };

        Prefetcher::new(stream, config)
    }

    /// Stages from reading through truncation. The shuffles watch
    /// `stop_flag` so a stopped reader does not wait for a full window.
    fn stream(&self, stop_flag: &Arc<AtomicBool>) -> Result<BoxedStream<Collated>> {
        let options = &self.options;

        let mut seed = options.seed;

        let mut examples: BoxedStream<TextExample> = Box::new(TextLines::new(self.files.clone()));

        if options.example_shuffle_window != 1 {
            examples = Box::new(
                WindowShuffle::new(examples, options.example_shuffle_window, seed)
                    .with_stop_flag(stop_flag.clone()),
            );
        }

        seed = seed.wrapping_add(1);

        examples = Box::new(Shard::new(examples, self.rank, self.world_size, true)?);

        seed = seed.wrapping_add(u64::from(self.rank));

        let encoder = self.encoder.clone();
        let encoded = examples.map(move |example: Result<TextExample>| -> Result<EncodedExample> {
            let example = example?;
            let indices = encoder.encode(&example.text)?;
            Ok(EncodedExample {
                text: example.text,
                indices,
            })
        });

        let mut batches: BoxedStream<Vec<EncodedExample>> = match &self.batching {
            BatchPlan::Length { spec, options } => Box::new(BucketByLength::new(
                encoded,
                spec.clone(),
                EncodedExample::seq_len,
                options.clone(),
                self.dataset_name.clone(),
            )),
            BatchPlan::Static {
                batch_size,
                min_seq_len,
                max_seq_len,
                drop_remainder,
            } => {
                let (min_seq_len, max_seq_len) = (*min_seq_len, *max_seq_len);
                let filtered = encoded.filter(move |example| match example {
                    Ok(example) => (min_seq_len..=max_seq_len).contains(&example.seq_len()),
                    Err(_) => true,
                });
                Box::new(Bucket::new(filtered, *batch_size, *drop_remainder)?)
            }
        };

        seed = seed.wrapping_add(1);

        if options.batch_shuffle_window != 1 {
            batches = Box::new(
                WindowShuffle::new(batches, options.batch_shuffle_window, seed)
                    .with_stop_flag(stop_flag.clone()),
            );
        }

        let collater = self.collater.clone();
        let collated = ParallelMap::new(
            batches,
            move |batch: Vec<EncodedExample>| -> Result<Collated> {
                let data = collater.collate(&batch)?;
                Ok((data, batch))
            },
            ParallelMapConfig {
                num_parallel_calls: options.npc,
                thread_name: format!("textdata-collate-{}", self.rank),
                max_items: options.max_num_batches,
            },
        )?;

        let mut stream: BoxedStream<Collated> = Box::new(collated);

        if let Some(max_num_batches) = options.max_num_batches {
            stream = Box::new(stream.take(max_num_batches));
        }

        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::options::{LengthBatching, StaticBatching};
    use crate::dataset::traits::SequenceBatch;
    use crate::encoder::ByteEncoder;
    use crate::gang::LocalGang;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn write_lines(path: &Path, lines: &[String]) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, lines.join("\n")).unwrap();
    }

    fn numbered(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{prefix}-{i:04}")).collect()
    }

    fn encoder() -> Arc<dyn TextEncoder> {
        Arc::new(ByteEncoder::new(4))
    }

    fn static_options(batch_size: usize) -> TextReadOptions {
        TextReadOptions {
            batching: Batching::Static(StaticBatching { batch_size }),
            ..Default::default()
        }
    }

    fn read_all(
        dataset: &GenericTextDataset,
        gang: &dyn Gang,
        options: TextReadOptions,
        split: Option<&str>,
    ) -> Vec<SequenceBatch> {
        dataset
            .create_reader(encoder(), Some(0), gang, 1, 1024, Some(options), split)
            .unwrap()
            .map(|b| b.unwrap())
            .collect()
    }

    fn texts(batches: &[SequenceBatch]) -> Vec<String> {
        batches
            .iter()
            .flat_map(|b| b.examples.iter().map(|e| e.text.clone()))
            .collect()
    }

    struct CountingEncoder {
        calls: Arc<AtomicUsize>,
    }

    impl TextEncoder for CountingEncoder {
        fn encode(&self, text: &str) -> Result<Vec<TokenId>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ByteEncoder::new(4).encode(text)
        }
    }

    struct FixedGang(u32, u32);

    impl Gang for FixedGang {
        fn rank(&self) -> u32 {
            self.0
        }

        fn size(&self) -> u32 {
            self.1
        }
    }

    #[test]
    fn test_from_path_single_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.txt");
        write_lines(&path, &numbered("a", 3));

        let dataset = GenericTextDataset::from_path(&path, "single").unwrap();
        assert_eq!(dataset.name(), "single");
        assert_eq!(dataset.files(), &[path]);
        assert!(dataset.root().is_none());
    }

    #[test]
    fn test_from_path_directory_sorted() {
        let dir = TempDir::new().unwrap();
        write_lines(&dir.path().join("b/train.txt"), &numbered("b", 1));
        write_lines(&dir.path().join("a.txt"), &numbered("a", 1));
        write_lines(&dir.path().join("notes.md"), &numbered("n", 1));

        let dataset = GenericTextDataset::from_path(dir.path(), "dir").unwrap();
        assert_eq!(
            dataset.files(),
            &[dir.path().join("a.txt"), dir.path().join("b/train.txt")]
        );
        assert_eq!(dataset.root(), Some(dir.path()));
    }

    #[test]
    fn test_reads_lines_in_file_order() {
        let dir = TempDir::new().unwrap();
        write_lines(&dir.path().join("0.txt"), &numbered("x", 3));
        write_lines(&dir.path().join("1.txt"), &numbered("y", 2));

        let dataset = GenericTextDataset::from_path(dir.path(), "ordered").unwrap();
        let batches = read_all(&dataset, &LocalGang::single(), static_options(2), None);

        assert_eq!(
            texts(&batches),
            vec!["x-0000", "x-0001", "x-0002", "y-0000", "y-0001"]
        );
        assert_eq!(batches.len(), 3);
    }

    #[test]
    fn test_reader_is_deterministic() {
        let dir = TempDir::new().unwrap();
        write_lines(&dir.path().join("train.txt"), &numbered("line", 200));
        let dataset = GenericTextDataset::from_path(dir.path(), "det").unwrap();

        let options = |seed| TextReadOptions {
            seed,
            example_shuffle_window: 0,
            batch_shuffle_window: 4,
            ..static_options(3)
        };

        let gang = LocalGang::new(1, 2).unwrap();
        let a = texts(&read_all(&dataset, &gang, options(7), Some("train")));
        let b = texts(&read_all(&dataset, &gang, options(7), Some("train")));
        let c = texts(&read_all(&dataset, &gang, options(8), Some("train")));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 100);
    }

    #[test]
    fn test_batch_shuffle_seed_includes_rank() {
        let dir = TempDir::new().unwrap();
        let lines = numbered("line", 60);
        write_lines(&dir.path().join("train.txt"), &lines);
        let dataset = GenericTextDataset::from_path(dir.path(), "seeded").unwrap();

        let seed = 11;
        let options = TextReadOptions {
            seed,
            example_shuffle_window: 1,
            batch_shuffle_window: 4,
            ..static_options(3)
        };

        let gang = LocalGang::new(1, 2).unwrap();
        let batches: Vec<Vec<String>> = read_all(&dataset, &gang, options, Some("train"))
            .iter()
            .map(|b| b.examples.iter().map(|e| e.text.clone()).collect())
            .collect();

        // Rank 1 keeps the odd lines; static batches of three, then the
        // batch shuffle seeded with seed + 2 + rank.
        let ordered: Vec<Vec<String>> = lines
            .iter()
            .skip(1)
            .step_by(2)
            .cloned()
            .collect::<Vec<_>>()
            .chunks(3)
            .map(<[String]>::to_vec)
            .collect();
        let source = ordered.into_iter().map(Ok::<_, ReaderError>);
        let expected: Vec<Vec<String>> = WindowShuffle::new(source, 4, seed + 2 + 1)
            .map(|b| b.unwrap())
            .collect();

        assert_eq!(batches, expected);
    }

    #[test]
    fn test_example_shuffle_uses_seed() {
        let dir = TempDir::new().unwrap();
        let lines = numbered("line", 40);
        write_lines(&dir.path().join("train.txt"), &lines);
        let dataset = GenericTextDataset::from_path(dir.path(), "seeded").unwrap();

        let seed = 5;
        let options = TextReadOptions {
            seed,
            example_shuffle_window: 0,
            batch_shuffle_window: 1,
            ..static_options(1)
        };

        let read = texts(&read_all(&dataset, &LocalGang::single(), options, Some("train")));
        let source = lines.into_iter().map(Ok::<_, ReaderError>);
        let expected: Vec<String> = WindowShuffle::new(source, 0, seed)
            .map(|line| line.unwrap())
            .collect();

        assert_eq!(read, expected);
    }

    #[test]
    fn test_shards_partition_the_stream() {
        let dir = TempDir::new().unwrap();
        let lines = numbered("line", 101);
        write_lines(&dir.path().join("train.txt"), &lines);
        let dataset = GenericTextDataset::from_path(dir.path(), "sharded").unwrap();

        let options = TextReadOptions {
            example_shuffle_window: 0,
            batch_shuffle_window: 0,
            ..static_options(4)
        };

        let mut all = Vec::new();
        for rank in 0..3 {
            let gang = LocalGang::new(rank, 3).unwrap();
            let shard = texts(&read_all(&dataset, &gang, options.clone(), None));
            assert!((33..=34).contains(&shard.len()));
            all.extend(shard);
        }

        all.sort();
        assert_eq!(all, lines);
    }

    #[test]
    fn test_shard_sees_shuffled_global_order() {
        let dir = TempDir::new().unwrap();
        write_lines(&dir.path().join("train.txt"), &numbered("line", 60));
        let dataset = GenericTextDataset::from_path(dir.path(), "global").unwrap();

        let options = TextReadOptions {
            example_shuffle_window: 0,
            ..static_options(1)
        };

        let full = texts(&read_all(&dataset, &LocalGang::single(), options.clone(), None));
        let rank1 = texts(&read_all(
            &dataset,
            &LocalGang::new(1, 2).unwrap(),
            options,
            None,
        ));

        let expected: Vec<String> = full.into_iter().skip(1).step_by(2).collect();
        assert_eq!(rank1, expected);
    }

    #[test]
    fn test_static_batching_filters_lengths() {
        let dir = TempDir::new().unwrap();
        let lines: Vec<String> = (1..=20).map(|n| "x".repeat(n)).collect();
        write_lines(&dir.path().join("train.txt"), &lines);
        let dataset = GenericTextDataset::from_path(dir.path(), "lengths").unwrap();

        let batches: Vec<SequenceBatch> = dataset
            .create_reader(
                encoder(),
                Some(0),
                &LocalGang::single(),
                5,
                10,
                Some(static_options(4)),
                None,
            )
            .unwrap()
            .map(|b| b.unwrap())
            .collect();

        let lens: Vec<usize> = batches.iter().flat_map(|b| b.seq_lens.clone()).collect();
        assert_eq!(lens, vec![5, 6, 7, 8, 9, 10]);
    }

    #[test]
    fn test_static_batching_drop_remainder() {
        let dir = TempDir::new().unwrap();
        write_lines(&dir.path().join("train.txt"), &numbered("r", 7));
        let dataset = GenericTextDataset::from_path(dir.path(), "remainder").unwrap();

        let kept = read_all(&dataset, &LocalGang::single(), static_options(3), None);
        let sizes: Vec<usize> = kept.iter().map(SequenceBatch::batch_size).collect();
        assert_eq!(sizes, vec![3, 3, 1]);

        let options = TextReadOptions {
            drop_remainder: true,
            ..static_options(3)
        };
        let dropped = read_all(&dataset, &LocalGang::single(), options, None);
        let sizes: Vec<usize> = dropped.iter().map(SequenceBatch::batch_size).collect();
        assert_eq!(sizes, vec![3, 3]);
    }

    #[test]
    fn test_length_batching_bounds_batch_area() {
        let dir = TempDir::new().unwrap();
        let lines: Vec<String> = (0..300).map(|i| "w".repeat(1 + (i * 7) % 40)).collect();
        write_lines(&dir.path().join("train.txt"), &lines);
        let dataset = GenericTextDataset::from_path(dir.path(), "length").unwrap();

        let options = TextReadOptions {
            batching: Batching::Length(LengthBatching::new(64)),
            ..Default::default()
        };

        let batches: Vec<SequenceBatch> = dataset
            .create_reader(
                encoder(),
                Some(0),
                &LocalGang::single(),
                4,
                32,
                Some(options),
                None,
            )
            .unwrap()
            .map(|b| b.unwrap())
            .collect();

        assert!(!batches.is_empty());
        for batch in &batches {
            let (rows, cols) = batch.seqs.shape();
            assert_eq!(rows, batch.seq_lens.len());
            assert!(batch.max_seq_len() <= cols);
            assert!(batch.seq_lens.iter().all(|&len| (4..=32).contains(&len)));
            assert!(rows * batch.max_seq_len() <= 64);

            for (row, &len) in batch.seqs.rows().zip(&batch.seq_lens) {
                assert!(row[len..].iter().all(|&t| t == 0));
            }
        }

        let kept: usize = batches.iter().map(SequenceBatch::batch_size).sum();
        let expected = lines.iter().filter(|l| (4..=32).contains(&l.len())).count();
        assert_eq!(kept, expected);
    }

    #[test]
    fn test_length_batching_strict_max() {
        let dir = TempDir::new().unwrap();
        write_lines(&dir.path().join("train.txt"), &["short".to_string(), "x".repeat(50)]);
        let dataset = GenericTextDataset::from_path(dir.path(), "strict").unwrap();

        let options = TextReadOptions {
            batching: Batching::Length(LengthBatching {
                skip_above_max_examples: false,
                ..LengthBatching::new(64)
            }),
            ..Default::default()
        };

        let results: Vec<_> = dataset
            .create_reader(encoder(), Some(0), &LocalGang::single(), 1, 32, Some(options), None)
            .unwrap()
            .collect();

        assert!(matches!(
            results.last(),
            Some(Err(ReaderError::Dataset { .. }))
        ));
    }

    #[test]
    fn test_max_num_batches_stops_reading() {
        let dir = TempDir::new().unwrap();
        write_lines(&dir.path().join("train.txt"), &numbered("big", 1000));
        let dataset = GenericTextDataset::from_path(dir.path(), "capped").unwrap();

        for (num_prefetch, npc) in [(0, 1), (2, 1), (0, 4), (2, 4)] {
            let calls = Arc::new(AtomicUsize::new(0));
            let encoder = Arc::new(CountingEncoder {
                calls: calls.clone(),
            });

            let options = TextReadOptions {
                max_num_batches: Some(5),
                num_prefetch,
                npc,
                ..static_options(1)
            };

            let batches: Vec<_> = dataset
                .create_reader(encoder, Some(0), &LocalGang::single(), 1, 64, Some(options), None)
                .unwrap()
                .collect();

            assert_eq!(batches.len(), 5);
            assert_eq!(calls.load(Ordering::SeqCst), 5, "npc={npc} prefetch={num_prefetch}");
        }
    }

    #[test]
    fn test_split_selection() {
        let dir = TempDir::new().unwrap();
        write_lines(&dir.path().join("train.txt"), &numbered("train", 3));
        write_lines(&dir.path().join("valid.txt"), &numbered("valid", 2));
        write_lines(&dir.path().join("train-data.txt"), &numbered("custom", 4));
        let dataset = GenericTextDataset::from_path(dir.path(), "splits").unwrap();

        let train = texts(&read_all(&dataset, &LocalGang::single(), static_options(8), Some("train")));
        assert_eq!(train, numbered("train", 3));

        let mut options = static_options(8);
        options.extras.insert(
            SPLIT_PATTERN_KEY.to_string(),
            toml::Value::String("{split}-data.{ext}".to_string()),
        );
        let custom = texts(&read_all(&dataset, &LocalGang::single(), options, Some("train")));
        assert_eq!(custom, numbered("custom", 4));

        let everything = read_all(&dataset, &LocalGang::single(), static_options(100), None);
        assert_eq!(everything[0].batch_size(), 9);
    }

    #[test]
    fn test_unknown_split_yields_nothing() {
        let dir = TempDir::new().unwrap();
        write_lines(&dir.path().join("train.txt"), &numbered("train", 3));
        let dataset = GenericTextDataset::from_path(dir.path(), "nosplit").unwrap();

        let batches = read_all(&dataset, &LocalGang::single(), static_options(1), Some("test"));
        assert!(batches.is_empty());
    }

    #[test]
    fn test_encoder_error_ends_read() {
        let dir = TempDir::new().unwrap();
        write_lines(
            &dir.path().join("train.txt"),
            &["ok".to_string(), "bad".to_string(), "never".to_string()],
        );
        let dataset = GenericTextDataset::from_path(dir.path(), "encoding").unwrap();

        fn picky(text: &str) -> Result<Vec<TokenId>> {
            if text == "bad" {
                return Err(ReaderError::encoding("unencodable line"));
            }
            ByteEncoder::new(4).encode(text)
        }

        let mut reader = dataset
            .create_reader(
                Arc::new(picky),
                Some(0),
                &LocalGang::single(),
                1,
                64,
                Some(static_options(1)),
                None,
            )
            .unwrap();

        assert_eq!(reader.next().unwrap().unwrap().examples[0].text, "ok");
        assert!(matches!(
            reader.next(),
            Some(Err(ReaderError::Encoding { .. }))
        ));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_ragged_batch_without_pad_fails() {
        let dir = TempDir::new().unwrap();
        write_lines(&dir.path().join("train.txt"), &["a".to_string(), "bb".to_string()]);
        let dataset = GenericTextDataset::from_path(dir.path(), "nopad").unwrap();

        let results: Vec<_> = dataset
            .create_reader(encoder(), None, &LocalGang::single(), 1, 8, Some(static_options(2)), None)
            .unwrap()
            .collect();

        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(ReaderError::Collation { .. })));
    }

    #[test]
    fn test_parallel_collation_matches_sequential() {
        let dir = TempDir::new().unwrap();
        let lines: Vec<String> = (0..120).map(|i| "z".repeat(1 + i % 17)).collect();
        write_lines(&dir.path().join("train.txt"), &lines);
        let dataset = GenericTextDataset::from_path(dir.path(), "npc").unwrap();

        let options = |npc| TextReadOptions {
            npc,
            example_shuffle_window: 16,
            ..static_options(5)
        };

        let sequential = read_all(&dataset, &LocalGang::single(), options(1), None);
        let parallel = read_all(&dataset, &LocalGang::single(), options(4), None);

        assert_eq!(sequential.len(), parallel.len());
        for (a, b) in sequential.iter().zip(&parallel) {
            assert_eq!(a.seqs, b.seqs);
            assert_eq!(a.seq_lens, b.seq_lens);
        }
    }

    #[test]
    fn test_invalid_configuration_is_rejected_up_front() {
        let dataset = GenericTextDataset::new("empty", Vec::new());
        let gang = LocalGang::single();

        let bad_gang = dataset.create_reader(encoder(), Some(0), &FixedGang(2, 2), 1, 8, None, None);
        assert!(matches!(bad_gang, Err(ReaderError::InvalidShard { .. })));

        let bad_batch = dataset.create_reader(encoder(), Some(0), &gang, 1, 8, Some(static_options(0)), None);
        assert!(matches!(bad_batch, Err(ReaderError::Config { .. })));

        let bad_bounds = dataset.create_reader(encoder(), Some(0), &gang, 9, 8, None, None);
        assert!(matches!(bad_bounds, Err(ReaderError::Config { .. })));

        let length = TextReadOptions {
            batching: Batching::Length(LengthBatching::new(4)),
            ..Default::default()
        };
        let bad_length = dataset.create_reader(encoder(), Some(0), &gang, 1, 8, Some(length), None);
        assert!(matches!(bad_length, Err(ReaderError::Config { .. })));

        let mut pattern = TextReadOptions::default();
        pattern
            .extras
            .insert(SPLIT_PATTERN_KEY.to_string(), toml::Value::Integer(3));
        let bad_pattern = dataset.create_reader(encoder(), Some(0), &gang, 1, 8, Some(pattern), Some("train"));
        assert!(matches!(bad_pattern, Err(ReaderError::Config { .. })));
    }

    #[test]
    fn test_missing_file_surfaces_storage_error() {
        let dir = TempDir::new().unwrap();
        let dataset = GenericTextDataset::new("missing", vec![dir.path().join("gone.txt")]);

        let mut reader = dataset
            .create_reader(encoder(), Some(0), &LocalGang::single(), 1, 8, None, None)
            .unwrap();

        assert!(matches!(
            reader.next(),
            Some(Err(ReaderError::Storage { .. }))
        ));
        assert!(reader.next().is_none());
    }
}
