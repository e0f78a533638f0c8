// rust/textdata-core/src/dataset/traits.rs

use crate::encoder::TokenId;

/// A single line of a text file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextExample {
    pub text: String,
}

impl TextExample {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A text example after it went through the token encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedExample {
    pub text: String,
    pub indices: Vec<TokenId>,
}

impl EncodedExample {
    /// Number of tokens in the example.
    pub fn seq_len(&self) -> usize {
        self.indices.len()
    }
}

/// A row-major `batch x padded_len` buffer of token ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaddedSequences {
    data: Vec<TokenId>,
    num_rows: usize,
    num_cols: usize,
}

impl PaddedSequences {
    pub(crate) fn from_parts(data: Vec<TokenId>, num_rows: usize, num_cols: usize) -> Self {
        debug_assert_eq!(data.len(), num_rows * num_cols);
        Self {
            data,
            num_rows,
            num_cols,
        }
    }

    /// Returns `(batch_size, padded_len)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.num_rows, self.num_cols)
    }

    /// Returns row `i`, including its padding.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of range.
    pub fn row(&self, i: usize) -> &[TokenId] {
        let start = i * self.num_cols;
        &self.data[start..start + self.num_cols]
    }

    /// Iterates over all rows.
    pub fn rows(&self) -> impl Iterator<Item = &[TokenId]> {
        (0..self.num_rows).map(move |i| self.row(i))
    }

    /// The flat row-major buffer.
    pub fn as_slice(&self) -> &[TokenId] {
        &self.data
    }
}

/// Output of collation: padded sequences plus the length of each row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceData {
    pub seqs: PaddedSequences,
    pub seq_lens: Vec<usize>,
    /// True if at least one row carries padding.
    pub is_ragged: bool,
}

/// A batch of padded token sequences as handed to the training loop.
///
/// Keeps the examples it was built from so callers can inspect the
/// original text.
#[derive(Debug, Clone)]
pub struct SequenceBatch {
    pub seqs: PaddedSequences,
    pub seq_lens: Vec<usize>,
    pub examples: Vec<EncodedExample>,
}

impl SequenceBatch {
    pub(crate) fn new(data: SequenceData, examples: Vec<EncodedExample>) -> Self {
        Self {
            seqs: data.seqs,
            seq_lens: data.seq_lens,
            examples,
        }
    }

    /// Number of sequences in the batch.
    pub fn batch_size(&self) -> usize {
        self.seq_lens.len()
    }

    /// Number of non-padding elements.
    pub fn num_elements(&self) -> usize {
        self.seq_lens.iter().sum()
    }

    /// Longest sequence in the batch.
    pub fn max_seq_len(&self) -> usize {
        self.seq_lens.iter().copied().max().unwrap_or(0)
    }

    /// Per-row mask, `true` on real tokens and `false` on padding.
    pub fn padding_mask(&self) -> Vec<Vec<bool>> {
        let (_, padded_len) = self.seqs.shape();
        self.seq_lens
            .iter()
            .map(|&len| (0..padded_len).map(|pos| pos < len).collect())
            .collect()
    }
}
