// rust/textdata-core/src/dataset/collate.rs

//! Padding and stacking of encoded examples into a rectangular batch.

use super::traits::{EncodedExample, PaddedSequences, SequenceData};
use crate::encoder::TokenId;
use crate::error::{Result, ReaderError};

/// Pads a group of encoded examples to a common length.
///
/// Collation is a pure function of its input, so a single `Collater` can be
/// shared by any number of worker threads.
#[derive(Debug, Clone)]
pub struct Collater {
    pad_value: Option<TokenId>,
    pad_to_multiple: usize,
}

impl Collater {
    /// Creates a collater. Without a `pad_value`, every group must already
    /// be of uniform length.
    pub fn new(pad_value: Option<TokenId>) -> Self {
        Self {
            pad_value,
            pad_to_multiple: 1,
        }
    }

    /// Rounds the padded length up to a multiple of `multiple`.
    ///
    /// # Errors
    ///
    /// Returns `ReaderError::Config` if `multiple` is zero, or if it is
    /// larger than one while no pad value is set.
    pub fn with_pad_to_multiple(mut self, multiple: usize) -> Result<Self> {
        if multiple == 0 {
            return Err(ReaderError::config("pad_to_multiple must be greater than 0"));
        }
        if multiple > 1 && self.pad_value.is_none() {
            return Err(ReaderError::config(
                "pad_to_multiple requires a pad value",
            ));
        }
        self.pad_to_multiple = multiple;
        Ok(self)
    }

    pub fn pad_value(&self) -> Option<TokenId> {
        self.pad_value
    }

    /// Collates `examples` into one padded batch.
    ///
    /// # Errors
    ///
    /// Returns `ReaderError::Collation` if the examples differ in length (or
    /// need rounding up) and no pad value is set.
    pub fn collate(&self, examples: &[EncodedExample]) -> Result<SequenceData> {
        let seq_lens: Vec<usize> = examples.iter().map(EncodedExample::seq_len).collect();

        let max_len = seq_lens.iter().copied().max().unwrap_or(0);
        let padded_len = max_len.div_ceil(self.pad_to_multiple) * self.pad_to_multiple;

        let is_ragged = seq_lens.iter().any(|&len| len != padded_len);

        let pad_value = match self.pad_value {
            Some(pad_value) => pad_value,
            None if is_ragged => {
                return Err(ReaderError::collation(format!(
                    "examples have different lengths ({}..={max_len}) and no pad value is set",
                    seq_lens.iter().copied().min().unwrap_or(0)
                )));
            }
            // Never written: every row is already full.
            None => 0,
        };

        let mut data = Vec::with_capacity(examples.len() * padded_len);
        for example in examples {
            data.extend_from_slice(&example.indices);
            data.resize(data.len() + padded_len - example.seq_len(), pad_value);
        }

        Ok(SequenceData {
            seqs: PaddedSequences::from_parts(data, examples.len(), padded_len),
            seq_lens,
            is_ragged,
        })
    }
}
