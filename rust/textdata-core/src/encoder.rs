// rust/textdata-core/src/encoder.rs

//! Token encoder seam.
//!
//! Tokenizers live outside this crate. The reader only needs something that
//! turns a line of text into token ids; anything implementing
//! [`TextEncoder`] (including plain closures) can be plugged in.

use crate::error::{Result, ReaderError};

/// Integer id of a token in the encoder's vocabulary.
pub type TokenId = u32;

/// Turns raw text into an ordered sequence of token ids.
///
/// Encoders are shared between the reader and its background workers, so
/// they must be `Send + Sync`. Errors are propagated unchanged and end the
/// read.
pub trait TextEncoder: Send + Sync {
    fn encode(&self, text: &str) -> Result<Vec<TokenId>>;
}

impl<F> TextEncoder for F
where
    F: Fn(&str) -> Result<Vec<TokenId>> + Send + Sync,
{
    fn encode(&self, text: &str) -> Result<Vec<TokenId>> {
        self(text)
    }
}

/// Encodes text as its UTF-8 bytes, shifted past a block of reserved ids.
///
/// Not a real tokenizer. Useful for smoke runs of the pipeline when no
/// vocabulary is at hand.
#[derive(Debug, Clone)]
pub struct ByteEncoder {
    offset: TokenId,
    bos_idx: Option<TokenId>,
    eos_idx: Option<TokenId>,
}

impl ByteEncoder {
    /// Creates an encoder mapping byte `b` to `offset + b`.
    pub fn new(offset: TokenId) -> Self {
        Self {
            offset,
            bos_idx: None,
            eos_idx: None,
        }
    }

    /// Prepends `idx` to every encoded sequence.
    pub fn with_bos(mut self, idx: TokenId) -> Self {
        self.bos_idx = Some(idx);
        self
    }

    /// Appends `idx` to every encoded sequence.
    pub fn with_eos(mut self, idx: TokenId) -> Self {
        self.eos_idx = Some(idx);
        self
    }

    /// Size of the vocabulary this encoder can produce.
    pub fn vocab_size(&self) -> usize {
        self.offset as usize + 256
    }
}

impl Default for ByteEncoder {
    /// Reserves ids 0..4 for pad, unk, bos and eos.
    fn default() -> Self {
        Self::new(4).with_bos(2).with_eos(3)
    }
}

impl TextEncoder for ByteEncoder {
    fn encode(&self, text: &str) -> Result<Vec<TokenId>> {
        let mut indices = Vec::with_capacity(text.len() + 2);

        if let Some(bos) = self.bos_idx {
            indices.push(bos);
        }

        for byte in text.bytes() {
            let idx = self.offset.checked_add(byte as TokenId).ok_or_else(|| {
                ReaderError::encoding(format!("token id overflow for offset {}", self.offset))
            })?;
            indices.push(idx);
        }

        if let Some(eos) = self.eos_idx {
            indices.push(eos);
        }

        Ok(indices)
    }
}
