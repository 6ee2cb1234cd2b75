//! Truncating wrapper over a HuggingFace `tokenizer.json` tokenizer.
//!
//! Two views of the same tokenizer are kept:
//! - [`TextTokenizer::encode`] adds special tokens (`[CLS]`, `[SEP]`, ...)
//!   and truncates to `max_length`, dropping the overflow silently
//! - [`TextTokenizer::tokenize`] returns bare tokens with no truncation,
//!   used to tokenize a phrase on its own

use tokenizers::{Tokenizer, TruncationParams};

use crate::Result;

/// One encoded text, ready for the encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedText {
    pub ids: Vec<u32>,
    pub type_ids: Vec<u32>,
    pub tokens: Vec<String>,
    /// Whether tokens were dropped to fit `max_length`.
    pub truncated: bool,
}

impl EncodedText {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Clone)]
pub struct TextTokenizer {
    truncating: Tokenizer,
    plain: Tokenizer,
    max_length: usize,
}

impl TextTokenizer {
    /// Wrap an already-built tokenizer. Any padding it carries is removed.
    pub fn new(tokenizer: Tokenizer, max_length: usize) -> Result<Self> {
        let mut plain = tokenizer;
        plain.with_padding(None);
        plain.with_truncation(None)?;

        let mut truncating = plain.clone();
        truncating.with_truncation(Some(TruncationParams {
            max_length,
            ..Default::default()
        }))?;

        Ok(Self {
            truncating,
            plain,
            max_length,
        })
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Encode with special tokens, truncated to `max_length`.
    pub fn encode(&self, text: &str) -> Result<EncodedText> {
        let encoding = self.truncating.encode(text, true)?;
        let truncated = !encoding.get_overflowing().is_empty();
        if truncated {
            tracing::debug!(
                "input truncated to {} tokens ({} overflow chunks dropped)",
                self.max_length,
                encoding.get_overflowing().len()
            );
        }
        Ok(EncodedText {
            ids: encoding.get_ids().to_vec(),
            type_ids: encoding.get_type_ids().to_vec(),
            tokens: encoding.get_tokens().to_vec(),
            truncated,
        })
    }

    /// Bare tokens of `text`: no special tokens, no truncation.
    pub fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        let encoding = self.plain.encode(text, false)?;
        Ok(encoding.get_tokens().to_vec())
    }
}
