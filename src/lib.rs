//! Self-attention analysis of song lyrics in pure Rust.
//!
//! Loads a pretrained BERT-family encoder (candle + HuggingFace tokenizers),
//! runs a single forward pass per text and returns the head-averaged
//! attention matrix of every layer. On top of that it follows a phrase
//! through a lyric: every line containing it is re-encoded with two lines
//! of context on each side and the phrase's token span is located.
//!
//! ```text
//! lyrics ─► scan lines ─► context window ─► tokenizer ─► encoder ─► attention per layer
//!                                                              │
//!                                   phrase tokens ─► positions ┘
//! ```
//!
//! ## Modules
//!
//! - [`extractor`] — [`AttentionExtractor`], the entry point
//! - [`phrase`] — line scanning, phrase token matching, occurrence reports
//! - [`snapshot`] — plain-data attention results
//! - [`model`] — encoder with attention capture
//! - [`tokenizer`] — truncating tokenizer wrapper
//! - [`hub`] — model file resolution (local directory or HuggingFace Hub)
//! - [`config`] — encoder and extractor configuration

pub mod config;
pub mod extractor;
pub mod hub;
pub mod model;
pub mod phrase;
pub mod snapshot;
pub mod tokenizer;

mod error;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use extractor::{AttentionExtractor, LyricsAnalysis};
pub use phrase::{PhraseEvolution, PhraseOccurrence, find_phrase_positions};
pub use snapshot::{AttentionSnapshot, LayerAttention};
