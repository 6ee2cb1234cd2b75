//! BERT-family encoder that keeps every layer's attention pattern.
//!
//! ## Components
//!
//! - [`embeddings`] — word, position and token-type embeddings
//! - [`attention`] — multi-head self-attention returning its softmax pattern
//! - [`layers`] — post-norm encoder block
//! - [`encoder`] — the full stack, checkpoint loading
//! - [`cache`] — per-layer attention patterns and head averaging

pub mod attention;
pub mod cache;
pub mod embeddings;
pub mod encoder;
pub mod layers;
