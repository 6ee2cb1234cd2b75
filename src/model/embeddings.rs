//! Input embeddings: word + absolute position + token type, then LayerNorm.
//!
//! DistilBERT has no token-type table; its `token_type_ids` are ignored.

use candle_core::{Module, Result, Tensor};
use candle_nn::{Embedding, LayerNorm, VarBuilder};

use crate::config::{EncoderConfig, ModelType};

#[derive(Debug, Clone)]
pub struct Embeddings {
    word_embeddings: Embedding,
    position_embeddings: Embedding,
    token_type_embeddings: Option<Embedding>,
    layer_norm: LayerNorm,
    position_offset: usize,
}

impl Embeddings {
    pub fn new(cfg: &EncoderConfig, vb: VarBuilder) -> Result<Self> {
        let token_type_embeddings = if cfg.model_type().is_none_or(ModelType::has_token_types) {
            Some(candle_nn::embedding(
                cfg.type_vocab_size.max(1),
                cfg.hidden_size,
                vb.pp("token_type_embeddings"),
            )?)
        } else {
            None
        };
        Ok(Self {
            word_embeddings: candle_nn::embedding(
                cfg.vocab_size,
                cfg.hidden_size,
                vb.pp("word_embeddings"),
            )?,
            position_embeddings: candle_nn::embedding(
                cfg.max_position_embeddings,
                cfg.hidden_size,
                vb.pp("position_embeddings"),
            )?,
            token_type_embeddings,
            layer_norm: candle_nn::layer_norm(cfg.hidden_size, cfg.layer_norm_eps, vb.pp("LayerNorm"))?,
            position_offset: cfg.position_offset(),
        })
    }

    /// Forward pass.
    ///
    /// - `input_ids`, `token_type_ids`: `[B, S]` u32
    ///
    /// Returns `[B, S, hidden]`.
    pub fn forward(&self, input_ids: &Tensor, token_type_ids: &Tensor) -> Result<Tensor> {
        let seq_len = input_ids.dim(1)?;
        let start = self.position_offset as u32;
        let position_ids =
            Tensor::arange(start, start + seq_len as u32, input_ids.device())?.unsqueeze(0)?;

        let mut h = self.word_embeddings.forward(input_ids)?;
        if let Some(token_types) = &self.token_type_embeddings {
            h = (h + token_types.forward(token_type_ids)?)?;
        }
        let positions = self.position_embeddings.forward(&position_ids)?;

        let h = h.broadcast_add(&positions)?;
        self.layer_norm.forward(&h)
    }
}
