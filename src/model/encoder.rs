//! BERT-family encoder with attention capture.
//!
//! Weight layout follows HuggingFace `BertModel` / `RobertaModel`
//! (`embeddings.*` and `encoder.layer.{i}.*`) or `DistilBertModel`
//! (`embeddings.*` and `transformer.layer.{i}.*`), optionally nested under
//! the family prefix (`bert.`, `roberta.`, `distilbert.`) when the checkpoint
//! was saved from a task head such as `BertForMaskedLM`.

use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;

use super::cache::AttentionCache;
use super::embeddings::Embeddings;
use super::layers::EncoderLayer;
use crate::config::{EncoderConfig, ModelType};
use crate::{Error, Result};

/// Output of one forward pass.
#[derive(Debug)]
pub struct EncoderOutput {
    /// `[B, S, hidden]`
    pub last_hidden_state: Tensor,
    /// One `[B, H, S, S]` pattern per layer.
    pub attentions: AttentionCache,
}

#[derive(Debug, Clone)]
pub struct AttentionEncoder {
    embeddings: Embeddings,
    layers: Vec<EncoderLayer>,
    cfg: EncoderConfig,
    device: Device,
}

impl AttentionEncoder {
    /// Build from a VarBuilder rooted at the encoder (`embeddings.*` visible directly).
    pub fn new(cfg: &EncoderConfig, vb: VarBuilder) -> candle_core::Result<Self> {
        let Some(model_type) = cfg.model_type() else {
            candle_core::bail!("no encoder for model_type {:?}", cfg.model_type_name)
        };
        let embeddings = Embeddings::new(cfg, vb.pp("embeddings"))?;

        let mut layers = Vec::with_capacity(cfg.num_hidden_layers);
        let layer_vb = vb.pp(model_type.layers_prefix());
        for i in 0..cfg.num_hidden_layers {
            layers.push(EncoderLayer::new(cfg, layer_vb.pp(i))?);
        }

        Ok(Self {
            embeddings,
            layers,
            cfg: cfg.clone(),
            device: vb.device().clone(),
        })
    }

    /// Load from a checkpoint VarBuilder, resolving the family prefix and
    /// legacy `LayerNorm.gamma` / `LayerNorm.beta` names.
    pub fn load(cfg: &EncoderConfig, model_type: ModelType, vb: VarBuilder) -> Result<Self> {
        cfg.validate()?;

        let prefix = model_type.weight_prefix();
        let root = if vb.contains_tensor(&format!("{prefix}.embeddings.word_embeddings.weight")) {
            format!("{prefix}.")
        } else if vb.contains_tensor("embeddings.word_embeddings.weight") {
            String::new()
        } else {
            return Err(Error::WeightLoad(format!(
                "no {prefix} embeddings found in checkpoint"
            )));
        };

        let legacy_norm = vb.contains_tensor(&format!("{root}embeddings.LayerNorm.gamma"));
        tracing::debug!(
            "encoder weights: prefix={:?}, legacy LayerNorm names={}",
            root,
            legacy_norm
        );

        let vb = if legacy_norm {
            vb.rename_f(|name: &str| {
                name.replace("LayerNorm.weight", "LayerNorm.gamma")
                    .replace("LayerNorm.bias", "LayerNorm.beta")
            })
        } else {
            vb
        };
        let vb = match root.strip_suffix('.') {
            Some(p) => vb.pp(p),
            None => vb,
        };

        Self::new(cfg, vb).map_err(|e| Error::WeightLoad(format!("encoder init: {e}")))
    }

    /// Forward pass.
    ///
    /// - `input_ids`, `token_type_ids`: `[B, S]` u32
    ///
    /// Inference only: there is no dropout and no gradient tracking.
    pub fn forward(&self, input_ids: &Tensor, token_type_ids: &Tensor) -> Result<EncoderOutput> {
        let mut h = self.embeddings.forward(input_ids, token_type_ids)?;
        let mut attentions = AttentionCache::with_capacity(self.layers.len());
        for layer in &self.layers {
            let (out, probs) = layer.forward(&h)?;
            attentions.push(probs);
            h = out;
        }
        Ok(EncoderOutput {
            last_hidden_state: h,
            attentions,
        })
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.cfg
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}
