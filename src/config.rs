//! Configuration for the attention encoder and the extractor.
//!
//! [`EncoderConfig`] mirrors the fields of a HuggingFace BERT/RoBERTa
//! `config.json` that the encoder needs. DistilBERT's own field names
//! (`dim`, `n_heads`, `n_layers`, `hidden_dim`, `activation`) are accepted as
//! aliases. Defaults are `bert-base-uncased`.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "bert-base-uncased";

/// Maximum number of tokens fed to the encoder per text.
pub const DEFAULT_MAX_LENGTH: usize = 512;

/// Lines kept on each side of a matched line.
pub const DEFAULT_CONTEXT_RADIUS: usize = 2;

/// Feed-forward activation, named as in `config.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HiddenAct {
    /// Exact (erf) GELU.
    #[default]
    Gelu,
    /// Tanh-approximated GELU.
    GeluNew,
    Relu,
}

/// Encoder family. Only the families whose weights this crate can load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    Bert,
    Roberta,
    #[serde(rename = "distilbert")]
    DistilBert,
}

impl ModelType {
    /// Parse a `model_type` string from `config.json`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bert" => Some(Self::Bert),
            "roberta" => Some(Self::Roberta),
            "distilbert" => Some(Self::DistilBert),
            _ => None,
        }
    }

    /// Checkpoint prefix used when the encoder is saved inside a task head.
    pub fn weight_prefix(self) -> &'static str {
        match self {
            Self::Bert => "bert",
            Self::Roberta => "roberta",
            Self::DistilBert => "distilbert",
        }
    }

    /// Path of the layer stack below the encoder root.
    pub fn layers_prefix(self) -> &'static str {
        match self {
            Self::Bert | Self::Roberta => "encoder.layer",
            Self::DistilBert => "transformer.layer",
        }
    }

    /// Whether the embeddings carry a `token_type_embeddings` table.
    pub fn has_token_types(self) -> bool {
        !matches!(self, Self::DistilBert)
    }
}

/// Encoder hyper-parameters, deserialized from `config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub vocab_size: usize,
    #[serde(alias = "dim")]
    pub hidden_size: usize,
    #[serde(alias = "n_layers")]
    pub num_hidden_layers: usize,
    #[serde(alias = "n_heads")]
    pub num_attention_heads: usize,
    #[serde(alias = "hidden_dim")]
    pub intermediate_size: usize,
    #[serde(alias = "activation")]
    pub hidden_act: HiddenAct,
    pub max_position_embeddings: usize,
    pub type_vocab_size: usize,
    pub layer_norm_eps: f64,
    pub pad_token_id: usize,
    /// Raw `model_type`; checked by [`EncoderConfig::model_type`].
    #[serde(rename = "model_type")]
    pub model_type_name: String,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            vocab_size: 30522,
            hidden_size: 768,
            num_hidden_layers: 12,
            num_attention_heads: 12,
            intermediate_size: 3072,
            hidden_act: HiddenAct::Gelu,
            max_position_embeddings: 512,
            type_vocab_size: 2,
            layer_norm_eps: 1e-12,
            pad_token_id: 0,
            model_type_name: "bert".to_string(),
        }
    }
}

impl EncoderConfig {
    /// Parse a `config.json` document.
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject shapes the encoder cannot be built with.
    pub fn validate(&self) -> Result<()> {
        if self.num_attention_heads == 0 || self.hidden_size % self.num_attention_heads != 0 {
            return Err(Error::Config(format!(
                "hidden_size {} is not divisible by num_attention_heads {}",
                self.hidden_size, self.num_attention_heads
            )));
        }
        if self.num_hidden_layers == 0 {
            return Err(Error::Config("num_hidden_layers must be > 0".to_string()));
        }
        Ok(())
    }

    /// Per-head dimension.
    pub fn head_dim(&self) -> usize {
        self.hidden_size / self.num_attention_heads
    }

    /// Typed model family, `None` for families without an encoder here.
    pub fn model_type(&self) -> Option<ModelType> {
        ModelType::parse(&self.model_type_name)
    }

    /// First position id. RoBERTa reserves `0..=pad_token_id`.
    pub fn position_offset(&self) -> usize {
        match self.model_type() {
            Some(ModelType::Roberta) => self.pad_token_id + 1,
            _ => 0,
        }
    }

    /// Longest sequence the position table can embed.
    pub fn max_sequence_len(&self) -> usize {
        self.max_position_embeddings
            .saturating_sub(self.position_offset())
    }
}

/// Extractor settings. Everything besides the model id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Hub revision (branch, tag or commit) to download.
    pub revision: String,
    /// Truncation length in tokens, special tokens included.
    pub max_length: usize,
    /// Lines kept before and after a matched line.
    pub context_radius: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            revision: "main".to_string(),
            max_length: DEFAULT_MAX_LENGTH,
            context_radius: DEFAULT_CONTEXT_RADIUS,
        }
    }
}
