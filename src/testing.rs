//! Tiny offline model for unit tests.
//!
//! The tokenizer is a 48-word WordPiece vocabulary covering the sample
//! lyrics; the encoder has 2 layers, 4 heads and hidden size 16 with
//! randomly initialised weights.

use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};
use tokenizers::Tokenizer;

use crate::config::{EncoderConfig, ExtractorConfig};
use crate::extractor::AttentionExtractor;
use crate::model::encoder::AttentionEncoder;

pub(crate) const TINY_CONFIG_JSON: &str = include_str!("../tests/fixtures/tiny-bert/config.json");
pub(crate) const TINY_TOKENIZER_JSON: &str =
    include_str!("../tests/fixtures/tiny-bert/tokenizer.json");

pub(crate) fn tiny_config() -> EncoderConfig {
    EncoderConfig::from_json(TINY_CONFIG_JSON).unwrap()
}

pub(crate) fn tiny_tokenizer() -> Tokenizer {
    Tokenizer::from_bytes(TINY_TOKENIZER_JSON.as_bytes()).unwrap()
}

pub(crate) fn tiny_encoder(varmap: &VarMap) -> AttentionEncoder {
    let vb = VarBuilder::from_varmap(varmap, DType::F32, &Device::Cpu);
    AttentionEncoder::new(&tiny_config(), vb).unwrap()
}

pub(crate) fn tiny_extractor() -> AttentionExtractor {
    let varmap = VarMap::new();
    AttentionExtractor::from_parts(
        "tiny-bert",
        tiny_tokenizer(),
        tiny_encoder(&varmap),
        ExtractorConfig::default(),
    )
    .unwrap()
}
