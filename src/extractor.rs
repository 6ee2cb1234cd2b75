//! Attention extraction over lyrics.
//!
//! [`AttentionExtractor`] owns a tokenizer and an [`AttentionEncoder`] and
//! exposes the two analysis operations:
//!
//! - [`AttentionExtractor::extract_attention`] — one forward pass over a
//!   text, head-averaged attention per layer
//! - [`AttentionExtractor::analyze_phrase_evolution`] — every line that
//!   contains a phrase, with attention over its surrounding lines and the
//!   phrase's token positions
//!
//! All operations take `&self`; the loaded model is never mutated.

use candle_core::{DType, Device, Tensor};
use serde::{Deserialize, Serialize};
use tokenizers::Tokenizer;

use crate::config::{EncoderConfig, ExtractorConfig};
use crate::hub::ModelFiles;
use crate::model::encoder::AttentionEncoder;
use crate::phrase::{self, PhraseEvolution, PhraseOccurrence};
use crate::snapshot::{AttentionSnapshot, LayerAttention};
use crate::tokenizer::TextTokenizer;
use crate::{Error, Result};

/// Whole-lyric attention plus the optional phrase report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricsAnalysis {
    #[serde(flatten)]
    pub attention: AttentionSnapshot,
    pub phrase_analysis: Option<PhraseEvolution>,
}

pub struct AttentionExtractor {
    model_name: String,
    tokenizer: TextTokenizer,
    encoder: AttentionEncoder,
    config: ExtractorConfig,
}

impl AttentionExtractor {
    /// Load `model_name` with default settings.
    pub fn load(model_name: &str) -> Result<Self> {
        Self::load_with_config(model_name, ExtractorConfig::default())
    }

    /// Resolve, download if needed, and build the extractor on the CPU in F32.
    pub fn load_with_config(model_name: &str, config: ExtractorConfig) -> Result<Self> {
        let files = ModelFiles::resolve(model_name, &config.revision)?;
        let encoder_cfg = EncoderConfig::from_json(&files.read_config()?)?;
        let model_type = encoder_cfg
            .model_type()
            .ok_or_else(|| Error::UnsupportedModel {
                model_id: model_name.to_string(),
                model_type: encoder_cfg.model_type_name.clone(),
            })?;

        tracing::info!(
            "Building {} encoder: {} layers, {} heads, hidden {}",
            encoder_cfg.model_type_name,
            encoder_cfg.num_hidden_layers,
            encoder_cfg.num_attention_heads,
            encoder_cfg.hidden_size
        );
        let vb = files.var_builder(DType::F32, &Device::Cpu)?;
        let encoder = AttentionEncoder::load(&encoder_cfg, model_type, vb)?;

        tracing::info!("Loading tokenizer from {:?}", files.tokenizer);
        let tokenizer = Tokenizer::from_file(&files.tokenizer)?;
        let extractor = Self::from_parts(model_name, tokenizer, encoder, config)?;
        tracing::info!("{} ready", model_name);
        Ok(extractor)
    }

    /// Assemble from an already-built tokenizer and encoder.
    ///
    /// The truncation length is clamped to what the encoder's position
    /// table can embed.
    pub fn from_parts(
        model_name: impl Into<String>,
        tokenizer: Tokenizer,
        encoder: AttentionEncoder,
        config: ExtractorConfig,
    ) -> Result<Self> {
        let max_length = config.max_length.min(encoder.config().max_sequence_len());
        if max_length == 0 {
            return Err(Error::Config("max_length must be > 0".to_string()));
        }
        Ok(Self {
            model_name: model_name.into(),
            tokenizer: TextTokenizer::new(tokenizer, max_length)?,
            encoder,
            config,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn encoder_config(&self) -> &EncoderConfig {
        self.encoder.config()
    }

    pub fn num_layers(&self) -> usize {
        self.encoder.num_layers()
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Truncation length in effect, after clamping to the position table.
    pub fn max_length(&self) -> usize {
        self.tokenizer.max_length()
    }

    /// Head-averaged attention of every layer for `text`.
    ///
    /// Input beyond the truncation length is dropped without error.
    pub fn extract_attention(&self, text: &str) -> Result<AttentionSnapshot> {
        let encoded = self.tokenizer.encode(text)?;
        let device = self.encoder.device();
        let input_ids = Tensor::new(encoded.ids.as_slice(), device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::new(encoded.type_ids.as_slice(), device)?.unsqueeze(0)?;

        let output = self.encoder.forward(&input_ids, &token_type_ids)?;
        tracing::debug!(
            "forward: {} tokens, {} layers",
            encoded.len(),
            output.attentions.n_layers()
        );

        let attention_layers = output
            .attentions
            .head_averaged_all()?
            .into_iter()
            .enumerate()
            .map(|(layer, attention_matrix)| LayerAttention {
                layer,
                attention_matrix,
                tokens: encoded.tokens.clone(),
            })
            .collect();

        Ok(AttentionSnapshot {
            model_name: self.model_name.clone(),
            tokens: encoded.tokens,
            attention_layers,
            text: text.to_string(),
        })
    }

    /// Track `target_phrase` through `lyrics`.
    ///
    /// One occurrence per line containing the phrase (case-insensitive),
    /// numbered from 1 in line order. Attention is computed over the line's
    /// context window, and `phrase_positions` holds every place the
    /// lower-cased phrase's tokens appear verbatim in that context. When
    /// subword splitting differs inside the context the positions are empty
    /// even though the line matched.
    pub fn analyze_phrase_evolution(
        &self,
        lyrics: &str,
        target_phrase: &str,
    ) -> Result<PhraseEvolution> {
        let mut report = PhraseEvolution::new(target_phrase);
        let matches = phrase::scan_lines(lyrics, target_phrase, self.config.context_radius);
        if matches.is_empty() {
            return Ok(report);
        }

        let phrase_tokens = self.tokenizer.tokenize(&target_phrase.to_lowercase())?;
        for line in matches {
            let attention_data = self.extract_attention(&line.context)?;
            let phrase_positions =
                phrase::find_phrase_positions(&attention_data.tokens, &phrase_tokens);
            tracing::debug!(
                "occurrence {} at line {}: {} phrase positions",
                report.total_occurrences + 1,
                line.sentence_index,
                phrase_positions.len()
            );

            report.push(PhraseOccurrence {
                occurrence: report.total_occurrences + 1,
                sentence_index: line.sentence_index,
                context: line.context,
                attention_data,
                phrase_positions,
                sentence: line.sentence,
            });
        }

        Ok(report)
    }

    /// Attention over the whole lyric, plus the phrase report when a phrase is given.
    pub fn analyze(&self, lyrics: &str, target_phrase: Option<&str>) -> Result<LyricsAnalysis> {
        let attention = self.extract_attention(lyrics)?;
        let phrase_analysis = target_phrase
            .map(|p| self.analyze_phrase_evolution(lyrics, p))
            .transpose()?;
        Ok(LyricsAnalysis {
            attention,
            phrase_analysis,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use candle_nn::VarMap;

    const SAMPLE: &str = "A\nB\nI walk alone\nC\nD\nE";

    #[test]
    fn test_matrices_match_token_count() {
        let ex = testing::tiny_extractor();
        let snap = ex.extract_attention("The city lights are calling me").unwrap();

        assert_eq!(snap.model_name, "tiny-bert");
        assert_eq!(snap.text, "The city lights are calling me");
        assert_eq!(snap.tokens.len(), 8);
        assert_eq!(snap.num_layers(), ex.encoder_config().num_hidden_layers);
        assert!(snap.is_consistent());
        for (i, layer) in snap.attention_layers.iter().enumerate() {
            assert_eq!(layer.layer, i);
            assert_eq!(layer.tokens, snap.tokens);
        }
    }

    #[test]
    fn test_head_averaged_rows_sum_to_one() {
        let ex = testing::tiny_extractor();
        let snap = ex.extract_attention("I walk alone").unwrap();
        for layer in &snap.attention_layers {
            for row in &layer.attention_matrix {
                let sum: f32 = row.iter().sum();
                assert!((sum - 1.0).abs() < 1e-4, "row sum {sum}");
            }
        }
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let ex = testing::tiny_extractor();
        let a = ex.extract_attention("But I walk alone, with heavy feet").unwrap();
        let b = ex.extract_attention("But I walk alone, with heavy feet").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_long_input_is_truncated_silently() {
        let ex = testing::tiny_extractor();
        let max = ex.encoder_config().max_sequence_len();
        let text = "the cat sat on the mat ".repeat(40);
        let snap = ex.extract_attention(&text).unwrap();
        assert_eq!(snap.seq_len(), max);
        assert!(snap.is_consistent());
        assert_eq!(snap.tokens.last().map(String::as_str), Some("[SEP]"));
        assert_eq!(snap.text, text);
    }

    #[test]
    fn test_max_length_is_clamped_to_positions() {
        let varmap = VarMap::new();
        let ex = AttentionExtractor::from_parts(
            "tiny-bert",
            testing::tiny_tokenizer(),
            testing::tiny_encoder(&varmap),
            ExtractorConfig {
                max_length: 10_000,
                ..ExtractorConfig::default()
            },
        )
        .unwrap();
        assert_eq!(ex.max_length(), 64);
        assert_eq!(ex.config().max_length, 10_000);
        let text = "a b c d e ".repeat(30);
        assert_eq!(ex.extract_attention(&text).unwrap().seq_len(), 64);
    }

    #[test]
    fn test_single_occurrence() {
        let ex = testing::tiny_extractor();
        let report = ex.analyze_phrase_evolution(SAMPLE, "I walk alone").unwrap();

        assert_eq!(report.target_phrase, "I walk alone");
        assert_eq!(report.total_occurrences, 1);
        let occ = &report.occurrences[0];
        assert_eq!(occ.occurrence, 1);
        assert_eq!(occ.sentence_index, 2);
        assert_eq!(occ.context, "A B I walk alone C D");
        assert_eq!(occ.sentence, "I walk alone");
        assert_eq!(occ.attention_data.text, occ.context);
        // [CLS] a b i walk alone c d [SEP]
        assert_eq!(occ.phrase_positions, vec![3, 4, 5]);
        assert!(occ.attention_strength(0).is_some());
    }

    #[test]
    fn test_absent_phrase() {
        let ex = testing::tiny_extractor();
        let report = ex.analyze_phrase_evolution(SAMPLE, "pouring rain").unwrap();
        assert_eq!(report.total_occurrences, 0);
        assert!(report.occurrences.is_empty());
    }

    #[test]
    fn test_occurrences_numbered_in_line_order() {
        let lyrics = "\n    I walk alone down this empty street\n    The city lights are calling me\n    But I walk alone, with heavy feet\n\n    I walk alone through the pouring rain\n    I WALK ALONE and I am free";
        let ex = testing::tiny_extractor();
        let report = ex.analyze_phrase_evolution(lyrics, "I walk alone").unwrap();

        assert_eq!(report.total_occurrences, 4);
        let ordinals: Vec<usize> = report.occurrences.iter().map(|o| o.occurrence).collect();
        assert_eq!(ordinals, vec![1, 2, 3, 4]);
        let lines: Vec<usize> = report.occurrences.iter().map(|o| o.sentence_index).collect();
        assert_eq!(lines, vec![1, 3, 5, 6]);

        for occ in &report.occurrences {
            let n = occ.attention_data.seq_len();
            assert!(!occ.phrase_positions.is_empty());
            assert!(occ.phrase_positions.iter().all(|&p| p < n));
        }
    }

    #[test]
    fn test_substring_match_without_token_match() {
        let ex = testing::tiny_extractor();
        let report = ex.analyze_phrase_evolution("x\nshe walks home\ny", "walk").unwrap();

        // "walks" contains "walk" but is a single token of its own.
        assert_eq!(report.total_occurrences, 1);
        let occ = &report.occurrences[0];
        assert_eq!(occ.sentence_index, 1);
        assert_eq!(occ.context, "x she walks home y");
        assert!(occ.attention_data.tokens.iter().any(|t| t == "walks"));
        assert!(occ.phrase_positions.is_empty());
        assert_eq!(occ.attention_strength(0), None);
    }

    #[test]
    fn test_repeated_phrase_in_context_reports_all_matches() {
        let ex = testing::tiny_extractor();
        let report = ex.analyze_phrase_evolution("I walk alone\nI walk alone", "walk alone").unwrap();
        assert_eq!(report.total_occurrences, 2);
        // Both windows span both lines: [CLS] i walk alone i walk alone [SEP]
        for occ in &report.occurrences {
            assert_eq!(occ.phrase_positions, vec![2, 3, 5, 6]);
        }
    }

    #[test]
    fn test_analyze_combines_both_views() {
        let ex = testing::tiny_extractor();
        let analysis = ex.analyze(SAMPLE, Some("I walk alone")).unwrap();
        assert_eq!(analysis.attention.text, SAMPLE);
        assert_eq!(analysis.phrase_analysis.as_ref().unwrap().total_occurrences, 1);

        let value = serde_json::to_value(&analysis).unwrap();
        assert_eq!(value["model_name"], "tiny-bert");
        assert_eq!(value["phrase_analysis"]["total_occurrences"], 1);

        let plain = ex.analyze(SAMPLE, None).unwrap();
        assert!(plain.phrase_analysis.is_none());
    }

    #[test]
    fn test_load_from_local_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), testing::TINY_CONFIG_JSON).unwrap();
        std::fs::write(dir.path().join("tokenizer.json"), testing::TINY_TOKENIZER_JSON).unwrap();

        let varmap = VarMap::new();
        let reference = AttentionExtractor::from_parts(
            "tiny-bert",
            testing::tiny_tokenizer(),
            testing::tiny_encoder(&varmap),
            ExtractorConfig::default(),
        )
        .unwrap();
        varmap.save(dir.path().join("model.safetensors")).unwrap();

        let id = dir.path().to_str().unwrap();
        let loaded = AttentionExtractor::load(id).unwrap();
        assert_eq!(loaded.model_name(), id);
        assert_eq!(loaded.num_layers(), 2);

        let a = reference.extract_attention("the cat sat on the mat").unwrap();
        let b = loaded.extract_attention("the cat sat on the mat").unwrap();
        assert_eq!(a.tokens, b.tokens);
        assert_eq!(a.attention_layers, b.attention_layers);
    }

    #[test]
    fn test_load_distilbert_from_local_directory() {
        let config_json = r#"{
            "activation": "gelu",
            "dim": 16,
            "hidden_dim": 32,
            "max_position_embeddings": 64,
            "model_type": "distilbert",
            "n_heads": 4,
            "n_layers": 3,
            "vocab_size": 48
        }"#;
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), config_json).unwrap();
        std::fs::write(dir.path().join("tokenizer.json"), testing::TINY_TOKENIZER_JSON).unwrap();

        let varmap = VarMap::new();
        let vb = candle_nn::VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let encoder = AttentionEncoder::new(&EncoderConfig::from_json(config_json).unwrap(), vb)
            .unwrap();
        let reference = AttentionExtractor::from_parts(
            "tiny-distilbert",
            testing::tiny_tokenizer(),
            encoder,
            ExtractorConfig::default(),
        )
        .unwrap();
        varmap.save(dir.path().join("model.safetensors")).unwrap();

        let loaded = AttentionExtractor::load(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(loaded.num_layers(), 3);
        assert_eq!(loaded.encoder_config().model_type_name, "distilbert");

        let report = loaded.analyze_phrase_evolution(SAMPLE, "I walk alone").unwrap();
        assert_eq!(report.total_occurrences, 1);
        assert_eq!(report.occurrences[0].phrase_positions, vec![3, 4, 5]);

        let a = reference.extract_attention("the cat sat on the mat").unwrap();
        let b = loaded.extract_attention("the cat sat on the mat").unwrap();
        assert_eq!(a.attention_layers, b.attention_layers);
    }

    #[test]
    fn test_load_rejects_unsupported_family() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), r#"{"model_type": "gpt2"}"#).unwrap();
        std::fs::write(dir.path().join("tokenizer.json"), testing::TINY_TOKENIZER_JSON).unwrap();
        std::fs::write(dir.path().join("model.safetensors"), b"").unwrap();

        let err = AttentionExtractor::load(dir.path().to_str().unwrap()).err().unwrap();
        assert!(matches!(err, Error::UnsupportedModel { .. }), "{err}");
    }
}
