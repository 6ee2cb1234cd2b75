//! Attention snapshot: the plain-data result of one forward pass.
//!
//! Field names match the JSON consumed by the attention heatmap tooling
//! (`model_name`, `tokens`, `attention_layers[].attention_matrix`, ...), so
//! a serialized snapshot can be fed straight to a heatmap viewer.

use serde::{Deserialize, Serialize};

/// Head-averaged attention of one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerAttention {
    /// 0-based layer index.
    pub layer: usize,
    /// `attention_matrix[q][k]`: attention query token `q` pays to key token `k`.
    pub attention_matrix: Vec<Vec<f32>>,
    pub tokens: Vec<String>,
}

impl LayerAttention {
    /// Mean over all query tokens of the attention mass sent to `positions`.
    ///
    /// Positions are used as given; pass a deduplicated set to avoid
    /// counting a key twice. Returns `None` for an empty matrix, an empty
    /// position list, or a position missing from any row.
    pub fn attention_into(&self, positions: &[usize]) -> Option<f32> {
        let seq_len = self.attention_matrix.len();
        if seq_len == 0 || positions.is_empty() {
            return None;
        }
        let mut total = 0.0f32;
        for row in &self.attention_matrix {
            for &p in positions {
                total += row.get(p)?;
            }
        }
        Some(total / seq_len as f32)
    }
}

/// Per-layer attention for one text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttentionSnapshot {
    pub model_name: String,
    pub tokens: Vec<String>,
    pub attention_layers: Vec<LayerAttention>,
    pub text: String,
}

impl AttentionSnapshot {
    pub fn seq_len(&self) -> usize {
        self.tokens.len()
    }

    pub fn num_layers(&self) -> usize {
        self.attention_layers.len()
    }

    pub fn layer(&self, layer: usize) -> Option<&LayerAttention> {
        self.attention_layers.get(layer)
    }

    /// Every matrix is `seq_len × seq_len`.
    pub fn is_consistent(&self) -> bool {
        let n = self.seq_len();
        self.attention_layers.iter().all(|l| {
            l.attention_matrix.len() == n && l.attention_matrix.iter().all(|row| row.len() == n)
        })
    }
}
