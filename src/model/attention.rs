//! Bidirectional multi-head self-attention that returns its attention pattern.
//!
//! Standard scaled dot-product attention as in BERT:
//! ```text
//! P = softmax(Q · K^T / sqrt(d))     [B, H, S, S]
//! O = P · V                          [B, S, H*d]
//! ```
//! No mask is applied: a single unpadded sequence is encoded per call, so
//! every token may attend to every other token.

use candle_core::{Module, Result, Tensor};
use candle_nn::VarBuilder;

/// Q/K/V projections of one encoder layer (`attention.self.*` in BERT,
/// `attention.{q,k,v}_lin` in DistilBERT).
#[derive(Debug, Clone)]
pub struct SelfAttention {
    query: candle_nn::Linear,
    key: candle_nn::Linear,
    value: candle_nn::Linear,
    num_heads: usize,
    head_dim: usize,
}

impl SelfAttention {
    pub fn load(vb: VarBuilder, hidden_size: usize, num_heads: usize) -> Result<Self> {
        Self::load_named(vb, hidden_size, num_heads, ["query", "key", "value"])
    }

    /// Load with the checkpoint's own names for the query, key and value projections.
    pub fn load_named(
        vb: VarBuilder,
        hidden_size: usize,
        num_heads: usize,
        [q_name, k_name, v_name]: [&str; 3],
    ) -> Result<Self> {
        let head_dim = hidden_size / num_heads;
        let inner_dim = num_heads * head_dim;
        let query = candle_nn::linear(hidden_size, inner_dim, vb.pp(q_name))?;
        let key = candle_nn::linear(hidden_size, inner_dim, vb.pp(k_name))?;
        let value = candle_nn::linear(hidden_size, inner_dim, vb.pp(v_name))?;
        Ok(Self {
            query,
            key,
            value,
            num_heads,
            head_dim,
        })
    }

    /// Split `[B, S, H*D]` into `[B, H, S, D]`.
    fn split_heads(&self, xs: &Tensor, batch: usize, seq_len: usize) -> Result<Tensor> {
        xs.reshape((batch, seq_len, self.num_heads, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()
    }

    /// Forward pass.
    ///
    /// - `hidden_states`: `[B, S, hidden]`
    ///
    /// Returns `(context, probs)`: the attended values `[B, S, H*D]` and the
    /// post-softmax attention pattern `[B, H, S, S]`.
    pub fn forward(&self, hidden_states: &Tensor) -> Result<(Tensor, Tensor)> {
        let (batch, seq_len, _) = hidden_states.dims3()?;

        let q = self.split_heads(&self.query.forward(hidden_states)?, batch, seq_len)?;
        let k = self.split_heads(&self.key.forward(hidden_states)?, batch, seq_len)?;
        let v = self.split_heads(&self.value.forward(hidden_states)?, batch, seq_len)?;

        let scale = (self.head_dim as f64).sqrt();
        let k_t = k.transpose(2, 3)?.contiguous()?;
        let scores = (q.matmul(&k_t)? / scale)?;
        let probs = candle_nn::ops::softmax_last_dim(&scores)?;

        let context = probs
            .matmul(&v)? // [B, H, S, D]
            .transpose(1, 2)? // [B, S, H, D]
            .contiguous()?
            .reshape((batch, seq_len, self.num_heads * self.head_dim))?;

        Ok((context, probs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    #[test]
    fn self_attention_shapes() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);

        let attn = SelfAttention::load(vb, 32, 4).unwrap();
        let x = Tensor::randn(0.0_f32, 1.0, (1, 7, 32), &device).unwrap();
        let (context, probs) = attn.forward(&x).unwrap();

        assert_eq!(context.dims(), &[1, 7, 32]);
        assert_eq!(probs.dims(), &[1, 4, 7, 7]);
    }

    #[test]
    fn attention_rows_are_distributions() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);

        let attn = SelfAttention::load(vb, 16, 2).unwrap();
        let x = Tensor::randn(0.0_f32, 1.0, (1, 5, 16), &device).unwrap();
        let (_, probs) = attn.forward(&x).unwrap();

        // Every query row sums to 1 over the keys.
        let sums: Vec<f32> = probs.sum(3).unwrap().flatten_all().unwrap().to_vec1().unwrap();
        assert_eq!(sums.len(), 2 * 5);
        for s in sums {
            assert!((s - 1.0).abs() < 1e-5, "row sum {s}");
        }
    }
}
