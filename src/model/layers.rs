//! Post-norm BERT encoder layer.
//!
//! ```text
//! x ─► self-attention ─► dense ─► +x ─► LayerNorm ─► h
//! h ─► intermediate (act) ─► dense ─► +h ─► LayerNorm ─► out
//! ```
//!
//! DistilBERT blocks compute the same thing under other names:
//!
//! | BERT (`encoder.layer.{i}`)   | DistilBERT (`transformer.layer.{i}`) |
//! |------------------------------|--------------------------------------|
//! | `attention.self.{query,key,value}` | `attention.{q,k,v}_lin`        |
//! | `attention.output.dense`     | `attention.out_lin`                  |
//! | `attention.output.LayerNorm` | `sa_layer_norm`                      |
//! | `intermediate.dense`         | `ffn.lin1`                           |
//! | `output.dense`               | `ffn.lin2`                           |
//! | `output.LayerNorm`           | `output_layer_norm`                  |

use candle_core::{Module, Result, Tensor};
use candle_nn::{LayerNorm, Linear, VarBuilder};

use super::attention::SelfAttention;
use crate::config::{EncoderConfig, HiddenAct, ModelType};

fn activate(act: HiddenAct, xs: &Tensor) -> Result<Tensor> {
    match act {
        HiddenAct::Gelu => xs.gelu_erf(),
        HiddenAct::GeluNew => xs.gelu(),
        HiddenAct::Relu => xs.relu(),
    }
}

/// Dense projection followed by residual add and LayerNorm.
///
/// Shared shape of `attention.output` and `output` in HF checkpoints.
#[derive(Debug, Clone)]
struct ResidualOutput {
    dense: Linear,
    layer_norm: LayerNorm,
}

impl ResidualOutput {
    fn new(
        in_dim: usize,
        out_dim: usize,
        eps: f64,
        dense_vb: VarBuilder,
        norm_vb: VarBuilder,
    ) -> Result<Self> {
        Ok(Self {
            dense: candle_nn::linear(in_dim, out_dim, dense_vb)?,
            layer_norm: candle_nn::layer_norm(out_dim, eps, norm_vb)?,
        })
    }

    fn forward(&self, hidden_states: &Tensor, residual: &Tensor) -> Result<Tensor> {
        let h = self.dense.forward(hidden_states)?;
        self.layer_norm.forward(&(h + residual)?)
    }
}

/// One encoder block.
#[derive(Debug, Clone)]
pub struct EncoderLayer {
    self_attn: SelfAttention,
    attn_output: ResidualOutput,
    intermediate: Linear,
    output: ResidualOutput,
    act: HiddenAct,
}

impl EncoderLayer {
    /// Build from a VarBuilder rooted at the block, using the weight names of
    /// `cfg`'s model family.
    pub fn new(cfg: &EncoderConfig, vb: VarBuilder) -> Result<Self> {
        match cfg.model_type() {
            Some(ModelType::DistilBert) => Self::new_distilbert(cfg, vb),
            _ => Self::new_bert(cfg, vb),
        }
    }

    fn new_bert(cfg: &EncoderConfig, vb: VarBuilder) -> Result<Self> {
        let attn_vb = vb.pp("attention");
        let attn_out_vb = attn_vb.pp("output");
        let out_vb = vb.pp("output");
        Ok(Self {
            self_attn: SelfAttention::load(
                attn_vb.pp("self"),
                cfg.hidden_size,
                cfg.num_attention_heads,
            )?,
            attn_output: ResidualOutput::new(
                cfg.hidden_size,
                cfg.hidden_size,
                cfg.layer_norm_eps,
                attn_out_vb.pp("dense"),
                attn_out_vb.pp("LayerNorm"),
            )?,
            intermediate: candle_nn::linear(
                cfg.hidden_size,
                cfg.intermediate_size,
                vb.pp("intermediate.dense"),
            )?,
            output: ResidualOutput::new(
                cfg.intermediate_size,
                cfg.hidden_size,
                cfg.layer_norm_eps,
                out_vb.pp("dense"),
                out_vb.pp("LayerNorm"),
            )?,
            act: cfg.hidden_act,
        })
    }

    fn new_distilbert(cfg: &EncoderConfig, vb: VarBuilder) -> Result<Self> {
        let attn_vb = vb.pp("attention");
        Ok(Self {
            self_attn: SelfAttention::load_named(
                attn_vb.clone(),
                cfg.hidden_size,
                cfg.num_attention_heads,
                ["q_lin", "k_lin", "v_lin"],
            )?,
            attn_output: ResidualOutput::new(
                cfg.hidden_size,
                cfg.hidden_size,
                cfg.layer_norm_eps,
                attn_vb.pp("out_lin"),
                vb.pp("sa_layer_norm"),
            )?,
            intermediate: candle_nn::linear(
                cfg.hidden_size,
                cfg.intermediate_size,
                vb.pp("ffn.lin1"),
            )?,
            output: ResidualOutput::new(
                cfg.intermediate_size,
                cfg.hidden_size,
                cfg.layer_norm_eps,
                vb.pp("ffn.lin2"),
                vb.pp("output_layer_norm"),
            )?,
            act: cfg.hidden_act,
        })
    }

    /// Forward pass.
    ///
    /// - `hidden_states`: `[B, S, D]`
    ///
    /// Returns the layer output `[B, S, D]` and its attention pattern `[B, H, S, S]`.
    pub fn forward(&self, hidden_states: &Tensor) -> Result<(Tensor, Tensor)> {
        let (context, probs) = self.self_attn.forward(hidden_states)?;
        let h = self.attn_output.forward(&context, hidden_states)?;

        let inter = activate(self.act, &self.intermediate.forward(&h)?)?;
        let out = self.output.forward(&inter, &h)?;
        Ok((out, probs))
    }
}
