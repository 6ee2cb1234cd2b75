//! Per-layer attention patterns captured during one forward pass.

use candle_core::{DType, Result, Tensor};

/// Post-softmax attention from every encoder layer, in layer order.
///
/// Each tensor has shape `[batch, heads, seq_q, seq_k]`.
#[derive(Debug, Clone)]
pub struct AttentionCache {
    patterns: Vec<Tensor>,
}

impl AttentionCache {
    pub fn with_capacity(n_layers: usize) -> Self {
        Self {
            patterns: Vec::with_capacity(n_layers),
        }
    }

    /// Append the pattern of the next layer.
    pub fn push(&mut self, pattern: Tensor) {
        self.patterns.push(pattern);
    }

    pub fn n_layers(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn get_layer(&self, layer: usize) -> Option<&Tensor> {
        self.patterns.get(layer)
    }

    /// Head-averaged matrix `[seq_q][seq_k]` of batch item 0 for one layer.
    ///
    /// Returns `None` when the layer was not captured.
    pub fn head_averaged(&self, layer: usize) -> Option<Result<Vec<Vec<f32>>>> {
        self.patterns.get(layer).map(head_average)
    }

    /// [`AttentionCache::head_averaged`] for every layer, in order.
    pub fn head_averaged_all(&self) -> Result<Vec<Vec<Vec<f32>>>> {
        self.patterns.iter().map(head_average).collect()
    }
}

/// `[B, H, S, S]` → drop batch 0 → mean over heads → `[S][S]`.
fn head_average(pattern: &Tensor) -> Result<Vec<Vec<f32>>> {
    pattern
        .to_dtype(DType::F32)?
        .narrow(0, 0, 1)?
        .squeeze(0)?
        .mean(0)?
        .to_vec2()
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn test_head_average() {
        let dev = Device::Cpu;
        // Two heads over a 2-token sequence.
        let pattern = Tensor::new(
            &[[[[1.0f32, 0.0], [0.5, 0.5]], [[0.0, 1.0], [0.5, 0.5]]]],
            &dev,
        )
        .unwrap();
        let mut cache = AttentionCache::with_capacity(1);
        cache.push(pattern);

        let avg = cache.head_averaged(0).unwrap().unwrap();
        assert_eq!(avg, vec![vec![0.5, 0.5], vec![0.5, 0.5]]);
        assert!(cache.head_averaged(1).is_none());
    }

    #[test]
    fn test_all_layers_in_order() {
        let dev = Device::Cpu;
        let mut cache = AttentionCache::with_capacity(3);
        for i in 0..3 {
            let fill = i as f32;
            cache.push(Tensor::full(fill, (1, 2, 3, 3), &dev).unwrap());
        }
        assert_eq!(cache.n_layers(), 3);
        assert!(!cache.is_empty());

        let all = cache.head_averaged_all().unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2][1][1], 2.0);
        assert_eq!(cache.get_layer(1).unwrap().dims(), &[1, 2, 3, 3]);
    }
}
