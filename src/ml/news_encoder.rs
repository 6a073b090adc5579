// ============================================================
// Layer 5 — News Encoder
// ============================================================
// Compresses the per-token embeddings of one title into a
// single news vector:
//
//   tokens [B, L, D] ──► multi-head self-attention (keys masked
//                        by the title's padding) ──► context [B, L, D]
//   context          ──► Linear(D → E) + tanh  ──► transformed [B, L, E]
//   context          ──► additive attention    ──► weights [B, L]
//   weights · transformed                      ──► news vector [B, E]
//
// The weights are scored on the context but applied to the
// transformed context, so the news vector has width E.

use burn::prelude::*;
use burn::nn::{Initializer, Linear, LinearConfig};

use crate::ml::attention::{
    AdditiveAttention, AdditiveAttentionConfig, SelfAttentionBlock, SelfAttentionBlockConfig,
};

#[derive(Config, Debug)]
pub struct NewsEncoderConfig {
    /// Width of the incoming token embeddings
    pub input_dim:  usize,
    /// Width of the additive-attention space
    pub output_dim: usize,
    #[config(default = 8)]
    pub num_heads:  usize,
    #[config(default = 0.2)]
    pub dropout:    f64,
}

impl NewsEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> NewsEncoder<B> {
        NewsEncoder {
            self_attention: SelfAttentionBlockConfig::new(self.input_dim, self.num_heads)
                .with_dropout(self.dropout)
                .init(device),
            projection: LinearConfig::new(self.input_dim, self.output_dim)
                .with_initializer(Initializer::XavierNormal { gain: 1.0 })
                .init(device),
            additive_attention: AdditiveAttentionConfig::new(self.input_dim, self.output_dim)
                .init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct NewsEncoder<B: Backend> {
    pub self_attention:     SelfAttentionBlock<B>,
    pub projection:         Linear<B>,
    pub additive_attention: AdditiveAttention<B>,
}

/// News vectors plus the attention weights that produced them.
#[derive(Debug, Clone)]
pub struct NewsEncoderOutput<B: Backend> {
    /// [B, E]
    pub news_vector:      Tensor<B, 2>,
    /// Head-averaged self-attention weights [B, L, L]
    pub context_weights:  Tensor<B, 3>,
    /// [B, L]
    pub additive_weights: Tensor<B, 2>,
}

impl<B: Backend> NewsEncoder<B> {
    /// x: [B, L, D]
    ///
    /// `key_padding_mask` [B, L] marks padded tokens (`true`); they are
    /// excluded from both the self-attention keys and the additive
    /// pooling. `softmax_padding_mask` [B, L] (1 = keep, 0 = drop) is
    /// multiplied into the additive weights after the softmax, without
    /// renormalisation.
    pub fn forward(
        &self,
        x: Tensor<B, 3>,
        key_padding_mask: Tensor<B, 2, Bool>,
        softmax_padding_mask: Option<Tensor<B, 2>>,
    ) -> NewsEncoderOutput<B> {
        let [batch, length, _] = x.dims();
        tracing::trace!("news encoder input: {:?}", x.dims());

        let attended = self.self_attention.forward(x, Some(key_padding_mask.clone()));
        let context  = attended.context;

        let transformed = self.projection.forward(context.clone()).tanh();
        let weights     = self.additive_attention.forward(context, Some(key_padding_mask));
        let weights     = match softmax_padding_mask {
            Some(mask) => {
                assert_eq!(
                    mask.dims(),
                    [batch, length],
                    "softmax padding mask must be (batch, length)"
                );
                weights * mask
            }
            None => weights,
        };

        let news_vector = weighted_sum(weights.clone(), transformed);
        tracing::trace!("news encoder output: {:?}", news_vector.dims());

        NewsEncoderOutput {
            news_vector,
            context_weights:  attended.weights,
            additive_weights: weights,
        }
    }
}

/// weights [B, L] · values [B, L, D] → [B, D]
pub fn weighted_sum<B: Backend>(weights: Tensor<B, 2>, values: Tensor<B, 3>) -> Tensor<B, 2> {
    let [batch, length, dim] = values.dims();
    weights
        .reshape([batch, 1, length])
        .matmul(values)
        .reshape([batch, dim])
}
