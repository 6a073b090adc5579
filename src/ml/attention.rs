// ============================================================
// Layer 5 — Attention Building Blocks
// ============================================================
// The two attention layers every encoder in NRMS is built from:
//
//   AdditiveAttention   — one learned importance weight per
//                         position: softmax_l( q · tanh(W x_l + b) )
//   SelfAttentionBlock  — multi-head scaled dot-product
//                         self-attention with key padding
//
// Reference: Bahdanau et al. (2015) additive attention
//            Vaswani et al. (2017) Attention Is All You Need

use burn::{
    module::Param,
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Initializer, Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::softmax,
};

/// Score written into excluded positions before the softmax.
/// exp() of it underflows to exactly 0.0 in f32.
const EXCLUDED_SCORE: f32 = -1.0e9;

// ─── Additive Attention ──────────────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct AdditiveAttentionConfig {
    /// Width of the incoming vectors
    pub input_dim: usize,
    /// Width of the projected space the query vector lives in
    pub query_dim: usize,
}

impl AdditiveAttentionConfig {
    /// Projection weight is Xavier-normal, the query vector standard normal.
    pub fn init<B: Backend>(&self, device: &B::Device) -> AdditiveAttention<B> {
        let projection = LinearConfig::new(self.input_dim, self.query_dim)
            .with_initializer(Initializer::XavierNormal { gain: 1.0 })
            .init(device);
        let query = Initializer::Normal { mean: 0.0, std: 1.0 }.init([self.query_dim], device);
        AdditiveAttention { projection, query }
    }
}

#[derive(Module, Debug)]
pub struct AdditiveAttention<B: Backend> {
    pub projection: Linear<B>,
    pub query:      Param<Tensor<B, 1>>,
}

impl<B: Backend> AdditiveAttention<B> {
    /// x: [batch, length, input_dim] → weights: [batch, length]
    ///
    /// Each row of the result is a distribution over `length`.
    /// Positions set in `exclude` get weight 0. At least one position
    /// per row must stay unexcluded; a fully excluded row is a caller
    /// error and yields a uniform distribution over padding.
    pub fn forward(&self, x: Tensor<B, 3>, exclude: Option<Tensor<B, 2, Bool>>) -> Tensor<B, 2> {
        let [batch, length, _] = x.dims();
        let [query_dim] = self.query.val().dims();

        let projected = self.projection.forward(x).tanh(); // [batch, length, query_dim]
        let query     = self.query.val().reshape([1, 1, query_dim]);
        let scores: Tensor<B, 2> = (projected * query).sum_dim(2).reshape([batch, length]);

        let scores = match exclude {
            Some(mask) => {
                assert_eq!(
                    mask.dims(),
                    [batch, length],
                    "additive attention exclusion mask must be (batch, length)"
                );
                scores.mask_fill(mask, EXCLUDED_SCORE)
            }
            None => scores,
        };

        softmax(scores, 1)
    }
}

// ─── Multi-Head Self-Attention ───────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct SelfAttentionBlockConfig {
    pub d_model: usize,
    pub n_heads: usize,
    #[config(default = 0.0)]
    pub dropout: f64,
}

impl SelfAttentionBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SelfAttentionBlock<B> {
        assert!(
            self.n_heads > 0 && self.d_model % self.n_heads == 0,
            "d_model ({}) must split evenly into {} heads",
            self.d_model,
            self.n_heads
        );
        let mha = MultiHeadAttentionConfig::new(self.d_model, self.n_heads)
            .with_dropout(self.dropout)
            .init(device);
        SelfAttentionBlock { mha }
    }
}

#[derive(Module, Debug)]
pub struct SelfAttentionBlock<B: Backend> {
    pub mha: MultiHeadAttention<B>,
}

/// Contextualised sequence plus head-averaged attention weights.
#[derive(Debug, Clone)]
pub struct SelfAttentionOutput<B: Backend> {
    /// [batch, length, d_model]
    pub context: Tensor<B, 3>,
    /// [batch, length (query), length (key)]
    pub weights: Tensor<B, 3>,
}

impl<B: Backend> SelfAttentionBlock<B> {
    /// `key_padding_mask`: [batch, length], `true` = ignore this key.
    /// Ignored keys get zero weight and cannot reach any query's output.
    pub fn forward(
        &self,
        x: Tensor<B, 3>,
        key_padding_mask: Option<Tensor<B, 2, Bool>>,
    ) -> SelfAttentionOutput<B> {
        let [batch, length, _] = x.dims();

        let input = MhaInput::self_attn(x);
        let input = match key_padding_mask {
            Some(mask) => {
                assert_eq!(
                    mask.dims(),
                    [batch, length],
                    "key padding mask must be (batch, length)"
                );
                input.mask_pad(mask)
            }
            None => input,
        };

        let output = self.mha.forward(input);
        // [batch, heads, length, length] → mean over heads
        let weights = output.weights.mean_dim(1).reshape([batch, length, length]);

        SelfAttentionOutput { context: output.context, weights }
    }
}
