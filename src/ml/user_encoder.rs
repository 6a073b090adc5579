// ============================================================
// Layer 5 — User Encoder
// ============================================================
// The news-encoder pattern one level up: attends over the
// vectors of the articles a user has read and pools them into
// one user vector.
//
//   history [U, A, E] ──► (optional) positional encoding
//                     ──► multi-head self-attention ──► context
//   context ──► Linear(E → E) + tanh                ──► transformed
//   context ──► additive attention                  ──► weights [U, A]
//   weights · transformed                           ──► user [U, E]
//
// With a padded history an article mask (1 = real, 0 = padding)
// hides padded slots from the self-attention keys and zeroes
// their pooling weight after the softmax. The remaining weights
// are not renormalised: a padded slot's score still sits in the
// softmax denominator, so its content scales the real weights
// down uniformly while their ratios stay fixed.

use burn::prelude::*;
use burn::nn::{Initializer, Linear, LinearConfig};

use crate::ml::attention::{
    AdditiveAttention, AdditiveAttentionConfig, SelfAttentionBlock, SelfAttentionBlockConfig,
};
use crate::ml::news_encoder::weighted_sum;
use crate::ml::positional::{PositionalEncoding, PositionalEncodingConfig};

#[derive(Config, Debug)]
pub struct UserEncoderConfig {
    pub encoder_dim: usize,
    #[config(default = 8)]
    pub num_heads: usize,
    #[config(default = 0.2)]
    pub dropout: f64,
    /// Add a position signal so history order is visible
    #[config(default = false)]
    pub positional_encoding: bool,
    /// Longest history the positional table covers
    #[config(default = 50)]
    pub max_history: usize,
}

impl UserEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> UserEncoder<B> {
        let positional = self.positional_encoding.then(|| {
            PositionalEncodingConfig::new(self.max_history, self.encoder_dim).init(device)
        });
        UserEncoder {
            positional,
            self_attention: SelfAttentionBlockConfig::new(self.encoder_dim, self.num_heads)
                .with_dropout(self.dropout)
                .init(device),
            projection: LinearConfig::new(self.encoder_dim, self.encoder_dim)
                .with_initializer(Initializer::XavierNormal { gain: 1.0 })
                .init(device),
            additive_attention: AdditiveAttentionConfig::new(self.encoder_dim, self.encoder_dim)
                .init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct UserEncoder<B: Backend> {
    pub positional:         Option<PositionalEncoding<B>>,
    pub self_attention:     SelfAttentionBlock<B>,
    pub projection:         Linear<B>,
    pub additive_attention: AdditiveAttention<B>,
}

#[derive(Debug, Clone)]
pub struct UserEncoderOutput<B: Backend> {
    /// [U, E]
    pub user_vector:      Tensor<B, 2>,
    /// Per-article pooling weights [U, A]
    pub additive_weights: Tensor<B, 2>,
}

impl<B: Backend> UserEncoder<B> {
    /// news_vectors: [U, A, E]; `article_mask`: [U, A], 1 = real, 0 = padding.
    pub fn forward(
        &self,
        news_vectors: Tensor<B, 3>,
        article_mask: Option<Tensor<B, 2>>,
    ) -> UserEncoderOutput<B> {
        let [users, articles, _] = news_vectors.dims();
        tracing::trace!("user encoder input: {:?}", news_vectors.dims());

        let x = match &self.positional {
            Some(positional) => positional.forward(news_vectors),
            None => news_vectors,
        };

        let key_padding = article_mask.as_ref().map(|mask| {
            assert_eq!(
                mask.dims(),
                [users, articles],
                "article mask must be (users, articles)"
            );
            mask.clone().equal_elem(0.0)
        });

        let context     = self.self_attention.forward(x, key_padding).context;
        let transformed = self.projection.forward(context.clone()).tanh();
        let weights     = self.additive_attention.forward(context, None);
        let weights     = match article_mask {
            Some(mask) => weights * mask,
            None => weights,
        };

        let user_vector = weighted_sum(weights.clone(), transformed);
        tracing::trace!("user encoder output: {:?}", user_vector.dims());

        UserEncoderOutput { user_vector, additive_weights: weights }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::{Distribution, TensorData};

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_collapses_article_axis() {
        let device = Default::default();
        let encoder = UserEncoderConfig::new(16).with_num_heads(4).init::<TestBackend>(&device);

        let history = Tensor::<TestBackend, 3>::random([2, 5, 16], Distribution::Default, &device);
        let out = encoder.forward(history, None);

        assert_eq!(out.user_vector.dims(), [2, 16]);
        assert_eq!(out.additive_weights.dims(), [2, 5]);
    }

    #[test]
    fn test_padded_article_gets_zero_weight_without_renormalising() {
        let device = Default::default();
        let encoder = UserEncoderConfig::new(8)
            .with_num_heads(2)
            .with_dropout(0.0)
            .init::<TestBackend>(&device);

        let history = Tensor::<TestBackend, 3>::random([1, 4, 8], Distribution::Default, &device);
        let mask = Tensor::<TestBackend, 2>::from_data(
            TensorData::new(vec![1.0f32, 1.0, 1.0, 0.0], [1, 4]),
            &device,
        );
        let out = encoder.forward(history, Some(mask));

        let weights = out.additive_weights.into_data().to_vec::<f32>().unwrap();
        assert_eq!(weights[3], 0.0);
        assert!(weights[..3].iter().all(|&w| w > 0.0));
        let total: f32 = weights.iter().sum();
        assert!(total < 1.0, "weights are not renormalised, got sum {total}");
    }

    #[test]
    fn test_padded_article_only_rescales_real_weights() {
        let device = Default::default();
        let encoder = UserEncoderConfig::new(8)
            .with_num_heads(2)
            .with_dropout(0.0)
            .init::<TestBackend>(&device);

        let real = Tensor::<TestBackend, 3>::random([1, 3, 8], Distribution::Default, &device);
        let pad_a = Tensor::<TestBackend, 3>::random([1, 1, 8], Distribution::Uniform(-3.0, 3.0), &device);
        let pad_b = Tensor::<TestBackend, 3>::random([1, 1, 8], Distribution::Uniform(-3.0, 3.0), &device);
        let mask = Tensor::<TestBackend, 2>::from_data(
            TensorData::new(vec![1.0f32, 1.0, 1.0, 0.0], [1, 4]),
            &device,
        );

        let run = |pad: Tensor<TestBackend, 3>| {
            let history = Tensor::cat(vec![real.clone(), pad], 1);
            encoder
                .forward(history, Some(mask.clone()))
                .additive_weights
                .into_data()
                .to_vec::<f32>()
                .unwrap()
        };
        let a = run(pad_a);
        let b = run(pad_b);

        assert_eq!(a[3], 0.0);
        assert_eq!(b[3], 0.0);
        // the padded key is masked, so real scores do not move; only the
        // shared denominator does
        for (i, j) in [(0, 1), (1, 2), (0, 2)] {
            let ratio_a = a[i] / a[j];
            let ratio_b = b[i] / b[j];
            assert!((ratio_a - ratio_b).abs() < 1e-4, "ratio w{i}/w{j}: {ratio_a} vs {ratio_b}");
        }
        let total_a: f32 = a.iter().sum();
        let total_b: f32 = b.iter().sum();
        assert!(total_a < 1.0 && total_b < 1.0);
    }

    #[test]
    fn test_positional_encoding_makes_order_visible() {
        let device = Default::default();
        let encoder = UserEncoderConfig::new(8)
            .with_num_heads(2)
            .with_positional_encoding(true)
            .with_max_history(4)
            .init::<TestBackend>(&device);
        assert!(encoder.positional.is_some());

        let first  = Tensor::<TestBackend, 3>::random([1, 1, 8], Distribution::Default, &device);
        let second = Tensor::<TestBackend, 3>::random([1, 1, 8], Distribution::Default, &device);

        let forward  = encoder.forward(Tensor::cat(vec![first.clone(), second.clone()], 1), None);
        let reversed = encoder.forward(Tensor::cat(vec![second, first], 1), None);

        let forward  = forward.user_vector.into_data().to_vec::<f32>().unwrap();
        let reversed = reversed.user_vector.into_data().to_vec::<f32>().unwrap();
        let diff: f32 = forward.iter().zip(&reversed).map(|(x, y)| (x - y).abs()).sum();
        assert!(diff > 1e-6);
    }
}
