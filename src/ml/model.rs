// ============================================================
// Layer 5 — NRMS Scoring Model
// ============================================================
// Wires the three encoders together and scores candidates:
//
//   labeled ids [U, K+1, L] ─► doc ─► news ─► candidates [U, K+1, E] ─┐
//                                                                    ├─► scores [U, K+1]
//   clicked ids [U, H, L]   ─► doc ─► news ─► user ─► user [U, E] ────┘
//
//   score[u][k] = candidate[u][k] · user[u]
//   loss        = cross-entropy(scores, label index)
//
// The document and news encoders work on a flat article axis,
// so (U, A, L) inputs are folded to (U·A, L) and unfolded after.
//
// Reference: Wu et al. (2019) Neural News Recommendation with
//            Multi-Head Self-Attention

use burn::{
    module::Ignored,
    nn::loss::CrossEntropyLossConfig,
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::data::batcher::{NrmsBatch, TitleGroup};
use crate::domain::error::BatchError;
use crate::domain::impression::CLICKED_GROUP;
use crate::ml::doc_encoder::{ContextualEncoder, DocEncoder, DocEncoderConfig, FreezePolicy};
use crate::ml::news_encoder::{NewsEncoder, NewsEncoderConfig};
use crate::ml::user_encoder::{UserEncoder, UserEncoderConfig};

/// How the reading history is shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryMasking {
    /// Every history slot holds a real article
    Dense,
    /// Short histories are padded; the batch carries an article mask
    Padded,
}

/// The two configurations the model ships in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelProfile {
    /// Frozen document encoder, fully populated history
    Base,
    /// Last document-encoder layer fine-tuned, padded history,
    /// history order signalled through positional encoding
    Extended,
}

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct NrmsConfig {
    pub doc_encoder:            DocEncoderConfig,
    /// Width of news and user vectors
    #[config(default = 128)]
    pub encoder_dim:            usize,
    #[config(default = 8)]
    pub num_heads_news_encoder: usize,
    #[config(default = 8)]
    pub num_heads_user_encoder: usize,
    #[config(default = 0.2)]
    pub dropout:                f64,
    #[config(default = "FreezePolicy::AllFrozen")]
    pub freeze_policy:          FreezePolicy,
    #[config(default = "HistoryMasking::Dense")]
    pub history_masking:        HistoryMasking,
    #[config(default = false)]
    pub positional_encoding:    bool,
    #[config(default = 50)]
    pub max_history:            usize,
}

impl NrmsConfig {
    pub fn with_profile(self, profile: ModelProfile) -> Self {
        match profile {
            ModelProfile::Base => self
                .with_freeze_policy(FreezePolicy::AllFrozen)
                .with_history_masking(HistoryMasking::Dense)
                .with_positional_encoding(false),
            ModelProfile::Extended => self
                .with_freeze_policy(FreezePolicy::LastLayerTrainable)
                .with_history_masking(HistoryMasking::Padded)
                .with_positional_encoding(true),
        }
    }

    /// Randomly initialised document encoder; tests and from-scratch runs.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Nrms<B> {
        self.init_with_doc_encoder(self.doc_encoder.init(device), device)
    }

    /// Build around an already loaded document encoder and freeze it.
    pub fn init_with_doc_encoder<B: Backend>(
        &self,
        doc_encoder: DocEncoder<B>,
        device: &B::Device,
    ) -> Nrms<B> {
        let input_dim = doc_encoder.embed_dim();
        let news_encoder = NewsEncoderConfig::new(input_dim, self.encoder_dim)
            .with_num_heads(self.num_heads_news_encoder)
            .with_dropout(self.dropout)
            .init(device);
        let user_encoder = UserEncoderConfig::new(self.encoder_dim)
            .with_num_heads(self.num_heads_user_encoder)
            .with_dropout(self.dropout)
            .with_positional_encoding(self.positional_encoding)
            .with_max_history(self.max_history)
            .init(device);

        Nrms {
            doc_encoder: doc_encoder.apply_freeze(self.freeze_policy),
            news_encoder,
            user_encoder,
            input_dim,
            encoder_dim: self.encoder_dim,
            history_masking: Ignored(self.history_masking),
        }
    }
}

#[derive(Module, Debug)]
pub struct Nrms<B: Backend> {
    pub doc_encoder:     DocEncoder<B>,
    pub news_encoder:    NewsEncoder<B>,
    pub user_encoder:    UserEncoder<B>,
    pub input_dim:       usize,
    pub encoder_dim:     usize,
    pub history_masking: Ignored<HistoryMasking>,
}

/// News vectors of one title group, back in (users, articles) layout.
#[derive(Debug, Clone)]
pub struct NewsGroupOutput<B: Backend> {
    /// [U, A, E]
    pub news_vectors:     Tensor<B, 3>,
    /// [U·A, L, L]
    pub context_weights:  Tensor<B, 3>,
    /// [U·A, L]
    pub additive_weights: Tensor<B, 2>,
}

#[derive(Debug, Clone)]
pub struct NrmsOutput<B: Backend> {
    /// [U, K+1]
    pub scores:           Tensor<B, 2>,
    /// Candidate self-attention weights [U·(K+1), L, L]
    pub context_weights:  Tensor<B, 3>,
    /// Candidate token pooling weights [U·(K+1), L]
    pub additive_weights: Tensor<B, 2>,
}

#[derive(Debug, Clone)]
pub struct NrmsLoss<B: Backend> {
    /// Scalar, shape [1]
    pub loss:   Tensor<B, 1>,
    pub output: NrmsOutput<B>,
}

impl<B: Backend> Nrms<B> {
    /// ids, mask: [U, A, L] → embeddings [U·A, L, D]
    pub fn forward_doc_encoder(
        &self,
        input_ids: Tensor<B, 3, Int>,
        attention_mask: Tensor<B, 3, Int>,
    ) -> Tensor<B, 3> {
        let [users, articles, seq_len] = input_ids.dims();
        assert_eq!(
            attention_mask.dims(),
            [users, articles, seq_len],
            "attention_mask must have the same shape as input_ids"
        );

        let ids  = input_ids.reshape([users * articles, seq_len]);
        let mask = attention_mask.reshape([users * articles, seq_len]);
        let embeddings = self.doc_encoder.encode(ids, mask);
        tracing::trace!("doc encoder output: {:?}", embeddings.dims());
        embeddings
    }

    /// Encode every title of a group into one news vector.
    pub fn forward_news_encoder(&self, group: &TitleGroup<B>) -> NewsGroupOutput<B> {
        let [users, articles, seq_len] = group.input_ids.dims();
        let embeddings = self.forward_doc_encoder(
            group.input_ids.clone(),
            group.attention_mask.clone(),
        );

        let key_padding_mask = match &group.key_padding_mask {
            Some(mask) => mask.clone(),
            None => group.attention_mask.clone().equal_elem(0),
        }
        .reshape([users * articles, seq_len]);

        let out = self.news_encoder.forward(embeddings, key_padding_mask, None);
        NewsGroupOutput {
            news_vectors:     out.news_vector.reshape([users, articles, self.encoder_dim]),
            context_weights:  out.context_weights,
            additive_weights: out.additive_weights,
        }
    }

    /// Pool a clicked-history group into one vector per user: [U, E].
    ///
    /// A padded-history model requires the group's article mask.
    pub fn forward_user_encoder(&self, group: &TitleGroup<B>) -> Result<Tensor<B, 2>, BatchError> {
        let article_mask = match self.history_masking.0 {
            HistoryMasking::Dense => None,
            HistoryMasking::Padded => Some(group.softmax_padding_mask.clone().ok_or(
                BatchError::MissingField { group: CLICKED_GROUP, field: "softmax_padding_mask" },
            )?),
        };

        let news = self.forward_news_encoder(group);
        let [users, _, _] = news.news_vectors.dims();
        let user = self.user_encoder.forward(news.news_vectors, article_mask);
        tracing::trace!("history pooling weights: {:?}", user.additive_weights.dims());
        let user_vector = user.user_vector;

        assert_eq!(
            user_vector.dims(),
            [users, self.encoder_dim],
            "user encoder must collapse the article axis"
        );
        Ok(user_vector)
    }

    /// Score every labeled candidate against the user built from `clicked`.
    pub fn forward(
        &self,
        labeled: &TitleGroup<B>,
        clicked: &TitleGroup<B>,
    ) -> Result<NrmsOutput<B>, BatchError> {
        let candidates = self.forward_news_encoder(labeled);
        let user       = self.forward_user_encoder(clicked)?;
        let scores     = dot_scores(candidates.news_vectors, user);

        Ok(NrmsOutput {
            scores,
            context_weights:  candidates.context_weights,
            additive_weights: candidates.additive_weights,
        })
    }

    pub fn compute_loss(&self, batch: &NrmsBatch<B>) -> Result<NrmsLoss<B>, BatchError> {
        let output = self.forward(&batch.labeled, &batch.clicked)?;
        let loss   = ranking_loss(output.scores.clone(), batch.labels.clone());
        Ok(NrmsLoss { loss, output })
    }
}

/// news: [U, K, E], user: [U, E] → scores [U, K]
pub fn dot_scores<B: Backend>(news: Tensor<B, 3>, user: Tensor<B, 2>) -> Tensor<B, 2> {
    let [users, candidates, dim] = news.dims();
    assert_eq!(user.dims(), [users, dim], "user vectors must be (users, encoder_dim)");
    news.matmul(user.reshape([users, dim, 1]))
        .reshape([users, candidates])
}

/// Cross-entropy over the candidate axis; labels: [U, 1] candidate indices.
pub fn ranking_loss<B: Backend>(scores: Tensor<B, 2>, labels: Tensor<B, 2, Int>) -> Tensor<B, 1> {
    let [users, _] = scores.dims();
    assert_eq!(labels.dims(), [users, 1], "labels must be (users, 1)");
    CrossEntropyLossConfig::new()
        .init(&scores.device())
        .forward(scores, labels.reshape([users]))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ml::doc_encoder::tests::tiny_config;
    use burn::backend::NdArray;
    use burn::tensor::{Distribution, TensorData};

    type TestBackend = NdArray<f32>;

    pub(crate) fn tiny_nrms_config() -> NrmsConfig {
        NrmsConfig::new(tiny_config())
            .with_encoder_dim(8)
            .with_num_heads_news_encoder(2)
            .with_num_heads_user_encoder(2)
            .with_max_history(8)
    }

    /// Random ids in 1..vocab with the last `pad` positions of every title padded.
    pub(crate) fn random_group<B: Backend>(
        users: usize,
        articles: usize,
        seq_len: usize,
        pad: usize,
        device: &B::Device,
    ) -> TitleGroup<B> {
        let ids = Tensor::<B, 3, Int>::random(
            [users, articles, seq_len],
            Distribution::Uniform(1.0, 49.0),
            device,
        );
        let mask: Vec<i64> = (0..users * articles)
            .flat_map(|_| (0..seq_len).map(|i| i64::from(i < seq_len - pad)))
            .collect();
        let mask = Tensor::<B, 3, Int>::from_data(
            TensorData::new(mask, [users, articles, seq_len]),
            device,
        );
        TitleGroup::new(ids, mask)
    }

    fn to_vec(t: Tensor<TestBackend, 2>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_output_shapes() {
        let device = Default::default();
        let model = tiny_nrms_config().init::<TestBackend>(&device);

        let labeled = random_group::<TestBackend>(2, 5, 6, 2, &device);
        let clicked = random_group::<TestBackend>(2, 3, 6, 1, &device);

        let news = model.forward_news_encoder(&labeled);
        assert_eq!(news.news_vectors.dims(), [2, 5, 8]);
        assert_eq!(news.context_weights.dims(), [10, 6, 6]);
        assert_eq!(news.additive_weights.dims(), [10, 6]);

        let user = model.forward_user_encoder(&clicked).unwrap();
        assert_eq!(user.dims(), [2, 8]);

        let out = model.forward(&labeled, &clicked).unwrap();
        assert_eq!(out.scores.dims(), [2, 5]);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let device = Default::default();
        let model = tiny_nrms_config().init::<TestBackend>(&device);

        let labeled = random_group::<TestBackend>(2, 5, 6, 2, &device);
        let clicked = random_group::<TestBackend>(2, 4, 6, 0, &device);

        let first  = to_vec(model.forward(&labeled, &clicked).unwrap().scores);
        let second = to_vec(model.forward(&labeled, &clicked).unwrap().scores);
        for (a, b) in first.iter().zip(&second) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_loss_is_lower_when_label_aligns() {
        let device = Default::default();
        // user 0 and user 1 both point along the first axis
        let user = Tensor::<TestBackend, 2>::from_floats([[1.0, 0.0, 0.0], [1.0, 0.0, 0.0]], &device);
        let aligned_at = |idx: usize| {
            let mut values = vec![0.0f32; 2 * 5 * 3];
            for u in 0..2 {
                for k in 0..5 {
                    let base = (u * 5 + k) * 3;
                    values[base + 1] = 1.0;
                    if k == idx {
                        values[base] = 5.0;
                    }
                }
            }
            Tensor::<TestBackend, 3>::from_data(TensorData::new(values, [2, 5, 3]), &device)
        };
        let labels = Tensor::<TestBackend, 2, Int>::zeros([2, 1], &device);

        let good = ranking_loss(dot_scores(aligned_at(0), user.clone()), labels.clone());
        let bad  = ranking_loss(dot_scores(aligned_at(3), user), labels);

        let good: f32 = good.into_scalar();
        let bad:  f32 = bad.into_scalar();
        assert!(good < bad, "aligned loss {good} should be below misaligned loss {bad}");
    }

    #[test]
    fn test_dot_scores() {
        let device = Default::default();
        let news = Tensor::<TestBackend, 3>::from_floats([[[1.0, 2.0], [3.0, 4.0]]], &device);
        let user = Tensor::<TestBackend, 2>::from_floats([[10.0, 1.0]], &device);
        assert_eq!(to_vec(dot_scores(news, user)), vec![12.0, 34.0]);
    }

    /// `true` from position `from` onwards in every title.
    fn mask_from<B: Backend>(
        users: usize,
        articles: usize,
        seq_len: usize,
        from: i64,
        device: &B::Device,
    ) -> Tensor<B, 3, Bool> {
        let positions: Vec<i64> = (0..users * articles).flat_map(|_| 0..seq_len as i64).collect();
        Tensor::<B, 3, Int>::from_data(TensorData::new(positions, [users, articles, seq_len]), device)
            .greater_equal_elem(from)
    }

    #[test]
    fn test_supplied_key_padding_mask_overrides_attention_mask() {
        let device = Default::default();
        let model = tiny_nrms_config().init::<TestBackend>(&device);
        let news_vectors = |group: &TitleGroup<TestBackend>| {
            model.forward_news_encoder(group).news_vectors.into_data().to_vec::<f32>().unwrap()
        };

        // positions 4 and 5 are padding
        let group   = random_group::<TestBackend>(1, 2, 6, 2, &device);
        let derived = news_vectors(&group);

        let same = group.clone().with_key_padding_mask(mask_from(1, 2, 6, 4, &device));
        for (a, b) in derived.iter().zip(&news_vectors(&same)) {
            assert!((a - b).abs() < 1e-6);
        }

        // also hide the real token at position 3
        let wider = group.with_key_padding_mask(mask_from(1, 2, 6, 3, &device));
        let diff: f32 = derived.iter().zip(&news_vectors(&wider)).map(|(a, b)| (a - b).abs()).sum();
        assert!(diff > 1e-6, "a supplied mask must replace the derived one");
    }

    #[test]
    #[should_panic(expected = "key_padding_mask must have the same shape as input_ids")]
    fn test_key_padding_mask_shape_is_checked() {
        let device = Default::default();
        let group = random_group::<TestBackend>(1, 2, 6, 2, &device);
        let _ = group.with_key_padding_mask(mask_from(1, 2, 5, 4, &device));
    }

    #[test]
    fn test_padded_history_requires_article_mask() {
        let device = Default::default();
        let model = tiny_nrms_config()
            .with_profile(ModelProfile::Extended)
            .init::<TestBackend>(&device);

        let clicked = random_group::<TestBackend>(1, 3, 6, 1, &device);
        let err = model.forward_user_encoder(&clicked).unwrap_err();
        assert_eq!(
            err,
            BatchError::MissingField { group: CLICKED_GROUP, field: "softmax_padding_mask" }
        );

        let mask = Tensor::<TestBackend, 2>::from_floats([[1.0, 1.0, 0.0]], &device);
        let user = model
            .forward_user_encoder(&clicked.with_softmax_padding_mask(mask))
            .unwrap();
        assert_eq!(user.dims(), [1, 8]);
    }

    #[test]
    fn test_profiles() {
        let base = tiny_nrms_config().with_profile(ModelProfile::Base);
        assert_eq!(base.freeze_policy, FreezePolicy::AllFrozen);
        assert_eq!(base.history_masking, HistoryMasking::Dense);
        assert!(!base.positional_encoding);

        let extended = tiny_nrms_config().with_profile(ModelProfile::Extended);
        assert_eq!(extended.freeze_policy, FreezePolicy::LastLayerTrainable);
        assert_eq!(extended.history_masking, HistoryMasking::Padded);
        assert!(extended.positional_encoding);
    }
}
