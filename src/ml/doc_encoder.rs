// ============================================================
// Layer 5 — Document Encoder
// ============================================================
// ELECTRA/BERT-style transformer that turns token ids into
// contextual per-token embeddings:
//
//   ids [N, L] ──► word + position + token-type embeddings
//              ──► LayerNorm, dropout (optional projection
//                  when embedding_size != hidden_size)
//              ──► num_hidden_layers × EncoderBlock
//              ──► embeddings [N, L, hidden_size]
//
// Weights come from a named pretrained checkpoint (see
// infra::pretrained). The encoder is frozen by policy:
//   AllFrozen          — nothing trains
//   LastLayerTrainable — only the final EncoderBlock trains
//
// Reference: Clark et al. (2020) ELECTRA
//            Devlin et al. (2019) BERT

use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
};
use serde::{Deserialize, Serialize};

/// Which document-encoder parameters receive gradients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FreezePolicy {
    /// Every parameter is frozen
    AllFrozen,
    /// Embeddings and all but the last layer are frozen
    LastLayerTrainable,
}

/// The contract the rest of the model relies on:
/// ids/mask [N, L] in, embeddings [N, L, embed_dim] out.
pub trait ContextualEncoder<B: Backend> {
    fn encode(&self, input_ids: Tensor<B, 2, Int>, attention_mask: Tensor<B, 2, Int>) -> Tensor<B, 3>;
    fn embed_dim(&self) -> usize;
}

// Field names follow the HuggingFace config.json so a pretrained
// config can be read straight into this struct.
#[derive(Config, Debug)]
pub struct DocEncoderConfig {
    pub vocab_size:              usize,
    pub embedding_size:          usize,
    pub hidden_size:             usize,
    pub num_hidden_layers:       usize,
    pub num_attention_heads:     usize,
    pub intermediate_size:       usize,
    pub max_position_embeddings: usize,
    #[config(default = 2)]
    pub type_vocab_size:         usize,
    #[config(default = 0.1)]
    pub hidden_dropout_prob:     f64,
    #[config(default = 1e-12)]
    pub layer_norm_eps:          f64,
}

impl DocEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> DocEncoder<B> {
        let embeddings = EmbeddingsConfig::from(self).init(device);
        let layers: Vec<EncoderBlock<B>> = (0..self.num_hidden_layers)
            .map(|_| self.build_encoder_block(device))
            .collect();
        DocEncoder { embeddings, layers, hidden_size: self.hidden_size }
    }

    fn build_encoder_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        let self_attn   = MultiHeadAttentionConfig::new(self.hidden_size, self.num_attention_heads)
            .with_dropout(self.hidden_dropout_prob)
            .init(device);
        let ffn_linear1 = LinearConfig::new(self.hidden_size, self.intermediate_size).init(device);
        let ffn_linear2 = LinearConfig::new(self.intermediate_size, self.hidden_size).init(device);
        let norm1   = LayerNormConfig::new(self.hidden_size).with_epsilon(self.layer_norm_eps).init(device);
        let norm2   = LayerNormConfig::new(self.hidden_size).with_epsilon(self.layer_norm_eps).init(device);
        let dropout = DropoutConfig::new(self.hidden_dropout_prob).init();
        EncoderBlock { self_attn, ffn_linear1, ffn_linear2, norm1, norm2, dropout }
    }
}

// ─── Embeddings ──────────────────────────────────────────────────────────────

struct EmbeddingsConfig {
    vocab_size:      usize,
    embedding_size:  usize,
    hidden_size:     usize,
    max_positions:   usize,
    type_vocab_size: usize,
    dropout:         f64,
    layer_norm_eps:  f64,
}

impl From<&DocEncoderConfig> for EmbeddingsConfig {
    fn from(c: &DocEncoderConfig) -> Self {
        Self {
            vocab_size:      c.vocab_size,
            embedding_size:  c.embedding_size,
            hidden_size:     c.hidden_size,
            max_positions:   c.max_position_embeddings,
            type_vocab_size: c.type_vocab_size,
            dropout:         c.hidden_dropout_prob,
            layer_norm_eps:  c.layer_norm_eps,
        }
    }
}

impl EmbeddingsConfig {
    fn init<B: Backend>(&self, device: &B::Device) -> DocEmbeddings<B> {
        // ELECTRA-small style checkpoints embed narrower than the encoder
        let projection = (self.embedding_size != self.hidden_size)
            .then(|| LinearConfig::new(self.embedding_size, self.hidden_size).init(device));
        DocEmbeddings {
            word_embeddings:       EmbeddingConfig::new(self.vocab_size, self.embedding_size).init(device),
            position_embeddings:   EmbeddingConfig::new(self.max_positions, self.embedding_size).init(device),
            token_type_embeddings: EmbeddingConfig::new(self.type_vocab_size, self.embedding_size).init(device),
            layer_norm: LayerNormConfig::new(self.embedding_size)
                .with_epsilon(self.layer_norm_eps)
                .init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            projection,
            max_positions: self.max_positions,
        }
    }
}

#[derive(Module, Debug)]
pub struct DocEmbeddings<B: Backend> {
    pub word_embeddings:       Embedding<B>,
    pub position_embeddings:   Embedding<B>,
    pub token_type_embeddings: Embedding<B>,
    pub layer_norm:            LayerNorm<B>,
    pub dropout:               Dropout,
    pub projection:            Option<Linear<B>>,
    pub max_positions:         usize,
}

impl<B: Backend> DocEmbeddings<B> {
    /// input_ids: [N, L] → [N, L, hidden_size]
    pub fn forward(&self, input_ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let [batch, seq_len] = input_ids.dims();
        let device = input_ids.device();
        assert!(
            seq_len <= self.max_positions,
            "sequence length {seq_len} exceeds max_position_embeddings {}",
            self.max_positions
        );

        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device)
            .reshape([1, seq_len])
            .repeat_dim(0, batch);
        let token_types = Tensor::<B, 2, Int>::zeros([batch, seq_len], &device);

        let x = self.word_embeddings.forward(input_ids)
            + self.position_embeddings.forward(positions)
            + self.token_type_embeddings.forward(token_types);
        let x = self.dropout.forward(self.layer_norm.forward(x));

        match &self.projection {
            Some(projection) => projection.forward(x),
            None => x,
        }
    }
}

// ─── Encoder Block ───────────────────────────────────────────────────────────
// Post-norm transformer layer: attention → add & norm → GELU FFN → add & norm

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    /// `mask_pad`: [N, L], `true` marks padding tokens.
    pub fn forward(&self, x: Tensor<B, 3>, mask_pad: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let attn_output = self
            .self_attn
            .forward(MhaInput::self_attn(x.clone()).mask_pad(mask_pad))
            .context;
        let x = self.norm1.forward(x + self.dropout.forward(attn_output));
        let ffn_out = self.ffn_linear2.forward(
            burn::tensor::activation::gelu(self.ffn_linear1.forward(x.clone()))
        );
        self.norm2.forward(x + self.dropout.forward(ffn_out))
    }
}

// ─── Document Encoder ────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct DocEncoder<B: Backend> {
    pub embeddings:  DocEmbeddings<B>,
    pub layers:      Vec<EncoderBlock<B>>,
    pub hidden_size: usize,
}

impl<B: Backend> DocEncoder<B> {
    /// Mark parameters as frozen according to `policy`.
    ///
    /// Call after loading pretrained weights so the flags apply
    /// to the loaded tensors.
    pub fn apply_freeze(self, policy: FreezePolicy) -> Self {
        let embeddings = self.embeddings.no_grad();
        let last = self.layers.len().saturating_sub(1);
        let layers = self
            .layers
            .into_iter()
            .enumerate()
            .map(|(i, layer)| match policy {
                FreezePolicy::LastLayerTrainable if i == last => layer,
                _ => layer.no_grad(),
            })
            .collect();
        tracing::debug!("Document encoder freeze policy: {:?}", policy);
        Self { embeddings, layers, hidden_size: self.hidden_size }
    }
}

impl<B: Backend> ContextualEncoder<B> for DocEncoder<B> {
    /// ids, mask: [N, L] → embeddings: [N, L, hidden_size]
    fn encode(&self, input_ids: Tensor<B, 2, Int>, attention_mask: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        assert_eq!(
            attention_mask.dims(),
            input_ids.dims(),
            "attention_mask must have the same shape as input_ids"
        );
        let mask_pad = attention_mask.equal_elem(0);

        let mut x = self.embeddings.forward(input_ids);
        for layer in &self.layers {
            x = layer.forward(x, mask_pad.clone());
        }
        x
    }

    fn embed_dim(&self) -> usize {
        self.hidden_size
    }
}
