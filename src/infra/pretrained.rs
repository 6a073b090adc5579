// ============================================================
// Layer 6 — Pretrained Document Encoder Store
// ============================================================
// Locates a pretrained encoder by name under a root directory:
//
//   <root>/<model_name>/
//     config.json      ← HuggingFace-style architecture config
//     model.mpk        ← weights as a Burn NamedMpk record
//     tokenizer.json   ← the matching HuggingFace tokenizer
//
// The model name may contain a slash (an organisation prefix),
// which simply becomes a nested directory.
//
// Weights are expected already converted to Burn's record
// format, so loading is a plain NamedMpkFileRecorder read.
//
// Reference: Burn Book §5 (Records)

use anyhow::{Context, Result};
use std::{fs, path::{Path, PathBuf}};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
};
use serde::Deserialize;

use crate::ml::doc_encoder::{DocEncoder, DocEncoderConfig};

/// Default encoder the system is tuned for.
pub const DEFAULT_MODEL_NAME: &str = "monologg/koelectra-base-v3-discriminator";

/// The subset of a HuggingFace ELECTRA/BERT config.json we need.
#[derive(Debug, Clone, Deserialize)]
struct HfEncoderConfig {
    vocab_size:              usize,
    hidden_size:             usize,
    #[serde(default)]
    embedding_size:          Option<usize>,
    num_hidden_layers:       usize,
    num_attention_heads:     usize,
    intermediate_size:       usize,
    #[serde(default = "default_max_positions")]
    max_position_embeddings: usize,
    #[serde(default = "default_type_vocab")]
    type_vocab_size:         usize,
    #[serde(default = "default_dropout")]
    hidden_dropout_prob:     f64,
    #[serde(default = "default_eps")]
    layer_norm_eps:          f64,
}

fn default_max_positions() -> usize { 512 }
fn default_type_vocab()    -> usize { 2 }
fn default_dropout()       -> f64   { 0.1 }
fn default_eps()           -> f64   { 1e-12 }

impl From<HfEncoderConfig> for DocEncoderConfig {
    fn from(hf: HfEncoderConfig) -> Self {
        DocEncoderConfig::new(
            hf.vocab_size,
            hf.embedding_size.unwrap_or(hf.hidden_size),
            hf.hidden_size,
            hf.num_hidden_layers,
            hf.num_attention_heads,
            hf.intermediate_size,
            hf.max_position_embeddings,
        )
        .with_type_vocab_size(hf.type_vocab_size)
        .with_hidden_dropout_prob(hf.hidden_dropout_prob)
        .with_layer_norm_eps(hf.layer_norm_eps)
    }
}

pub struct PretrainedStore {
    dir: PathBuf,
}

impl PretrainedStore {
    pub fn new(root: impl AsRef<Path>, model_name: &str) -> Self {
        Self { dir: root.as_ref().join(model_name) }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read `config.json` into a document encoder config.
    pub fn config(&self) -> Result<DocEncoderConfig> {
        let path = self.dir.join("config.json");
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read encoder config '{}'", path.display()))?;
        let hf: HfEncoderConfig = serde_json::from_str(&json)
            .with_context(|| format!("Invalid encoder config '{}'", path.display()))?;
        Ok(hf.into())
    }

    /// Build the encoder from `config.json` and load `model.mpk` into it.
    pub fn load_doc_encoder<B: Backend>(&self, device: &B::Device) -> Result<DocEncoder<B>> {
        let config  = self.config()?;
        let encoder = config.init::<B>(device);

        let path = self.dir.join("model");
        let record = NamedMpkFileRecorder::<FullPrecisionSettings>::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load pretrained weights '{}.mpk'", path.display())
            })?;

        tracing::info!(
            "Loaded pretrained document encoder from '{}' ({} layers, hidden={})",
            self.dir.display(),
            config.num_hidden_layers,
            config.hidden_size,
        );
        Ok(encoder.load_record(record))
    }
}
