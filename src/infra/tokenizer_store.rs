// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Loads the HuggingFace tokenizer that ships with a pretrained
// document encoder and turns raw titles into fixed-length
// TokenizedTitles for scoring.
//
// Titles are encoded with special tokens ([CLS] … [SEP]),
// truncated to the title length and right-padded with the
// tokenizer's [PAD] id (0 when the vocabulary has none).
//
// Reference: tokenizers crate documentation

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokenizers::Tokenizer;

use crate::domain::impression::TokenizedTitle;

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Load `tokenizer.json` from the store directory.
    pub fn load(&self) -> Result<TitleTokenizer> {
        let path = self.dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&path)
            .map_err(|e| anyhow::anyhow!(
                "Cannot load tokenizer from '{}': {}", path.display(), e
            ))?;
        tracing::debug!("Loaded tokenizer from '{}'", path.display());
        Ok(TitleTokenizer::new(tokenizer))
    }
}

/// A tokenizer bound to a padding id.
pub struct TitleTokenizer {
    tokenizer: Tokenizer,
    pad_id:    u32,
}

impl TitleTokenizer {
    pub fn new(tokenizer: Tokenizer) -> Self {
        let pad_id = tokenizer.token_to_id("[PAD]").unwrap_or(0);
        Self { tokenizer, pad_id }
    }

    pub fn pad_id(&self) -> u32 {
        self.pad_id
    }

    /// Encode one title to exactly `len` tokens.
    pub fn encode(&self, title: &str, len: usize) -> Result<TokenizedTitle> {
        let encoding = self
            .tokenizer
            .encode(title, true)
            .map_err(|e| anyhow::anyhow!("Tokenization failed: {e}"))
            .with_context(|| format!("Cannot tokenize title {title:?}"))?;

        let title = TokenizedTitle::new(
            encoding.get_ids().to_vec(),
            encoding.get_attention_mask().to_vec(),
        );
        Ok(title.fit_to(len, self.pad_id))
    }

    pub fn encode_all(&self, titles: &[String], len: usize) -> Result<Vec<TokenizedTitle>> {
        titles.iter().map(|t| self.encode(t, len)).collect()
    }
}
