// ============================================================
// Layer 3 — Impression Domain Types
// ============================================================
// An impression is what one user saw and clicked:
//   - clicked:   titles the user read before (the history)
//   - positive:  the candidate the user actually clicked
//   - negatives: K candidates shown but not clicked
//
// Titles arrive already tokenized. Recommendation is framed
// as (K+1)-way classification: which of the K+1 candidates
// did the user click?
//
// Example JSON line:
//   {"user_id": "U13",
//    "clicked":   [{"input_ids": [2, 734, 3], "attention_mask": [1, 1, 1]}],
//    "positive":  {"input_ids": [2, 91, 3],   "attention_mask": [1, 1, 1]},
//    "negatives": [{"input_ids": [2, 18, 3],  "attention_mask": [1, 1, 1]}]}

use serde::{Deserialize, Serialize};

use crate::domain::error::BatchError;

/// Group name of the scored candidates (positive + negatives).
pub const LABELED_GROUP: &str = "labeled";
/// Group name of the user's reading history.
pub const CLICKED_GROUP: &str = "clicked";

/// One news title as token ids with its attention mask
/// (1 = real token, 0 = padding).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizedTitle {
    pub input_ids:      Vec<u32>,
    pub attention_mask: Vec<u32>,
}

impl TokenizedTitle {
    pub fn new(input_ids: Vec<u32>, attention_mask: Vec<u32>) -> Self {
        Self { input_ids, attention_mask }
    }

    /// Stand-in for an empty history slot.
    ///
    /// Position 0 is marked real so the token-level attention of the
    /// news encoder always has one unmasked key; the slot itself is
    /// removed one level up by the softmax-padding mask.
    pub fn placeholder(len: usize, pad_id: u32) -> Self {
        let mut attention_mask = vec![0; len];
        if let Some(first) = attention_mask.first_mut() {
            *first = 1;
        }
        Self { input_ids: vec![pad_id; len], attention_mask }
    }

    /// Truncate or right-pad to exactly `len` tokens.
    pub fn fit_to(&self, len: usize, pad_id: u32) -> Self {
        let mut input_ids      = self.input_ids.clone();
        let mut attention_mask = self.attention_mask.clone();
        input_ids.truncate(len);
        attention_mask.truncate(len);
        input_ids.resize(len, pad_id);
        attention_mask.resize(len, 0);
        Self { input_ids, attention_mask }
    }

    /// Number of token positions, padding included.
    pub fn seq_len(&self) -> usize {
        self.input_ids.len()
    }
}

#[cfg(test)]
impl TokenizedTitle {
    /// A title with every token marked real.
    pub(crate) fn from_ids(input_ids: Vec<u32>) -> Self {
        let attention_mask = vec![1; input_ids.len()];
        Self { input_ids, attention_mask }
    }

    /// Number of positions marked as real tokens.
    pub(crate) fn real_tokens(&self) -> usize {
        self.attention_mask.iter().filter(|&&m| m != 0).count()
    }
}

/// A validated training impression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Impression {
    pub user_id:   String,
    pub clicked:   Vec<TokenizedTitle>,
    pub positive:  TokenizedTitle,
    pub negatives: Vec<TokenizedTitle>,
}

impl Impression {
    /// Candidates in scoring order: the clicked one first, then negatives.
    /// The label of every impression is therefore index 0.
    pub fn labeled(&self) -> impl Iterator<Item = &TokenizedTitle> {
        std::iter::once(&self.positive).chain(self.negatives.iter())
    }
}

// ─── Raw (unvalidated) form ──────────────────────────────────────────────────
// Every field is optional so that absence can be reported by name
// instead of as a generic deserialisation failure.

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTitle {
    pub input_ids:      Option<Vec<u32>>,
    pub attention_mask: Option<Vec<u32>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawImpression {
    #[serde(default)]
    pub user_id:   String,
    pub clicked:   Option<Vec<RawTitle>>,
    pub positive:  Option<RawTitle>,
    pub negatives: Option<Vec<RawTitle>>,
}

impl RawTitle {
    fn validate(self, group: &'static str) -> Result<TokenizedTitle, BatchError> {
        let input_ids = self
            .input_ids
            .ok_or(BatchError::MissingField { group, field: "input_ids" })?;
        let attention_mask = self
            .attention_mask
            .ok_or(BatchError::MissingField { group, field: "attention_mask" })?;
        if input_ids.len() != attention_mask.len() {
            return Err(BatchError::MaskLengthMismatch {
                group,
                ids:  input_ids.len(),
                mask: attention_mask.len(),
            });
        }
        Ok(TokenizedTitle { input_ids, attention_mask })
    }
}

impl TryFrom<RawImpression> for Impression {
    type Error = BatchError;

    fn try_from(raw: RawImpression) -> Result<Self, Self::Error> {
        let clicked = raw
            .clicked
            .ok_or(BatchError::MissingField { group: CLICKED_GROUP, field: "titles" })?
            .into_iter()
            .map(|t| t.validate(CLICKED_GROUP))
            .collect::<Result<Vec<_>, _>>()?;

        let positive = raw
            .positive
            .ok_or(BatchError::MissingField { group: LABELED_GROUP, field: "positive" })?
            .validate(LABELED_GROUP)?;

        let negatives = raw
            .negatives
            .ok_or(BatchError::MissingField { group: LABELED_GROUP, field: "negatives" })?
            .into_iter()
            .map(|t| t.validate(LABELED_GROUP))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Impression { user_id: raw.user_id, clicked, positive, negatives })
    }
}
