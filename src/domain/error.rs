// ============================================================
// Layer 3 — Batch Schema Errors
// ============================================================
// The data pipeline hands over per-group records
// (`labeled`, `clicked`) that must carry `input_ids` and
// `attention_mask`, and in the padded-history profile also a
// `softmax_padding_mask`. A missing field is reported by name
// so the caller knows exactly which part of the batch is wrong.

use thiserror::Error;

/// Validation failures for incoming impressions and batches.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    /// A required field of a batch group is absent.
    #[error("batch group `{group}` is missing required field `{field}`")]
    MissingField {
        group: &'static str,
        field: &'static str,
    },

    /// `input_ids` and `attention_mask` of one title disagree in length.
    #[error("batch group `{group}`: input_ids has {ids} tokens but attention_mask has {mask}")]
    MaskLengthMismatch {
        group: &'static str,
        ids:   usize,
        mask:  usize,
    },

    /// A group needs at least this many titles and got fewer.
    #[error("batch group `{group}` needs at least {needed} titles, got {got}")]
    TooFewTitles {
        group:  &'static str,
        needed: usize,
        got:    usize,
    },
}
