// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All model, training and inference code built on Burn.
//
//   attention.rs    — additive attention pooling and the
//                     multi-head self-attention block
//   positional.rs   — sinusoidal position signal for histories
//   doc_encoder.rs  — ELECTRA/BERT-style contextual encoder
//                     with freeze policies
//   news_encoder.rs — token embeddings → one news vector
//   user_encoder.rs — news vectors → one user vector
//   model.rs        — NRMS: dot-product scores and the
//                     (K+1)-way cross-entropy loss
//   accumulator.rs  — per-epoch loss averaging
//   scheduler.rs    — reduce-on-plateau learning rate
//   trainer.rs      — training, validation and test steps
//   inferencer.rs   — checkpoint loading and scoring
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Wu et al. (2019) NRMS

pub mod attention;
pub mod positional;
pub mod doc_encoder;
pub mod news_encoder;
pub mod user_encoder;

/// The full NRMS recommender
pub mod model;

pub mod accumulator;
pub mod scheduler;

/// Training loop with validation, checkpoints and metrics
pub mod trainer;

/// Loads a checkpoint and scores candidates
pub mod inferencer;
