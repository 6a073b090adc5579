// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns that don't belong in any specific
// business layer:
//
//   checkpoint.rs      — Saving and loading model weights
//                        at full precision with Burn's
//                        NamedMpkFileRecorder, plus the
//                        train and model configs as JSON so
//                        inference can rebuild the model.
//
//   pretrained.rs      — Locating a named pretrained document
//                        encoder: config.json, weights and
//                        tokenizer under one directory.
//
//   tokenizer_store.rs — Loading the encoder's tokenizer and
//                        turning raw titles into fixed-length
//                        token ids for scoring.
//
//   metrics.rs         — Epoch-level averages appended to a
//                        CSV file.
//
//   attention_dump.rs  — CSV snapshots of candidate attention
//                        weights taken during validation.
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Pretrained document encoder lookup and loading
pub mod pretrained;

/// Tokenizer loading and title encoding
pub mod tokenizer_store;

/// Training metrics CSV logger
pub mod metrics;

/// Attention weight snapshots
pub mod attention_dump;
