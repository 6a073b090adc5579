// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between an impressions file and the tensors the
// model consumes:
//
//   impressions.jsonl
//       │
//       ▼
//   JsonlImpressionLoader → parses and validates each line
//       │
//       ▼
//   split_train_val       → seeded train/validation split
//       │
//       ▼
//   NrmsDataset           → implements Burn's Dataset trait
//       │
//       ▼
//   NrmsBatcher           → pads titles and histories into
//       │                   labeled/clicked title groups
//       ▼
//   DataLoader            → feeds batches to the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads pre-tokenized impressions from JSON lines
pub mod loader;

/// Implements Burn's Dataset trait for impressions
pub mod dataset;

/// Implements Burn's Batcher trait to create title groups
pub mod batcher;

/// Shuffles and splits data into train/validation sets
pub mod splitter;
