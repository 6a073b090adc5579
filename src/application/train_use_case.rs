// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Load impressions          (Layer 4 - data)
//   Step 2: Split train/validation    (Layer 4 - data)
//   Step 3: Build datasets            (Layer 4 - data)
//   Step 4: Load held-out test file   (Layer 4 - data, optional)
//   Step 5: Save config               (Layer 6 - infra)
//   Step 6: Run training loop         (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::{
    dataset::NrmsDataset,
    loader::JsonlImpressionLoader,
    splitter::split_train_val,
};
use crate::domain::traits::ImpressionSource;
use crate::infra::{checkpoint::CheckpointManager, pretrained::DEFAULT_MODEL_NAME};
use crate::ml::model::ModelProfile;
use crate::ml::trainer::{run_training, TrainingData};

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run.
// Saved next to the checkpoints so `score` can rebuild the
// title and history shapes the model was trained with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub train_path:      String,
    pub test_path:       Option<String>,
    pub pretrained_root: String,
    pub model_name:      String,
    pub checkpoint_dir:  String,
    pub profile:         ModelProfile,
    pub seed:            u64,
    pub train_fraction:  f64,
    pub batch_size:      usize,
    pub epochs:          usize,
    pub lr:              f64,
    pub weight_decay:    f64,
    pub lr_factor:       f64,
    pub lr_patience:     usize,
    pub lr_threshold:    f64,
    pub min_lr:          f64,
    pub num_negatives:   usize,
    pub history_len:     usize,
    pub title_len:       usize,
    pub pad_id:          u32,
    pub encoder_dim:     usize,
    /// Dump attention weights every N validation steps (0 = off)
    pub visualize_every: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            train_path:      "data/impressions.jsonl".to_string(),
            test_path:       None,
            pretrained_root: "pretrained".to_string(),
            model_name:      DEFAULT_MODEL_NAME.to_string(),
            checkpoint_dir:  "checkpoints".to_string(),
            profile:         ModelProfile::Base,
            seed:            42,
            train_fraction:  0.8,
            batch_size:      32,
            epochs:          10,
            lr:              1e-4,
            weight_decay:    1e-5,
            lr_factor:       0.1,
            lr_patience:     5,
            lr_threshold:    1e-4,
            min_lr:          0.0,
            num_negatives:   4,
            history_len:     50,
            title_len:       30,
            pad_id:          0,
            encoder_dim:     128,
            visualize_every: 0,
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<()> {
        let cfg  = &self.config;
        let data = self.prepare_data()?;

        // ── Step 5: Save config for scoring ──────────────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir)?;
        ckpt_manager.save_config(cfg)?;

        // ── Step 6: Run training loop (Layer 5) ──────────────────────────────
        run_training(cfg, data, ckpt_manager)
    }

    /// Steps 1-4: everything up to the datasets the loop consumes.
    pub fn prepare_data(&self) -> Result<TrainingData> {
        let cfg = &self.config;

        // ── Step 1: Load impressions ─────────────────────────────────────────
        tracing::info!("Loading impressions from '{}'", cfg.train_path);
        let impressions = JsonlImpressionLoader::new(&cfg.train_path)
            .load_all()
            .with_context(|| format!("Cannot load training impressions '{}'", cfg.train_path))?;

        // ── Step 2: Seeded train / validation split ──────────────────────────
        let (train, valid) = split_train_val(impressions, cfg.train_fraction, cfg.seed);
        tracing::info!("Split: {} train, {} validation", train.len(), valid.len());

        // ── Step 3: Burn datasets ────────────────────────────────────────────
        let train = build_dataset("train", train, cfg.num_negatives);
        let valid = build_dataset("validation", valid, cfg.num_negatives);
        if train.sample_count() == 0 {
            anyhow::bail!(
                "No usable training impressions in '{}' (each needs at least {} negatives)",
                cfg.train_path,
                cfg.num_negatives,
            );
        }

        // ── Step 4: Optional held-out test set ───────────────────────────────
        let test = match &cfg.test_path {
            Some(path) => {
                let impressions = JsonlImpressionLoader::new(path)
                    .load_all()
                    .with_context(|| format!("Cannot load test impressions '{path}'"))?;
                Some(build_dataset("test", impressions, cfg.num_negatives))
            }
            None => None,
        };

        Ok(TrainingData { train, valid, test })
    }
}

fn build_dataset(
    split:         &str,
    impressions:   Vec<crate::domain::impression::Impression>,
    num_negatives: usize,
) -> NrmsDataset {
    let (dataset, dropped) = NrmsDataset::new(impressions, num_negatives);
    tracing::info!("{} set: {} impressions ({} dropped)", split, dataset.sample_count(), dropped);
    dataset
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::data::dataset::Dataset;
    use std::fs;

    fn line(user: &str, negatives: usize) -> String {
        let negs: Vec<String> = (0..negatives)
            .map(|i| format!(r#"{{"input_ids": [{}], "attention_mask": [1]}}"#, 20 + i))
            .collect();
        format!(
            r#"{{"user_id": "{user}", "clicked": [{{"input_ids": [5, 6], "attention_mask": [1, 1]}}], "positive": {{"input_ids": [7], "attention_mask": [1]}}, "negatives": [{}]}}"#,
            negs.join(", ")
        )
    }

    fn write_file(name: &str, lines: &[String]) -> String {
        let dir = std::env::temp_dir().join("nrms_rec_train_use_case");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, lines.join("\n")).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_prepare_data_splits_and_drops_short_impressions() {
        let mut lines: Vec<String> = (0..10).map(|i| line(&format!("u{i}"), 4)).collect();
        lines.push(line("short", 2));
        let train_path = write_file("split.jsonl", &lines);

        let use_case = TrainUseCase::new(TrainConfig {
            train_path,
            train_fraction: 0.8,
            num_negatives: 4,
            ..TrainConfig::default()
        });
        let data = use_case.prepare_data().unwrap();

        // 11 lines split 8/3, then the short one is dropped from whichever side holds it
        assert_eq!(data.train.len() + data.valid.len(), 10);
        assert!(data.test.is_none());
    }

    #[test]
    fn test_prepare_data_loads_test_file() {
        let lines: Vec<String> = (0..4).map(|i| line(&format!("u{i}"), 1)).collect();
        let train_path = write_file("with_test.jsonl", &lines);
        let test_path  = write_file("held_out.jsonl", &lines[..2]);

        let use_case = TrainUseCase::new(TrainConfig {
            train_path,
            test_path: Some(test_path),
            num_negatives: 1,
            train_fraction: 0.5,
            ..TrainConfig::default()
        });
        let data = use_case.prepare_data().unwrap();
        assert_eq!(data.test.map(|t| t.len()), Some(2));
    }

    #[test]
    fn test_missing_training_file_is_an_error() {
        let use_case = TrainUseCase::new(TrainConfig {
            train_path: "/definitely/not/here.jsonl".into(),
            ..TrainConfig::default()
        });
        assert!(use_case.prepare_data().is_err());
    }

    #[test]
    fn test_config_json_fills_missing_fields() {
        let cfg: TrainConfig = serde_json::from_str(r#"{"epochs": 3, "profile": "Extended"}"#).unwrap();
        assert_eq!(cfg.epochs, 3);
        assert_eq!(cfg.profile, ModelProfile::Extended);
        assert_eq!(cfg.num_negatives, 4);
    }
}
