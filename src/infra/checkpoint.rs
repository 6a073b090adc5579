// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights at full precision with Burn's
// NamedMpkFileRecorder, so `score` runs the exact trained weights.
//
// What gets saved:
//   1. Model weights (.mpk file)  — all parameters, including
//                                   the document encoder
//   2. latest_epoch.json          — which epoch was last saved
//   3. train_config.json          — the run's TrainConfig
//   4. model_config.json          — the NrmsConfig needed to
//                                   rebuild the architecture
//
// File naming convention:
//   checkpoints/
//     model_epoch_1.mpk
//     model_epoch_2.mpk
//     ...
//     latest_epoch.json
//     train_config.json
//     model_config.json
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use std::{fs, path::{Path, PathBuf}};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
};
use serde::{de::DeserializeOwned, Serialize};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::{Nrms, NrmsConfig};

const LATEST_EPOCH: &str = "latest_epoch.json";
const TRAIN_CONFIG: &str = "train_config.json";
const MODEL_CONFIG: &str = "model_config.json";

/// One training run's checkpoint directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Opens `dir`, creating it when missing.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint dir '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn model_path(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("model_epoch_{epoch}"))
    }

    /// Record every parameter of `model` as `epoch` and mark it latest.
    pub fn save_model<B: Backend>(&self, model: &Nrms<B>, epoch: usize) -> Result<()> {
        let path = self.model_path(epoch);
        NamedMpkFileRecorder::<FullPrecisionSettings>::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        self.write_json(LATEST_EPOCH, &epoch)?;
        tracing::debug!("Checkpoint for epoch {} at '{}'", epoch, path.display());
        Ok(())
    }

    /// Restore the latest epoch into `model`, which must share the
    /// architecture the checkpoint was recorded from.
    pub fn load_model<B: Backend>(&self, model: Nrms<B>, device: &B::Device) -> Result<Nrms<B>> {
        let epoch = self.latest_epoch()?;
        let path  = self.model_path(epoch);
        tracing::info!("Restoring weights of epoch {}", epoch);

        let record = NamedMpkFileRecorder::<FullPrecisionSettings>::new()
            .load(path.clone(), device)
            .with_context(|| format!("Cannot load checkpoint '{}'", path.display()))?;
        Ok(model.load_record(record))
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        self.write_json(TRAIN_CONFIG, cfg)
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        self.read_json(TRAIN_CONFIG)
            .context("Run 'train' before 'score' so the run's config exists")
    }

    pub fn save_model_config(&self, cfg: &NrmsConfig) -> Result<()> {
        let path = self.dir.join(MODEL_CONFIG);
        cfg.save(&path)
            .with_context(|| format!("Cannot write model config to '{}'", path.display()))
    }

    pub fn load_model_config(&self) -> Result<NrmsConfig> {
        let path = self.dir.join(MODEL_CONFIG);
        NrmsConfig::load(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read model config '{}': {e}", path.display()))
    }

    /// Epoch of the most recent `save_model`.
    pub fn latest_epoch(&self) -> Result<usize> {
        self.read_json(LATEST_EPOCH)
            .context("No checkpoint recorded yet; run 'train' first")
    }

    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(name);
        fs::write(&path, serde_json::to_string_pretty(value)?)
            .with_context(|| format!("Cannot write '{}'", path.display()))
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.dir.join(name);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Malformed '{}'", path.display()))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::tests::tiny_nrms_config;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn manager(name: &str) -> CheckpointManager {
        let dir = std::env::temp_dir().join("nrms_rec_checkpoint_tests").join(name);
        let _ = fs::remove_dir_all(&dir);
        CheckpointManager::new(dir).unwrap()
    }

    #[test]
    fn test_model_round_trip_is_exact() {
        let device = Default::default();
        let ckpt = manager("model");
        let config = tiny_nrms_config();

        let saved = config.init::<TestBackend>(&device);
        ckpt.save_model(&saved, 1).unwrap();
        ckpt.save_model(&saved, 2).unwrap();
        assert_eq!(ckpt.latest_epoch().unwrap(), 2);

        let fresh      = config.init::<TestBackend>(&device);
        let fresh_copy = fresh.clone();
        let loaded = ckpt.load_model(fresh, &device).unwrap();

        let weights = |m: &Nrms<TestBackend>| {
            m.user_encoder.projection.weight.val().into_data().to_vec::<f32>().unwrap()
        };
        // f32 in, f32 out: no half-precision rounding
        assert_eq!(weights(&saved), weights(&loaded));
        assert_ne!(weights(&fresh_copy), weights(&loaded));
    }

    #[test]
    fn test_configs_round_trip() {
        let ckpt = manager("configs");

        let train = TrainConfig { epochs: 7, ..TrainConfig::default() };
        ckpt.save_config(&train).unwrap();
        assert_eq!(ckpt.load_config().unwrap().epochs, 7);

        let model = tiny_nrms_config().with_encoder_dim(12);
        ckpt.save_model_config(&model).unwrap();
        assert_eq!(ckpt.load_model_config().unwrap().encoder_dim, 12);
    }

    #[test]
    fn test_load_before_training_fails() {
        let ckpt = manager("empty");
        assert!(ckpt.latest_epoch().is_err());
        assert!(ckpt.load_config().is_err());
    }
}
