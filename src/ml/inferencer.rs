// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Rebuilds a trained NRMS model from its checkpoint directory
// and scores candidate titles for one reader.
//
// The history and candidates go through the same NrmsBatcher
// as training, packed as a single impression whose "positive"
// is simply the first candidate. Titles and histories are
// therefore padded exactly as the model saw them in training.

use anyhow::Result;
use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::data::batcher::NrmsBatcher;
use crate::domain::impression::{Impression, TokenizedTitle};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::Nrms;

pub type InferBackend = burn::backend::Wgpu;

pub struct NrmsInferencer<B: Backend> {
    model:       Nrms<B>,
    title_len:   usize,
    history_len: usize,
    pad_id:      u32,
    device:      B::Device,
}

impl<B: Backend> NrmsInferencer<B> {
    pub fn new(model: Nrms<B>, title_len: usize, history_len: usize, pad_id: u32, device: B::Device) -> Self {
        Self { model, title_len, history_len, pad_id, device }
    }

    /// Load the latest epoch saved under `ckpt_manager`.
    pub fn from_checkpoint(ckpt_manager: &CheckpointManager, device: &B::Device) -> Result<Self> {
        let cfg       = ckpt_manager.load_config()?;
        let model_cfg = ckpt_manager.load_model_config()?;

        let model = model_cfg.init::<B>(device);
        let model = ckpt_manager.load_model(model, device)?;
        tracing::info!(
            "Model loaded from '{}' (profile {:?})",
            ckpt_manager.dir().display(),
            cfg.profile,
        );

        Ok(Self::new(model, cfg.title_len, cfg.history_len, cfg.pad_id, device.clone()))
    }

    pub fn title_len(&self) -> usize {
        self.title_len
    }

    /// One score per candidate, in input order. Higher is a better match.
    pub fn score(&self, history: &[TokenizedTitle], candidates: &[TokenizedTitle]) -> Result<Vec<f32>> {
        let Some((first, rest)) = candidates.split_first() else {
            return Ok(Vec::new());
        };

        let impression = Impression {
            user_id:   String::new(),
            clicked:   history.to_vec(),
            positive:  first.clone(),
            negatives: rest.to_vec(),
        };
        let batcher = NrmsBatcher::<B>::new(
            self.title_len,
            self.history_len,
            rest.len(),
            self.pad_id,
            self.model.history_masking.0,
        );
        let batch = batcher.batch(vec![impression], &self.device);

        let output = self.model.forward(&batch.labeled, &batch.clicked)?;
        let scores = output
            .scores
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| anyhow::anyhow!("Cannot read scores: {e:?}"))?;

        tracing::debug!("Scored {} candidates against {} history titles", scores.len(), history.len());
        Ok(scores)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::application::train_use_case::TrainConfig;
    use crate::ml::model::{tests::tiny_nrms_config, ModelProfile};
    use burn::backend::NdArray;
    use std::path::Path;

    type TestBackend = NdArray<f32>;

    /// A tiny trained-looking checkpoint: configs plus epoch-1 weights.
    pub(crate) fn write_checkpoint(dir: &Path, train: &TrainConfig) -> CheckpointManager {
        let _ = std::fs::remove_dir_all(dir);
        let ckpt = CheckpointManager::new(dir).unwrap();
        let model_cfg = tiny_nrms_config().with_profile(train.profile);
        let model = model_cfg.init::<TestBackend>(&Default::default());

        ckpt.save_config(train).unwrap();
        ckpt.save_model_config(&model_cfg).unwrap();
        ckpt.save_model(&model, 1).unwrap();
        ckpt
    }

    fn small_train_config(profile: ModelProfile) -> TrainConfig {
        TrainConfig { profile, title_len: 6, history_len: 4, ..TrainConfig::default() }
    }

    fn titles(ids: &[&[u32]]) -> Vec<TokenizedTitle> {
        ids.iter().map(|t| TokenizedTitle::from_ids(t.to_vec())).collect()
    }

    #[test]
    fn test_scores_every_candidate() {
        let dir  = std::env::temp_dir().join("nrms_rec_inferencer_base");
        let ckpt = write_checkpoint(&dir, &small_train_config(ModelProfile::Base));
        let inferencer = NrmsInferencer::<TestBackend>::from_checkpoint(&ckpt, &Default::default()).unwrap();
        assert_eq!(inferencer.title_len(), 6);

        let history    = titles(&[&[2, 5, 6, 3], &[2, 7, 3]]);
        let candidates = titles(&[&[2, 8, 3], &[2, 9, 10, 3], &[2, 11, 3]]);

        let a = inferencer.score(&history, &candidates).unwrap();
        let b = inferencer.score(&history, &candidates).unwrap();
        assert_eq!(a.len(), 3);
        assert!(a.iter().all(|s| s.is_finite()));
        assert_eq!(a, b);
    }

    #[test]
    fn test_padded_profile_scores_with_empty_history() {
        let dir  = std::env::temp_dir().join("nrms_rec_inferencer_extended");
        let ckpt = write_checkpoint(&dir, &small_train_config(ModelProfile::Extended));
        let inferencer = NrmsInferencer::<TestBackend>::from_checkpoint(&ckpt, &Default::default()).unwrap();

        let scores = inferencer.score(&[], &titles(&[&[2, 8, 3], &[2, 9, 3]])).unwrap();
        assert_eq!(scores.len(), 2);
        assert!(scores.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_no_candidates_gives_no_scores() {
        let dir  = std::env::temp_dir().join("nrms_rec_inferencer_empty");
        let ckpt = write_checkpoint(&dir, &small_train_config(ModelProfile::Base));
        let inferencer = NrmsInferencer::<TestBackend>::from_checkpoint(&ckpt, &Default::default()).unwrap();
        assert!(inferencer.score(&titles(&[&[2, 3]]), &[]).unwrap().is_empty());
    }
}
