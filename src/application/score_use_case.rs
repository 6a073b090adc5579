// ============================================================
// Layer 2 — Score Use Case
// ============================================================
// Ranks candidate news titles for one reader:
//   1. Read the run's TrainConfig from the checkpoint dir
//   2. Load the pretrained encoder's tokenizer
//   3. Rebuild the model from the latest checkpoint
//   4. Tokenize history + candidates, score, sort best first

use anyhow::Result;
use burn::prelude::Backend;

use crate::domain::traits::{CandidateRanker, RankedCandidate};
use crate::infra::{
    checkpoint::CheckpointManager,
    pretrained::PretrainedStore,
    tokenizer_store::{TitleTokenizer, TokenizerStore},
};
use crate::ml::inferencer::NrmsInferencer;

pub struct ScoreUseCase<B: Backend> {
    tokenizer:  TitleTokenizer,
    inferencer: NrmsInferencer<B>,
}

impl<B: Backend> ScoreUseCase<B> {
    pub fn new(checkpoint_dir: &str, device: &B::Device) -> Result<Self> {
        let ckpt = CheckpointManager::new(checkpoint_dir)?;
        let cfg  = ckpt.load_config()?;

        let pretrained = PretrainedStore::new(&cfg.pretrained_root, &cfg.model_name);
        let tokenizer  = TokenizerStore::new(pretrained.dir()).load()?;
        if tokenizer.pad_id() != cfg.pad_id {
            anyhow::bail!(
                "Tokenizer pads with id {} but the model was trained with pad id {}",
                tokenizer.pad_id(),
                cfg.pad_id,
            );
        }
        let inferencer = NrmsInferencer::from_checkpoint(&ckpt, device)?;

        Ok(Self { tokenizer, inferencer })
    }
}

impl<B: Backend> CandidateRanker for ScoreUseCase<B> {
    fn rank(&self, history: &[String], candidates: &[String]) -> Result<Vec<RankedCandidate>> {
        let title_len = self.inferencer.title_len();
        let history_titles   = self.tokenizer.encode_all(history, title_len)?;
        let candidate_titles = self.tokenizer.encode_all(candidates, title_len)?;

        let scores = self.inferencer.score(&history_titles, &candidate_titles)?;

        let mut ranked: Vec<RankedCandidate> = candidates
            .iter()
            .zip(scores)
            .enumerate()
            .map(|(index, (title, score))| RankedCandidate { index, title: title.clone(), score })
            .collect();
        // stable: ties keep input order
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(ranked)
    }
}
