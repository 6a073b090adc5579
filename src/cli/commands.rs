// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `score`, and all
// their configurable flags.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};

use crate::application::train_use_case::TrainConfig;
use crate::infra::pretrained::DEFAULT_MODEL_NAME;
use crate::ml::model::ModelProfile;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the recommender on a JSON-lines impressions file
    Train(TrainArgs),

    /// Rank candidate titles for one reader with a trained checkpoint
    Score(ScoreArgs),
}

/// Model configuration to train.
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ProfileArg {
    /// Frozen encoder, dense history
    Base,
    /// Last encoder layer trainable, padded history, positional encoding
    Extended,
}

impl From<ProfileArg> for ModelProfile {
    fn from(p: ProfileArg) -> Self {
        match p {
            ProfileArg::Base     => ModelProfile::Base,
            ProfileArg::Extended => ModelProfile::Extended,
        }
    }
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Pre-tokenized impressions, one JSON object per line
    #[arg(long, default_value = "data/impressions.jsonl")]
    pub train_path: String,

    /// Optional held-out impressions evaluated after training
    #[arg(long)]
    pub test_path: Option<String>,

    /// Directory holding pretrained encoders by name
    #[arg(long, default_value = "pretrained")]
    pub pretrained_root: String,

    #[arg(long, default_value = DEFAULT_MODEL_NAME)]
    pub model_name: String,

    /// Directory to save checkpoints, configs and metrics
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    #[arg(long, value_enum, default_value_t = ProfileArg::Base)]
    pub profile: ProfileArg,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Share of impressions used for training; the rest validates
    #[arg(long, default_value_t = 0.8)]
    pub train_fraction: f64,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    #[arg(long, default_value_t = 1e-4)]
    pub lr: f64,

    #[arg(long, default_value_t = 1e-5)]
    pub weight_decay: f64,

    /// Multiply the learning rate by this on a validation plateau
    #[arg(long, default_value_t = 0.1)]
    pub lr_factor: f64,

    /// Epochs without improvement before the learning rate drops
    #[arg(long, default_value_t = 5)]
    pub lr_patience: usize,

    #[arg(long, default_value_t = 1e-4)]
    pub lr_threshold: f64,

    #[arg(long, default_value_t = 0.0)]
    pub min_lr: f64,

    /// Unclicked candidates per impression (K)
    #[arg(long, default_value_t = 4)]
    pub num_negatives: usize,

    /// Most recent clicked titles kept per user
    #[arg(long, default_value_t = 50)]
    pub history_len: usize,

    /// Tokens per title after truncation / padding
    #[arg(long, default_value_t = 30)]
    pub title_len: usize,

    #[arg(long, default_value_t = 0)]
    pub pad_id: u32,

    /// Size of news and user vectors
    #[arg(long, default_value_t = 128)]
    pub encoder_dim: usize,

    /// Dump attention weights every N validation steps (0 = off)
    #[arg(long, default_value_t = 0)]
    pub visualize_every: usize,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            train_path:      a.train_path,
            test_path:       a.test_path,
            pretrained_root: a.pretrained_root,
            model_name:      a.model_name,
            checkpoint_dir:  a.checkpoint_dir,
            profile:         a.profile.into(),
            seed:            a.seed,
            train_fraction:  a.train_fraction,
            batch_size:      a.batch_size,
            epochs:          a.epochs,
            lr:              a.lr,
            weight_decay:    a.weight_decay,
            lr_factor:       a.lr_factor,
            lr_patience:     a.lr_patience,
            lr_threshold:    a.lr_threshold,
            min_lr:          a.min_lr,
            num_negatives:   a.num_negatives,
            history_len:     a.history_len,
            title_len:       a.title_len,
            pad_id:          a.pad_id,
            encoder_dim:     a.encoder_dim,
            visualize_every: a.visualize_every,
        }
    }
}

#[derive(Args, Debug)]
pub struct ScoreArgs {
    /// Directory where checkpoints were saved during training
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// A title the reader clicked before (repeatable, oldest first)
    #[arg(long = "history")]
    pub history: Vec<String>,

    /// A candidate title to rank (repeatable)
    #[arg(long = "candidate", required = true)]
    pub candidates: Vec<String>,
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_args_become_config() {
        let cli = Cli::try_parse_from([
            "nrms-rec", "train", "--profile", "extended", "--epochs", "3", "--num-negatives", "2",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };

        let cfg: TrainConfig = args.into();
        assert_eq!(cfg.profile, ModelProfile::Extended);
        assert_eq!(cfg.epochs, 3);
        assert_eq!(cfg.num_negatives, 2);
        assert_eq!(cfg.model_name, DEFAULT_MODEL_NAME);
    }

    #[test]
    fn test_score_collects_repeated_titles() {
        let cli = Cli::try_parse_from([
            "nrms-rec", "score",
            "--history", "markets rally",
            "--candidate", "storm warning",
            "--candidate", "election results",
        ])
        .unwrap();
        let Commands::Score(args) = cli.command else { panic!("expected score") };
        assert_eq!(args.history, vec!["markets rally"]);
        assert_eq!(args.candidates.len(), 2);
    }

    #[test]
    fn test_score_requires_a_candidate() {
        assert!(Cli::try_parse_from(["nrms-rec", "score"]).is_err());
    }
}
