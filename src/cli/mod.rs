// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parses arguments with
// clap and delegates all work to Layer 2 (application).
//
//   1. `train` — trains the recommender on impressions
//   2. `score` — ranks candidate titles for one reader
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, ScoreArgs, TrainArgs};

use crate::domain::traits::CandidateRanker;

#[derive(Parser, Debug)]
#[command(
    name = "nrms-rec",
    version = "0.1.0",
    about = "Train an NRMS news recommender, then rank candidate titles for a reader."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Score(args) => run_score(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on impressions in: {}", args.train_path);

    let use_case = TrainUseCase::new(args.into());
    use_case.execute()?;

    println!("Training complete. Checkpoints in '{}'.", use_case.config().checkpoint_dir);
    Ok(())
}

fn run_score(args: ScoreArgs) -> Result<()> {
    use crate::application::score_use_case::ScoreUseCase;
    use crate::ml::inferencer::InferBackend;

    let device   = burn::backend::wgpu::WgpuDevice::default();
    let use_case = ScoreUseCase::<InferBackend>::new(&args.checkpoint_dir, &device)?;

    let ranked = use_case.rank(&args.history, &args.candidates)?;
    println!("\nRanking ({} candidates, {} history titles):", ranked.len(), args.history.len());
    for (rank, c) in ranked.iter().enumerate() {
        println!("{:>3}. {:>9.4}  [#{}] {}", rank + 1, c.score, c.index + 1, c.title);
    }
    Ok(())
}
