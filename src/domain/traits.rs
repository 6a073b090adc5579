// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer programs against these traits; the
// data and ml layers provide the implementations.
//
//   ImpressionSource → JsonlImpressionLoader (data layer)
//   CandidateRanker  → ScoreUseCase (application layer)

use anyhow::Result;

use crate::domain::impression::Impression;

// ─── ImpressionSource ────────────────────────────────────────────────────────
/// Anything that can hand over validated training impressions.
pub trait ImpressionSource {
    /// Load every impression this source holds.
    fn load_all(&self) -> Result<Vec<Impression>>;
}

// ─── CandidateRanker ─────────────────────────────────────────────────────────
/// One candidate title with the score the model gave it.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    /// Position of the candidate in the caller's input list
    pub index: usize,
    pub title: String,
    pub score: f32,
}

/// Anything that can order candidate titles for a reader.
pub trait CandidateRanker {
    /// Rank `candidates` for a user who has read `history`,
    /// best match first.
    fn rank(&self, history: &[String], candidates: &[String]) -> Result<Vec<RankedCandidate>>;
}
