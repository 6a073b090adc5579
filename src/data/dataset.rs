use burn::data::dataset::Dataset;

use crate::domain::error::BatchError;
use crate::domain::impression::{Impression, LABELED_GROUP};

/// In-memory impressions that all carry enough negatives for one
/// (K+1)-way ranking problem.
pub struct NrmsDataset {
    impressions: Vec<Impression>,
}

impl NrmsDataset {
    /// Keep impressions with at least `num_negatives` negatives.
    /// Returns the dataset and how many impressions were dropped.
    pub fn new(impressions: Vec<Impression>, num_negatives: usize) -> (Self, usize) {
        let total = impressions.len();
        let impressions: Vec<Impression> = impressions
            .into_iter()
            .filter(|imp| match check_negatives(imp, num_negatives) {
                Ok(()) => true,
                Err(err) => {
                    tracing::debug!("Skipping impression of {:?}: {}", imp.user_id, err);
                    false
                }
            })
            .collect();
        let dropped = total - impressions.len();
        if dropped > 0 {
            tracing::warn!("Dropped {} of {} impressions with fewer than {} negatives", dropped, total, num_negatives);
        }
        (Self { impressions }, dropped)
    }

    pub fn sample_count(&self) -> usize { self.impressions.len() }
}

fn check_negatives(impression: &Impression, needed: usize) -> Result<(), BatchError> {
    let got = impression.negatives.len();
    if got < needed {
        return Err(BatchError::TooFewTitles { group: LABELED_GROUP, needed, got });
    }
    Ok(())
}

impl Dataset<Impression> for NrmsDataset {
    fn get(&self, index: usize) -> Option<Impression> {
        self.impressions.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.impressions.len()
    }
}
