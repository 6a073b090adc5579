// ============================================================
// Layer 4 — Impression Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<Impression>
// into the two title groups the model consumes.
//
//   labeled: [U, K+1, L]  positive at index 0, then K negatives
//   clicked: [U, H, L]    the H most recent history titles
//   labels:  [U, 1]       always 0
//
// Every title is truncated or right-padded to L tokens.
// Histories shorter than H are filled differently per masking
// mode:
//   Dense  — earlier clicks are repeated so every slot is real
//   Padded — placeholder titles fill the tail and the group
//            carries an article mask (1 = real, 0 = padding)
//
// Reference: Burn Book §4 (Batcher)

use std::marker::PhantomData;

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::TensorData,
};

use crate::domain::impression::{Impression, TokenizedTitle};
use crate::ml::model::HistoryMasking;

// ─── TitleGroup ──────────────────────────────────────────────────────────────
/// A rectangular block of titles, one row of articles per user.
#[derive(Debug, Clone)]
pub struct TitleGroup<B: Backend> {
    /// [U, A, L]
    pub input_ids:            Tensor<B, 3, Int>,
    /// [U, A, L], 1 = real token, 0 = padding
    pub attention_mask:       Tensor<B, 3, Int>,
    /// [U, A, L], `true` = ignore; derived from `attention_mask` when absent
    pub key_padding_mask:     Option<Tensor<B, 3, Bool>>,
    /// [U, A], 1 = real article, 0 = padded slot
    pub softmax_padding_mask: Option<Tensor<B, 2>>,
}

impl<B: Backend> TitleGroup<B> {
    pub fn new(input_ids: Tensor<B, 3, Int>, attention_mask: Tensor<B, 3, Int>) -> Self {
        assert_eq!(
            input_ids.dims(),
            attention_mask.dims(),
            "attention_mask must have the same shape as input_ids"
        );
        Self { input_ids, attention_mask, key_padding_mask: None, softmax_padding_mask: None }
    }

    /// Replace the mask derived from `attention_mask`; `true` = ignore.
    pub fn with_key_padding_mask(mut self, mask: Tensor<B, 3, Bool>) -> Self {
        assert_eq!(
            mask.dims(),
            self.input_ids.dims(),
            "key_padding_mask must have the same shape as input_ids"
        );
        self.key_padding_mask = Some(mask);
        self
    }

    pub fn with_softmax_padding_mask(mut self, mask: Tensor<B, 2>) -> Self {
        self.softmax_padding_mask = Some(mask);
        self
    }

    /// Build a [U, A, L] group from rows of equally long titles.
    pub fn from_titles(rows: &[Vec<TokenizedTitle>], device: &B::Device) -> Self {
        let users    = rows.len();
        let articles = rows.first().map_or(0, Vec::len);
        let seq_len  = rows.first().and_then(|r| r.first()).map_or(0, TokenizedTitle::seq_len);

        let titles = rows.iter().flat_map(|row| {
            assert_eq!(row.len(), articles, "every user needs the same number of titles");
            row.iter()
        });
        let mut ids     = Vec::with_capacity(users * articles * seq_len);
        let mut mask    = Vec::with_capacity(users * articles * seq_len);
        let mut ignored = Vec::with_capacity(users * articles * seq_len);
        for title in titles {
            assert_eq!(title.seq_len(), seq_len, "titles must be padded to one length");
            ids.extend(title.input_ids.iter().map(|&x| x as i64));
            mask.extend(title.attention_mask.iter().map(|&x| x as i64));
            ignored.extend(title.attention_mask.iter().map(|&x| x == 0));
        }

        let shape = [users, articles, seq_len];
        Self::new(
            Tensor::from_data(TensorData::new(ids, shape), device),
            Tensor::from_data(TensorData::new(mask, shape), device),
        )
        .with_key_padding_mask(Tensor::from_data(TensorData::new(ignored, shape), device))
    }
}

// ─── NrmsBatch ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct NrmsBatch<B: Backend> {
    /// Candidates to score
    pub labeled: TitleGroup<B>,
    /// Reading history
    pub clicked: TitleGroup<B>,
    /// [U, 1] index of the clicked candidate
    pub labels:  Tensor<B, 2, Int>,
}

// ─── NrmsBatcher ─────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct NrmsBatcher<B: Backend> {
    pub title_len:     usize,
    pub history_len:   usize,
    pub num_negatives: usize,
    pub pad_id:        u32,
    pub masking:       HistoryMasking,
    _backend:          PhantomData<B>,
}

impl<B: Backend> NrmsBatcher<B> {
    pub fn new(
        title_len: usize,
        history_len: usize,
        num_negatives: usize,
        pad_id: u32,
        masking: HistoryMasking,
    ) -> Self {
        assert!(title_len > 0 && history_len > 0, "title and history lengths must be positive");
        Self { title_len, history_len, num_negatives, pad_id, masking, _backend: PhantomData }
    }

    fn candidates(&self, impression: &Impression) -> Vec<TokenizedTitle> {
        let row: Vec<TokenizedTitle> = impression
            .labeled()
            .take(self.num_negatives + 1)
            .map(|t| t.fit_to(self.title_len, self.pad_id))
            .collect();
        assert_eq!(
            row.len(),
            self.num_negatives + 1,
            "impression of user {:?} has too few negatives",
            impression.user_id
        );
        row
    }

    /// History row plus its per-slot mask.
    fn history(&self, impression: &Impression) -> (Vec<TokenizedTitle>, Vec<f32>) {
        let start  = impression.clicked.len().saturating_sub(self.history_len);
        let recent: Vec<TokenizedTitle> = impression.clicked[start..]
            .iter()
            .map(|t| t.fit_to(self.title_len, self.pad_id))
            .collect();
        let real = recent.len();

        match self.masking {
            HistoryMasking::Padded => {
                let mut row = recent;
                row.resize(self.history_len, TokenizedTitle::placeholder(self.title_len, self.pad_id));
                let mask = (0..self.history_len)
                    .map(|i| if i < real { 1.0 } else { 0.0 })
                    .collect();
                (row, mask)
            }
            HistoryMasking::Dense if real == 0 => {
                let row = vec![TokenizedTitle::placeholder(self.title_len, self.pad_id); self.history_len];
                (row, vec![1.0; self.history_len])
            }
            HistoryMasking::Dense => {
                let row = recent.iter().cycle().take(self.history_len).cloned().collect();
                (row, vec![1.0; self.history_len])
            }
        }
    }
}

impl<B: Backend> Batcher<B, Impression, NrmsBatch<B>> for NrmsBatcher<B> {
    fn batch(&self, items: Vec<Impression>, device: &B::Device) -> NrmsBatch<B> {
        let users = items.len();

        let labeled_rows: Vec<Vec<TokenizedTitle>> =
            items.iter().map(|imp| self.candidates(imp)).collect();
        let (clicked_rows, slot_masks): (Vec<_>, Vec<_>) =
            items.iter().map(|imp| self.history(imp)).unzip();

        let labeled = TitleGroup::from_titles(&labeled_rows, device);
        let clicked = TitleGroup::from_titles(&clicked_rows, device);
        let clicked = match self.masking {
            HistoryMasking::Dense => clicked,
            HistoryMasking::Padded => {
                let flat: Vec<f32> = slot_masks.into_iter().flatten().collect();
                clicked.with_softmax_padding_mask(Tensor::from_data(
                    TensorData::new(flat, [users, self.history_len]),
                    device,
                ))
            }
        };

        NrmsBatch {
            labeled,
            clicked,
            labels: Tensor::zeros([users, 1], device),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    pub(crate) fn impression(history: usize, negatives: usize) -> Impression {
        Impression {
            user_id:   format!("u{history}"),
            clicked:   (0..history).map(|i| TokenizedTitle::from_ids(vec![10 + i as u32, 2])).collect(),
            positive:  TokenizedTitle::from_ids(vec![3, 4, 5]),
            negatives: (0..negatives).map(|i| TokenizedTitle::from_ids(vec![20 + i as u32])).collect(),
        }
    }

    fn ints(t: Tensor<TestBackend, 3, Int>) -> Vec<i64> {
        t.into_data().convert::<i64>().to_vec::<i64>().unwrap()
    }

    #[test]
    fn test_dense_batch_shapes_and_labels() {
        let device = Default::default();
        let batcher = NrmsBatcher::<TestBackend>::new(4, 3, 2, 0, HistoryMasking::Dense);

        let batch = batcher.batch(vec![impression(5, 3), impression(1, 2)], &device);

        assert_eq!(batch.labeled.input_ids.dims(), [2, 3, 4]);
        assert_eq!(batch.clicked.input_ids.dims(), [2, 3, 4]);
        assert!(batch.clicked.softmax_padding_mask.is_none());
        let labels = batch.labels.into_data().convert::<i64>().to_vec::<i64>().unwrap();
        assert_eq!(labels, vec![0, 0]);

        // positive first, padded to 4 tokens
        let labeled = ints(batch.labeled.input_ids);
        assert_eq!(&labeled[0..4], &[3, 4, 5, 0]);

        // padding positions are hidden from the token attention
        let ignored = batch
            .labeled
            .key_padding_mask
            .expect("titles carry their key padding mask")
            .into_data()
            .to_vec::<bool>()
            .unwrap();
        assert_eq!(&ignored[0..4], &[false, false, false, true]);
    }

    #[test]
    fn test_dense_keeps_most_recent_and_repeats_short_history() {
        let device = Default::default();
        let batcher = NrmsBatcher::<TestBackend>::new(2, 3, 1, 0, HistoryMasking::Dense);

        let batch = batcher.batch(vec![impression(5, 1), impression(1, 1)], &device);
        let ids = ints(batch.clicked.input_ids);

        // user 0: clicks 12, 13, 14 (most recent three)
        assert_eq!(ids[0], 12);
        assert_eq!(ids[2], 13);
        assert_eq!(ids[4], 14);
        // user 1: the single click fills every slot
        assert_eq!(&ids[6..12], &[10, 2, 10, 2, 10, 2]);
    }

    #[test]
    fn test_padded_history_carries_article_mask() {
        let device = Default::default();
        let batcher = NrmsBatcher::<TestBackend>::new(3, 4, 1, 0, HistoryMasking::Padded);

        let batch = batcher.batch(vec![impression(2, 1)], &device);
        let mask = batch
            .clicked
            .softmax_padding_mask
            .expect("padded batches carry an article mask")
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        assert_eq!(mask, vec![1.0, 1.0, 0.0, 0.0]);

        // placeholder slots keep one real token
        let attention = ints(batch.clicked.attention_mask);
        assert_eq!(&attention[6..9], &[1, 0, 0]);
    }

    #[test]
    #[should_panic(expected = "too few negatives")]
    fn test_rejects_short_candidate_lists() {
        let device = Default::default();
        let batcher = NrmsBatcher::<TestBackend>::new(3, 2, 4, 0, HistoryMasking::Dense);
        batcher.batch(vec![impression(2, 1)], &device);
    }
}
