// ============================================================
// Layer 5 — Positional Encoder
// ============================================================
// Adds fixed sinusoidal position signals to a sequence of
// vectors. Self-attention is permutation-invariant, so the
// order of a user's reading history is only visible to the
// user encoder when this stage is switched on.
//
//   PE[pos, 2i]   = sin(pos / 10000^(2i/d))
//   PE[pos, 2i+1] = cos(pos / 10000^(2i/d))

use burn::prelude::*;

#[derive(Config, Debug)]
pub struct PositionalEncodingConfig {
    /// Longest sequence the table covers
    pub max_len: usize,
    pub d_model: usize,
}

impl PositionalEncodingConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> PositionalEncoding<B> {
        let mut table = vec![0.0f32; self.max_len * self.d_model];

        for pos in 0..self.max_len {
            for i in 0..self.d_model {
                let angle = pos as f32
                    / 10000_f32.powf((2 * (i / 2)) as f32 / self.d_model as f32);
                table[pos * self.d_model + i] = if i % 2 == 0 { angle.sin() } else { angle.cos() };
            }
        }

        let encoding = Tensor::<B, 1>::from_floats(table.as_slice(), device)
            .reshape([self.max_len, self.d_model]);

        PositionalEncoding { encoding, max_len: self.max_len, d_model: self.d_model }
    }
}

/// Holds no trainable parameters; the table is a module constant.
#[derive(Module, Debug)]
pub struct PositionalEncoding<B: Backend> {
    encoding: Tensor<B, 2>,
    max_len:  usize,
    d_model:  usize,
}

impl<B: Backend> PositionalEncoding<B> {
    /// x: [batch, length, d_model] → same shape, position signal added
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let [_, length, d_model] = x.dims();
        assert!(
            length <= self.max_len,
            "sequence of length {length} exceeds positional table of {}",
            self.max_len
        );
        assert_eq!(d_model, self.d_model, "positional encoding width mismatch");

        let table = self.encoding.clone().slice([0..length, 0..self.d_model]);
        x + table.unsqueeze::<3>()
    }
}
