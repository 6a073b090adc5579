// ============================================================
// Layer 6 — Attention Snapshots
// ============================================================
// Diagnostic dumps of the candidate attention weights taken
// during validation:
//
//   context  — head-averaged self-attention of the first
//              candidate title, [L, L]
//   additive — token pooling weights of every candidate in
//              the batch, [U·(K+1), L]
//
// CsvAttentionSink writes one pair of CSV files per recorded
// step, ready to be plotted as heatmaps:
//
//   <dir>/epoch_<e>_step_<s>_context.csv
//   <dir>/epoch_<e>_step_<s>_additive.csv

use anyhow::{Context, Result};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use burn::prelude::*;

/// Attention weights copied off the device.
#[derive(Debug, Clone, PartialEq)]
pub struct AttentionSnapshot {
    pub context:  Vec<Vec<f32>>,
    pub additive: Vec<Vec<f32>>,
}

impl AttentionSnapshot {
    /// `context_weights`: [N, L, L], only sample 0 is kept; `additive_weights`: [N, L].
    pub fn capture<B: Backend>(context_weights: Tensor<B, 3>, additive_weights: Tensor<B, 2>) -> Result<Self> {
        let [_, rows, cols] = context_weights.dims();
        let first = context_weights.slice([0..1, 0..rows, 0..cols]).reshape([rows, cols]);

        Ok(Self {
            context:  to_rows(first)?,
            additive: to_rows(additive_weights)?,
        })
    }
}

fn to_rows<B: Backend>(t: Tensor<B, 2>) -> Result<Vec<Vec<f32>>> {
    let [_, cols] = t.dims();
    let flat = t
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("Cannot read attention weights: {e:?}"))?;
    Ok(flat.chunks(cols.max(1)).map(<[f32]>::to_vec).collect())
}

/// Destination for attention snapshots.
pub trait AttentionSink {
    fn record(&mut self, epoch: usize, step: usize, snapshot: &AttentionSnapshot) -> Result<()>;
}

pub struct CsvAttentionSink {
    dir: PathBuf,
}

impl CsvAttentionSink {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create attention dump dir '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    fn write_matrix(&self, name: &str, rows: &[Vec<f32>]) -> Result<PathBuf> {
        let path = self.dir.join(name);
        let mut f = fs::File::create(&path)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;
        for row in rows {
            let line: Vec<String> = row.iter().map(|v| format!("{v:.6}")).collect();
            writeln!(f, "{}", line.join(","))?;
        }
        Ok(path)
    }
}

impl AttentionSink for CsvAttentionSink {
    fn record(&mut self, epoch: usize, step: usize, snapshot: &AttentionSnapshot) -> Result<()> {
        let prefix = format!("epoch_{epoch}_step_{step}");
        self.write_matrix(&format!("{prefix}_context.csv"), &snapshot.context)?;
        let path = self.write_matrix(&format!("{prefix}_additive.csv"), &snapshot.additive)?;
        tracing::debug!("Attention snapshot written next to '{}'", path.display());
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_capture_keeps_first_context_matrix() {
        let device = Default::default();
        let context = Tensor::<TestBackend, 3>::from_floats(
            [[[0.5, 0.5], [1.0, 0.0]], [[9.0, 9.0], [9.0, 9.0]]],
            &device,
        );
        let additive = Tensor::<TestBackend, 2>::from_floats([[0.25, 0.75], [1.0, 0.0]], &device);

        let snap = AttentionSnapshot::capture(context, additive).unwrap();
        assert_eq!(snap.context, vec![vec![0.5, 0.5], vec![1.0, 0.0]]);
        assert_eq!(snap.additive, vec![vec![0.25, 0.75], vec![1.0, 0.0]]);
    }

    #[test]
    fn test_csv_sink_writes_both_matrices() {
        let dir = std::env::temp_dir().join("nrms_rec_attention_dump");
        let _ = fs::remove_dir_all(&dir);
        let mut sink = CsvAttentionSink::new(&dir).unwrap();

        let snap = AttentionSnapshot {
            context:  vec![vec![1.0, 0.0], vec![0.5, 0.5]],
            additive: vec![vec![0.2, 0.8]],
        };
        sink.record(3, 7, &snap).unwrap();

        let context = fs::read_to_string(dir.join("epoch_3_step_7_context.csv")).unwrap();
        assert_eq!(context, "1.000000,0.000000\n0.500000,0.500000\n");
        let additive = fs::read_to_string(dir.join("epoch_3_step_7_additive.csv")).unwrap();
        assert_eq!(additive, "0.200000,0.800000\n");
    }
}
