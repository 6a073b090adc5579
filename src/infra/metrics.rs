// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records the epoch-end averages to a CSV file.
//
// Metrics recorded per epoch:
//   - epoch:          the epoch number (1, 2, 3, ...)
//   - avg_train_loss: mean of every training-step loss
//   - avg_val_loss:   mean of every validation-step loss
//   - lr:             learning rate after the scheduler step
//
// Output file: <checkpoint_dir>/metrics.csv
//
// Example CSV output:
//   epoch,avg_train_loss,avg_val_loss,lr
//   1,1.604100,1.598300,0.0001
//   2,1.512900,1.560200,0.0001
//
// An epoch with no steps in a phase records NaN for it.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

const CSV_HEADER: &str = "epoch,avg_train_loss,avg_val_loss,lr";

/// Averages of one finished epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:          usize,
    pub avg_train_loss: f64,
    pub avg_val_loss:   f64,
    pub lr:             f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, avg_train_loss: Option<f64>, avg_val_loss: Option<f64>, lr: f64) -> Self {
        Self {
            epoch,
            avg_train_loss: avg_train_loss.unwrap_or(f64::NAN),
            avg_val_loss:   avg_val_loss.unwrap_or(f64::NAN),
            lr,
        }
    }

    /// Strictly lower validation loss than `best_val_loss`; NaN never improves.
    pub fn is_improvement(&self, best_val_loss: f64) -> bool {
        self.avg_val_loss < best_val_loss
    }

    fn csv_row(&self) -> String {
        format!("{},{:.6},{:.6},{}", self.epoch, self.avg_train_loss, self.avg_val_loss, self.lr)
    }
}

/// Appends one CSV row per epoch to `<dir>/metrics.csv`.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Creates `dir` and the header row if needed; an existing file is appended to.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create metrics dir '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            fs::write(&csv_path, format!("{CSV_HEADER}\n"))
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
        }
        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;
        writeln!(f, "{}", m.csv_row())?;

        tracing::debug!(epoch = m.epoch, "metrics row appended to '{}'", self.csv_path.display());
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_improvement() {
        let m = EpochMetrics::new(2, Some(2.5), Some(2.3), 1e-4);
        assert!(m.is_improvement(3.0));
        assert!(!m.is_improvement(2.0));
    }

    #[test]
    fn test_missing_phase_is_nan() {
        let m = EpochMetrics::new(1, Some(1.0), None, 1e-4);
        assert!(m.avg_val_loss.is_nan());
        assert!(!m.is_improvement(f64::INFINITY));
    }

    #[test]
    fn test_reopening_appends_without_second_header() {
        let dir = std::env::temp_dir().join("nrms_rec_metrics_reopen");
        let _ = fs::remove_dir_all(&dir);

        MetricsLogger::new(&dir).unwrap().log(&EpochMetrics::new(1, Some(1.0), Some(1.0), 0.1)).unwrap();
        let logger = MetricsLogger::new(&dir).unwrap();
        logger.log(&EpochMetrics::new(2, None, Some(0.5), 0.1)).unwrap();

        let csv = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "2,NaN,0.500000,0.1");
    }

    #[test]
    fn test_writes_header_and_rows() {
        let dir = std::env::temp_dir().join("nrms_rec_metrics_test");
        let _ = fs::remove_dir_all(&dir);

        let logger = MetricsLogger::new(&dir).unwrap();
        logger.log(&EpochMetrics::new(1, Some(1.5), Some(1.25), 0.001)).unwrap();

        let csv = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "epoch,avg_train_loss,avg_val_loss,lr");
        assert_eq!(lines[1], "1,1.500000,1.250000,0.001");
    }
}
