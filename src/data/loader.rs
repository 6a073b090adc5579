// ============================================================
// Layer 4 — Impression Loader
// ============================================================
// Reads pre-tokenized impressions from a JSON-lines file,
// one impression per line (see domain::impression for the
// schema). Blank lines are ignored.
//
// A malformed line, or one missing a required field, is
// logged with its line number and skipped; one bad record
// does not abort a whole training run.
//
// Reference: serde_json documentation
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use crate::domain::impression::{Impression, RawImpression};
use crate::domain::traits::ImpressionSource;

/// Loads impressions from one `.jsonl` file.
/// Implements the ImpressionSource trait from Layer 3.
pub struct JsonlImpressionLoader {
    path: PathBuf,
}

impl JsonlImpressionLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ImpressionSource for JsonlImpressionLoader {
    fn load_all(&self) -> Result<Vec<Impression>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Cannot open impressions file '{}'", self.path.display()))?;

        let mut impressions = Vec::new();
        let mut skipped     = 0usize;

        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| {
                format!("Cannot read line {} of '{}'", idx + 1, self.path.display())
            })?;
            if line.trim().is_empty() {
                continue;
            }

            match parse_line(&line) {
                Ok(impression) => impressions.push(impression),
                Err(e) => {
                    tracing::warn!("Skipping {}:{}: {:#}", self.path.display(), idx + 1, e);
                    skipped += 1;
                }
            }
        }

        tracing::info!(
            "Loaded {} impressions from '{}' ({} skipped)",
            impressions.len(),
            display_name(&self.path),
            skipped
        );
        Ok(impressions)
    }
}

/// Parse and validate one JSON line.
fn parse_line(line: &str) -> Result<Impression> {
    let raw: RawImpression = serde_json::from_str(line).context("invalid JSON")?;
    let impression = Impression::try_from(raw)?;
    Ok(impression)
}

fn display_name(path: &Path) -> &str {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
}
