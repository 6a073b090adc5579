/// Per-step losses collected between epoch boundaries.
///
/// The epoch average is the plain arithmetic mean of every value
/// pushed since the last reset.
#[derive(Debug, Clone, Default)]
pub struct LossAccumulator {
    values: Vec<f64>,
}

impl LossAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, loss: f64) {
        self.values.push(loss);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `None` when nothing was recorded.
    pub fn reduce_mean(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.len() as f64)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Mean of the recorded losses, then reset.
    pub fn drain_mean(&mut self) -> Option<f64> {
        let mean = self.reduce_mean();
        self.clear();
        mean
    }
}
