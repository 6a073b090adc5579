// ============================================================
// Layer 5 — Plateau Learning-Rate Scheduler
// ============================================================
// Cuts the learning rate when a monitored metric (the average
// validation loss) stops improving:
//
//   improved  ⇔ metric < best · (1 − threshold)
//   after `patience` epochs without improvement:
//       lr ← max(lr · factor, min_lr),  counter reset
//
// Burn's LrScheduler::step() takes no metric, so this is a
// standalone scheduler the trainer steps once per epoch.

use burn::{config::Config, optim::LearningRate};

#[derive(Config, Debug)]
pub struct PlateauSchedulerConfig {
    pub initial_lr: LearningRate,
    #[config(default = 0.1)]
    pub factor: f64,
    #[config(default = 5)]
    pub patience: usize,
    /// Relative improvement that counts as progress
    #[config(default = 1e-4)]
    pub threshold: f64,
    #[config(default = 0.0)]
    pub min_lr: LearningRate,
}

impl PlateauSchedulerConfig {
    pub fn init(&self) -> PlateauScheduler {
        assert!(
            self.initial_lr > 0.0,
            "Initial learning rate must be greater than 0, got {}",
            self.initial_lr
        );
        assert!(
            self.factor > 0.0 && self.factor < 1.0,
            "Reduction factor must be in (0, 1), got {}",
            self.factor
        );
        assert!(
            self.min_lr >= 0.0 && self.min_lr <= self.initial_lr,
            "min_lr must be in [0, initial_lr], got min_lr={}, initial_lr={}",
            self.min_lr,
            self.initial_lr
        );

        PlateauScheduler {
            lr:          self.initial_lr,
            factor:      self.factor,
            patience:    self.patience,
            threshold:   self.threshold,
            min_lr:      self.min_lr,
            best:        f64::INFINITY,
            bad_epochs:  0,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PlateauScheduler {
    lr:         LearningRate,
    factor:     f64,
    patience:   usize,
    threshold:  f64,
    min_lr:     LearningRate,
    best:       f64,
    bad_epochs: usize,
}

impl PlateauScheduler {
    pub fn lr(&self) -> LearningRate {
        self.lr
    }

    /// Feed one epoch's metric and return the learning rate to use next.
    /// NaN metrics count as no improvement.
    pub fn step(&mut self, metric: f64) -> LearningRate {
        if metric < self.best * (1.0 - self.threshold) {
            self.best       = metric;
            self.bad_epochs = 0;
        } else {
            self.bad_epochs += 1;
        }

        if self.bad_epochs > self.patience {
            let reduced = (self.lr * self.factor).max(self.min_lr);
            if reduced < self.lr {
                tracing::info!("Reducing learning rate {:.3e} → {:.3e}", self.lr, reduced);
            }
            self.lr         = reduced;
            self.bad_epochs = 0;
        }

        self.lr
    }
}
