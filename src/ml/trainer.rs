// ============================================================
// Layer 5 — Training Loop
// ============================================================
// NrmsTrainer owns the model, the optimiser and the plateau
// scheduler, and exposes one method per step kind:
//
//   training_step   — loss, backward, Adam update
//   validation_step — loss on the eval model, optional
//                     attention snapshot
//   test_step       — loss on the eval model
//
// Each step pushes its loss into its own accumulator. The
// epoch-end hooks report the arithmetic mean of everything
// pushed since the last epoch and reset the accumulator.
// The validation hook also steps the scheduler with that
// mean (the `avg_val_loss` it monitors).
//
// Key Burn 0.20 points:
//   - Training uses MyBackend (Autodiff<Wgpu>) for gradients
//   - model.valid() returns the model on MyInnerBackend (Wgpu)
//     with dropout disabled; it is cached until the next update
//   - Validation/test batchers must also use MyInnerBackend
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::Result;
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{decay::WeightDecayConfig, AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::{NrmsBatch, NrmsBatcher},
    dataset::NrmsDataset,
};
use crate::infra::{
    attention_dump::{AttentionSink, AttentionSnapshot, CsvAttentionSink},
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
    pretrained::PretrainedStore,
};
use crate::ml::accumulator::LossAccumulator;
use crate::ml::model::{Nrms, NrmsConfig, NrmsOutput};
use crate::ml::scheduler::{PlateauScheduler, PlateauSchedulerConfig};

pub type MyBackend      = burn::backend::Autodiff<burn::backend::Wgpu>;
pub type MyInnerBackend = burn::backend::Wgpu;

/// A named scalar produced by one evaluation step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepMetrics {
    pub name:  &'static str,
    pub value: f64,
}

pub struct NrmsTrainer<B: AutodiffBackend, O: Optimizer<Nrms<B>, B>> {
    model:           Nrms<B>,
    optim:           O,
    scheduler:       PlateauScheduler,
    train_losses:    LossAccumulator,
    val_losses:      LossAccumulator,
    test_losses:     LossAccumulator,
    eval_model:      Option<Nrms<B::InnerBackend>>,
    attention_sink:  Option<Box<dyn AttentionSink>>,
    visualize_every: usize,
    epoch:           usize,
    val_steps:       usize,
}

impl<B: AutodiffBackend, O: Optimizer<Nrms<B>, B>> NrmsTrainer<B, O> {
    pub fn new(model: Nrms<B>, optim: O, scheduler: PlateauScheduler) -> Self {
        Self {
            model,
            optim,
            scheduler,
            train_losses:    LossAccumulator::new(),
            val_losses:      LossAccumulator::new(),
            test_losses:     LossAccumulator::new(),
            eval_model:      None,
            attention_sink:  None,
            visualize_every: 0,
            epoch:           0,
            val_steps:       0,
        }
    }

    /// Snapshot attention on every `every`-th validation step (0 = never).
    pub fn with_attention_sink(mut self, sink: Box<dyn AttentionSink>, every: usize) -> Self {
        self.attention_sink  = Some(sink);
        self.visualize_every = every;
        self
    }

    pub fn model(&self) -> &Nrms<B> {
        &self.model
    }

    pub fn lr(&self) -> f64 {
        self.scheduler.lr()
    }

    pub fn begin_epoch(&mut self, epoch: usize) {
        self.epoch     = epoch;
        self.val_steps = 0;
    }

    /// Forward, backward and one optimiser update; returns the step loss.
    pub fn training_step(&mut self, batch: &NrmsBatch<B>) -> Result<f64> {
        let out  = self.model.compute_loss(batch)?;
        let loss = out.loss.clone().into_scalar().elem::<f64>();

        let grads = out.loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.model);
        self.model = self.optim.step(self.scheduler.lr(), self.model.clone(), grads);
        self.eval_model = None;

        tracing::trace!("train_loss={:.4}", loss);
        self.train_losses.push(loss);
        Ok(loss)
    }

    pub fn validation_step(&mut self, batch: &NrmsBatch<B::InnerBackend>) -> Result<StepMetrics> {
        let eval = self.eval_model.get_or_insert_with(|| self.model.valid());
        let out  = eval.compute_loss(batch)?;
        let loss = out.loss.into_scalar().elem::<f64>();

        self.val_losses.push(loss);
        self.val_steps += 1;
        self.maybe_snapshot(out.output);

        Ok(StepMetrics { name: "val_loss", value: loss })
    }

    pub fn test_step(&mut self, batch: &NrmsBatch<B::InnerBackend>) -> Result<StepMetrics> {
        let eval = self.eval_model.get_or_insert_with(|| self.model.valid());
        let loss = eval.compute_loss(batch)?.loss.into_scalar().elem::<f64>();

        self.test_losses.push(loss);
        Ok(StepMetrics { name: "test_loss", value: loss })
    }

    pub fn on_train_epoch_end(&mut self) -> Option<f64> {
        let steps = self.train_losses.len();
        let avg   = self.train_losses.drain_mean();
        if let Some(avg) = avg {
            tracing::info!(epoch = self.epoch, steps, "avg_train_loss={:.4}", avg);
        }
        avg
    }

    /// Mean validation loss of the epoch; also steps the scheduler.
    pub fn on_validation_epoch_end(&mut self) -> Option<f64> {
        let steps = self.val_losses.len();
        let avg   = self.val_losses.drain_mean();
        if let Some(avg) = avg {
            let lr = self.scheduler.step(avg);
            tracing::info!(epoch = self.epoch, steps, "avg_val_loss={:.4} lr={:.3e}", avg, lr);
        }
        avg
    }

    pub fn on_test_epoch_end(&mut self) -> Option<f64> {
        let steps = self.test_losses.len();
        let avg   = self.test_losses.drain_mean();
        if let Some(avg) = avg {
            tracing::info!(steps, "avg_test_loss={:.4}", avg);
        }
        avg
    }

    fn maybe_snapshot(&mut self, output: NrmsOutput<B::InnerBackend>) {
        let Some(sink) = self.attention_sink.as_mut() else { return };
        if self.visualize_every == 0 || (self.val_steps - 1) % self.visualize_every != 0 {
            return;
        }

        let recorded = AttentionSnapshot::capture(output.context_weights, output.additive_weights)
            .and_then(|snap| sink.record(self.epoch, self.val_steps, &snap));
        if let Err(e) = recorded {
            tracing::warn!("Attention snapshot failed: {:#}", e);
        }
    }
}

// ─── Training Entry Point ────────────────────────────────────────────────────

/// Datasets of one training run.
pub struct TrainingData {
    pub train: NrmsDataset,
    pub valid: NrmsDataset,
    pub test:  Option<NrmsDataset>,
}

pub fn run_training(
    cfg:          &TrainConfig,
    data:         TrainingData,
    ckpt_manager: CheckpointManager,
) -> Result<()> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);
    train_loop(cfg, data, ckpt_manager, device)
}

fn train_loop(
    cfg:          &TrainConfig,
    data:         TrainingData,
    ckpt_manager: CheckpointManager,
    device:       burn::backend::wgpu::WgpuDevice,
) -> Result<()> {
    MyBackend::seed(&device, cfg.seed);

    // ── Build model around the pretrained document encoder ──────────────────
    let pretrained  = PretrainedStore::new(&cfg.pretrained_root, &cfg.model_name);
    let model_cfg   = NrmsConfig::new(pretrained.config()?)
        .with_encoder_dim(cfg.encoder_dim)
        .with_max_history(cfg.history_len)
        .with_profile(cfg.profile);
    let doc_encoder = pretrained.load_doc_encoder::<MyBackend>(&device)?;
    let model: Nrms<MyBackend> = model_cfg.init_with_doc_encoder(doc_encoder, &device);
    ckpt_manager.save_model_config(&model_cfg)?;
    tracing::info!(
        "Model ready: profile={:?}, encoder_dim={}, {} trainable of {} params",
        cfg.profile,
        cfg.encoder_dim,
        trainable_params(&model),
        model.num_params(),
    );

    // ── Adam with L2 weight decay + plateau scheduler ────────────────────────
    let optim = AdamConfig::new()
        .with_weight_decay(Some(WeightDecayConfig::new(cfg.weight_decay as f32)))
        .init();
    let scheduler = PlateauSchedulerConfig::new(cfg.lr)
        .with_factor(cfg.lr_factor)
        .with_patience(cfg.lr_patience)
        .with_threshold(cfg.lr_threshold)
        .with_min_lr(cfg.min_lr)
        .init();

    let mut trainer = NrmsTrainer::new(model, optim, scheduler);
    if cfg.visualize_every > 0 {
        let sink = CsvAttentionSink::new(ckpt_manager.dir().join("attention"))?;
        trainer = trainer.with_attention_sink(Box::new(sink), cfg.visualize_every);
    }

    // ── Data loaders ─────────────────────────────────────────────────────────
    let masking = model_cfg.history_masking;
    let train_batcher = NrmsBatcher::<MyBackend>::new(
        cfg.title_len, cfg.history_len, cfg.num_negatives, cfg.pad_id, masking,
    );
    let train_loader = DataLoaderBuilder::new(train_batcher)
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(1)
        .set_device(device.clone())
        .build(data.train);

    let eval_batcher = NrmsBatcher::<MyInnerBackend>::new(
        cfg.title_len, cfg.history_len, cfg.num_negatives, cfg.pad_id, masking,
    );
    let val_loader = DataLoaderBuilder::new(eval_batcher.clone())
        .batch_size(cfg.batch_size)
        .num_workers(1)
        .set_device(device.clone())
        .build(data.valid);

    let metrics = MetricsLogger::new(ckpt_manager.dir())?;
    let mut best_val_loss = f64::INFINITY;

    // ── Epoch loop ───────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {
        trainer.begin_epoch(epoch);

        for batch in train_loader.iter() {
            trainer.training_step(&batch)?;
        }
        let avg_train_loss = trainer.on_train_epoch_end();

        for batch in val_loader.iter() {
            let step = trainer.validation_step(&batch)?;
            tracing::trace!("{}={:.4}", step.name, step.value);
        }
        let avg_val_loss = trainer.on_validation_epoch_end();

        let row = EpochMetrics::new(epoch, avg_train_loss, avg_val_loss, trainer.lr());
        println!(
            "Epoch {:>3}/{} | avg_train_loss={:.4} | avg_val_loss={:.4} | lr={:.2e}",
            epoch, cfg.epochs, row.avg_train_loss, row.avg_val_loss, row.lr,
        );
        metrics.log(&row)?;
        if row.is_improvement(best_val_loss) {
            best_val_loss = row.avg_val_loss;
            tracing::info!("New best avg_val_loss={:.4} at epoch {}", best_val_loss, epoch);
        }

        ckpt_manager.save_model(trainer.model(), epoch)?;
        tracing::info!("Checkpoint saved for epoch {}", epoch);
    }

    // ── Optional held-out evaluation ─────────────────────────────────────────
    if let Some(test) = data.test {
        let test_loader = DataLoaderBuilder::new(eval_batcher)
            .batch_size(cfg.batch_size)
            .num_workers(1)
            .set_device(device)
            .build(test);
        for batch in test_loader.iter() {
            let step = trainer.test_step(&batch)?;
            tracing::trace!("{}={:.4}", step.name, step.value);
        }
        if let Some(avg) = trainer.on_test_epoch_end() {
            println!("Test | avg_test_loss={:.4}", avg);
        }
    }

    tracing::info!("Training complete!");
    Ok(())
}

/// Number of parameters that will receive gradients.
fn trainable_params<B: AutodiffBackend>(model: &Nrms<B>) -> usize {
    use burn::module::{ModuleVisitor, Param};

    struct Counter(usize);
    impl<B: AutodiffBackend> ModuleVisitor<B> for Counter {
        fn visit_float<const D: usize>(&mut self, param: &Param<Tensor<B, D>>) {
            let tensor = param.val();
            if tensor.is_require_grad() {
                self.0 += tensor.shape().num_elements();
            }
        }
    }

    let mut counter = Counter(0);
    model.visit(&mut counter);
    counter.0
}
