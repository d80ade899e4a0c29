//! Epoch loop with shuffling, periodic pruning and early stopping.
//!
//! Every sample gets its own forward/backward/update; `batch_size` only sets
//! how often progress is logged.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::ConvNet;
use crate::data::Sample;
use crate::error::{CnnError, Result};
use crate::nn::rng_from_seed;

/// Training loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Maximum number of passes over the training set.
    pub epochs: usize,
    /// Samples per logging group.
    pub batch_size: usize,
    /// Log the running loss every this many batches.
    pub log_every_batches: usize,
    /// Epochs without improvement before stopping; `0` never stops early.
    pub patience: usize,
    /// Accuracy gain that counts as an improvement.
    pub min_delta: f64,
    /// Visit the training set in a fresh random order every epoch.
    pub shuffle: bool,
    /// Seed for the shuffle order; OS entropy when `None`.
    pub seed: Option<u64>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            epochs: 30,
            batch_size: 30,
            log_every_batches: 10,
            patience: 4,
            min_delta: 0.001,
            shuffle: true,
            seed: None,
        }
    }
}

impl TrainerConfig {
    /// Sets the epoch limit.
    #[must_use]
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    /// Sets the logging batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets early-stopping patience (`0` disables it).
    #[must_use]
    pub fn with_patience(mut self, patience: usize) -> Self {
        self.patience = patience;
        self
    }

    /// Seeds the shuffle order.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Turns shuffling on or off.
    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Checks that `epochs` and `batch_size` are positive.
    ///
    /// # Errors
    ///
    /// Returns [`CnnError::InvalidHyperparameter`].
    pub fn validate(&self) -> Result<()> {
        for (param, value) in [("epochs", self.epochs), ("batch_size", self.batch_size)] {
            if value == 0 {
                return Err(CnnError::InvalidHyperparameter {
                    param: param.to_string(),
                    value: "0".to_string(),
                    constraint: ">= 1".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Summary of one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Mean per-sample cross-entropy, measured before each update.
    pub mean_loss: f64,
    /// Validation accuracy after the epoch.
    pub accuracy: f64,
    /// Weights zeroed by the pruning pass at the end of the epoch.
    pub pruned: usize,
}

/// Everything recorded by [`Trainer::fit`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrainingHistory {
    /// One entry per completed epoch.
    pub epochs: Vec<EpochStats>,
    /// Best validation accuracy seen.
    pub best_accuracy: f64,
    /// Whether early stopping ended the run.
    pub stopped_early: bool,
}

impl TrainingHistory {
    /// Mean loss of the first epoch.
    #[must_use]
    pub fn initial_loss(&self) -> Option<f64> {
        self.epochs.first().map(|e| e.mean_loss)
    }

    /// Mean loss of the last epoch.
    #[must_use]
    pub fn final_loss(&self) -> Option<f64> {
        self.epochs.last().map(|e| e.mean_loss)
    }
}

/// Runs epochs of online SGD over a [`ConvNet`].
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    /// Creates a trainer.
    #[must_use]
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    /// Get configuration
    #[must_use]
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Trains `net` on `train`, scoring on `validation` after every epoch.
    ///
    /// When pruning is enabled in the network's configuration, the network
    /// is pruned at the end of every `pruning_frequency`-th epoch.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid trainer configuration, and passes
    /// through any error from [`ConvNet::train`] (the run stops there).
    pub fn fit(
        &self,
        net: &mut ConvNet,
        train: &[Sample],
        validation: &[Sample],
        teacher: Option<&ConvNet>,
    ) -> Result<TrainingHistory> {
        self.config.validate()?;
        if train.is_empty() {
            warn!("Empty training set; nothing to do");
            return Ok(TrainingHistory::default());
        }
        let compression = net.config().compression;
        let mut rng = rng_from_seed(self.config.seed);
        let mut order: Vec<usize> = (0..train.len()).collect();
        let mut history = TrainingHistory::default();
        let mut stale_epochs = 0;

        for epoch in 1..=self.config.epochs {
            if self.config.shuffle {
                order.shuffle(&mut rng);
            }

            let mut total_loss = 0.0;
            let mut seen = 0usize;
            for (batch, chunk) in order.chunks(self.config.batch_size).enumerate() {
                for &i in chunk {
                    let sample = &train[i];
                    total_loss += net.train(&sample.image, &sample.target, teacher)?.loss;
                    seen += 1;
                }
                let batch = batch + 1;
                if self.config.log_every_batches > 0 && batch % self.config.log_every_batches == 0 {
                    debug!(epoch, batch, mean_loss = total_loss / seen as f64, "Training");
                }
            }
            let mean_loss = total_loss / seen as f64;
            let accuracy = net.evaluate(validation)?;

            let prune_now =
                compression.enable_pruning && epoch % compression.pruning_frequency == 0;
            let pruned = if prune_now {
                net.prune(compression.pruning_sparsity)?.weights_pruned()
            } else {
                0
            };

            info!(epoch, mean_loss, accuracy, pruned, "Epoch complete");
            history.epochs.push(EpochStats {
                epoch,
                mean_loss,
                accuracy,
                pruned,
            });

            if accuracy > history.best_accuracy + self.config.min_delta {
                history.best_accuracy = accuracy;
                stale_epochs = 0;
            } else {
                stale_epochs += 1;
                debug!(stale_epochs, patience = self.config.patience, "Accuracy did not improve");
                if self.config.patience > 0 && stale_epochs >= self.config.patience {
                    info!(epoch, best_accuracy = history.best_accuracy, "Early stopping");
                    history.stopped_early = true;
                    break;
                }
            }
        }
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic;
    use crate::network::{CompressionConfig, NetworkConfig};

    fn small_net(compression: CompressionConfig) -> ConvNet {
        let config = NetworkConfig::new(8, 8, 3, 2, 2)
            .with_learning_rate(0.01)
            .with_seed(11)
            .with_compression(compression);
        ConvNet::new(config).expect("valid config")
    }

    #[test]
    fn test_fit_runs_every_epoch_without_patience() {
        let data = synthetic::bars(6, 8, 1);
        let mut net = small_net(CompressionConfig::default());
        let trainer = Trainer::new(
            TrainerConfig::default()
                .with_epochs(3)
                .with_batch_size(4)
                .with_patience(0)
                .with_seed(5),
        );
        let history = trainer.fit(&mut net, &data, &data, None).expect("finite");
        assert_eq!(history.epochs.len(), 3);
        assert!(!history.stopped_early);
        assert_eq!(history.epochs[2].epoch, 3);
        assert!(history.epochs.iter().all(|e| e.mean_loss.is_finite()));
    }

    #[test]
    fn test_empty_validation_stops_after_patience() {
        let data = synthetic::bars(2, 8, 1);
        let mut net = small_net(CompressionConfig::default());
        let trainer = Trainer::new(TrainerConfig::default().with_epochs(20).with_patience(2));
        let history = trainer.fit(&mut net, &data, &[], None).expect("finite");
        assert!(history.stopped_early);
        assert_eq!(history.epochs.len(), 2);
    }

    #[test]
    fn test_prunes_on_schedule() {
        let data = synthetic::bars(2, 8, 3);
        let compression = CompressionConfig::default()
            .with_pruning(0.3)
            .with_pruning_frequency(2);
        let mut net = small_net(compression);
        let trainer = Trainer::new(TrainerConfig::default().with_epochs(4).with_patience(0));
        let history = trainer.fit(&mut net, &data, &data, None).expect("finite");
        assert_eq!(history.epochs[0].pruned, 0);
        assert!(history.epochs[1].pruned > 0);
        assert_eq!(history.epochs[2].pruned, 0);
    }

    #[test]
    fn test_rejects_zero_batch_size() {
        let mut net = small_net(CompressionConfig::default());
        let trainer = Trainer::new(TrainerConfig::default().with_batch_size(0));
        assert!(trainer.fit(&mut net, &[], &[], None).is_err());
    }
}
