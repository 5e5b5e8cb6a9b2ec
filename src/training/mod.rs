//! Fixed-epoch training loop for the GCN regressor.
//!
//! Each epoch runs a full-graph forward pass, computes MSE over the
//! train rows only, backpropagates, applies a gradient-descent update
//! with L2 weight decay, steps the learning-rate schedule, then scores
//! the validation rows without touching the parameters. There is no
//! early stopping and no checkpoint selection: the epoch budget is the
//! total work.

use crate::data::DataSplit;
use crate::graph::EncodedGraph;
use crate::model::{Gcn, ModelError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};

/// Errors raised during training.
#[derive(Error, Debug)]
pub enum TrainError {
    #[error("{split} split is empty, loss is undefined")]
    EmptySplit { split: &'static str },

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Training hyperparameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Number of epochs to run
    pub epochs: usize,
    /// Initial learning rate
    pub learning_rate: f64,
    /// L2 weight decay coefficient
    pub weight_decay: f64,
    /// Multiplicative learning-rate decay factor
    pub lr_decay: f64,
    /// Apply the decay every this many epochs
    pub lr_step_size: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            learning_rate: 0.01,
            weight_decay: 5e-4,
            lr_decay: 0.5,
            lr_step_size: 20,
        }
    }
}

/// Loss bookkeeping for one epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// 1-based epoch index
    pub epoch: usize,
    /// MSE over the train split
    pub train_loss: f64,
    /// MSE over the validation split (NaN when the split is empty)
    pub val_loss: f64,
    /// Learning rate used for this epoch's update
    pub learning_rate: f64,
}

impl fmt::Display for EpochMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "epoch {}: train loss {:.4}, val loss {:.4}, lr {:.6}",
            self.epoch, self.train_loss, self.val_loss, self.learning_rate
        )
    }
}

/// Runs the optimization loop over a frozen graph tensor.
pub struct Trainer {
    config: TrainConfig,
}

impl Trainer {
    /// Create a trainer with the given configuration.
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Train the model in place for the configured epoch budget.
    ///
    /// Returns the per-epoch loss history. Fails up front if the train
    /// split is empty; an empty validation split only degrades the
    /// monitoring column to NaN.
    pub fn fit(
        &self,
        model: &mut Gcn,
        encoded: &EncodedGraph,
        split: &DataSplit,
    ) -> Result<Vec<EpochMetrics>, TrainError> {
        if split.train.is_empty() {
            return Err(TrainError::EmptySplit { split: "train" });
        }
        if split.val.is_empty() {
            warn!("validation split is empty, val loss will be NaN");
        }

        let adjacency = encoded.normalized_adjacency();
        let mut learning_rate = self.config.learning_rate;
        let mut history = Vec::with_capacity(self.config.epochs);

        for epoch in 1..=self.config.epochs {
            let predictions = model.forward(&encoded.features, &adjacency, true)?;
            let train_loss = masked_mse(&predictions, &encoded.labels, &split.train);

            let grad = mse_gradient(&predictions, &encoded.labels, &split.train);
            model.backward(&grad, &adjacency);
            model.apply_gradients(learning_rate, self.config.weight_decay);

            let used_lr = learning_rate;
            if self.config.lr_step_size > 0 && epoch % self.config.lr_step_size == 0 {
                learning_rate *= self.config.lr_decay;
            }

            let val_predictions = model.predict(&encoded.features, &adjacency)?;
            let val_loss = masked_mse(&val_predictions, &encoded.labels, &split.val);

            let metrics = EpochMetrics {
                epoch,
                train_loss,
                val_loss,
                learning_rate: used_lr,
            };
            info!(
                epoch,
                total = self.config.epochs,
                train_loss,
                val_loss,
                "epoch complete"
            );
            history.push(metrics);
        }

        Ok(history)
    }
}

/// MSE restricted to the given rows; NaN when `rows` is empty.
pub fn masked_mse(predictions: &Array1<f64>, labels: &Array1<f64>, rows: &[usize]) -> f64 {
    if rows.is_empty() {
        return f64::NAN;
    }
    rows.iter()
        .map(|&i| (predictions[i] - labels[i]).powi(2))
        .sum::<f64>()
        / rows.len() as f64
}

/// Gradient of the masked MSE with respect to each prediction.
///
/// Rows outside the mask carry zero gradient, so held-out nodes never
/// influence the update.
fn mse_gradient(predictions: &Array1<f64>, labels: &Array1<f64>, rows: &[usize]) -> Array1<f64> {
    let mut grad = Array1::zeros(predictions.len());
    let m = rows.len() as f64;
    for &i in rows {
        grad[i] = 2.0 * (predictions[i] - labels[i]) / m;
    }
    grad
}
