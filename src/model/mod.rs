//! Graph convolutional regressor.
//!
//! A fixed-depth stack of graph convolutions, each followed by batch
//! normalization, ReLU and dropout, with a final convolution down to
//! one scalar per node. Backpropagation is implemented layer by layer
//! so the trainer can run plain gradient descent over the whole stack.

mod layers;

pub use layers::{BatchNorm, GraphConvLayer};

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the regressor.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("invalid model configuration: {0}")]
    InvalidConfig(String),

    #[error("feature dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Configuration for the GCN regressor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcnConfig {
    /// Input feature dimension
    pub in_dim: usize,
    /// Hidden layer width
    pub hidden_dim: usize,
    /// Output dimension (one scalar per node)
    pub out_dim: usize,
    /// Number of graph convolution layers
    pub num_layers: usize,
    /// Dropout probability applied after each hidden activation
    pub dropout: f64,
    /// Seed for weight initialization and dropout masks
    pub seed: Option<u64>,
}

impl Default for GcnConfig {
    fn default() -> Self {
        Self {
            in_dim: 5,
            hidden_dim: 32,
            out_dim: 1,
            num_layers: 3,
            dropout: 0.6,
            seed: None,
        }
    }
}

/// Graph convolutional network producing one prediction per node.
#[derive(Debug, Clone)]
pub struct Gcn {
    /// Configuration used to build the model
    pub config: GcnConfig,
    pub(crate) convs: Vec<GraphConvLayer>,
    pub(crate) norms: Vec<BatchNorm>,
    relu_masks: Vec<Array2<f64>>,
    dropout_masks: Vec<Array2<f64>>,
    rng: StdRng,
}

impl Gcn {
    /// Build a model from configuration.
    ///
    /// Requires at least two layers: the hidden blocks plus the final
    /// projection to `out_dim`.
    pub fn new(config: GcnConfig) -> Result<Self, ModelError> {
        if config.num_layers < 2 {
            return Err(ModelError::InvalidConfig(format!(
                "num_layers must be at least 2, got {}",
                config.num_layers
            )));
        }
        if !(0.0..1.0).contains(&config.dropout) {
            return Err(ModelError::InvalidConfig(format!(
                "dropout must be in [0, 1), got {}",
                config.dropout
            )));
        }

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut convs = Vec::with_capacity(config.num_layers);
        let mut norms = Vec::with_capacity(config.num_layers - 1);

        convs.push(GraphConvLayer::new(
            config.in_dim,
            config.hidden_dim,
            &mut rng,
        ));
        norms.push(BatchNorm::new(config.hidden_dim));
        for _ in 1..config.num_layers - 1 {
            convs.push(GraphConvLayer::new(
                config.hidden_dim,
                config.hidden_dim,
                &mut rng,
            ));
            norms.push(BatchNorm::new(config.hidden_dim));
        }
        convs.push(GraphConvLayer::new(
            config.hidden_dim,
            config.out_dim,
            &mut rng,
        ));

        Ok(Self {
            config,
            convs,
            norms,
            relu_masks: Vec::new(),
            dropout_masks: Vec::new(),
            rng,
        })
    }

    /// Forward pass over the full graph.
    ///
    /// Returns one prediction per node, in input row order. Training
    /// mode activates dropout and batch-statistics normalization;
    /// inference mode freezes both.
    pub fn forward(
        &mut self,
        features: &Array2<f64>,
        adjacency: &Array2<f64>,
        training: bool,
    ) -> Result<Array1<f64>, ModelError> {
        if features.ncols() != self.config.in_dim {
            return Err(ModelError::DimensionMismatch {
                expected: self.config.in_dim,
                actual: features.ncols(),
            });
        }

        self.relu_masks.clear();
        self.dropout_masks.clear();

        let hidden_blocks = self.convs.len() - 1;
        let mut h = features.clone();

        for i in 0..hidden_blocks {
            h = self.convs[i].forward(&h, adjacency);
            h = self.norms[i].forward(&h, training);

            let mask = h.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
            h *= &mask;
            if training {
                self.relu_masks.push(mask);
            }

            if training && self.config.dropout > 0.0 {
                let keep = 1.0 - self.config.dropout;
                let rng = &mut self.rng;
                let dropout_mask = Array2::from_shape_fn(h.dim(), |_| {
                    if rng.gen::<f64>() < keep {
                        1.0 / keep
                    } else {
                        0.0
                    }
                });
                h *= &dropout_mask;
                self.dropout_masks.push(dropout_mask);
            }
        }

        let z = self.convs[hidden_blocks].forward(&h, adjacency);
        Ok(z.index_axis(Axis(1), 0).to_owned())
    }

    /// Predict without touching dropout or batch-norm statistics.
    pub fn predict(
        &mut self,
        features: &Array2<f64>,
        adjacency: &Array2<f64>,
    ) -> Result<Array1<f64>, ModelError> {
        self.forward(features, adjacency, false)
    }

    /// Backward pass from per-node prediction gradients.
    ///
    /// Must follow a training-mode [`Gcn::forward`] on the same inputs;
    /// fills every layer's parameter gradients.
    pub fn backward(&mut self, grad_predictions: &Array1<f64>, adjacency: &Array2<f64>) {
        let hidden_blocks = self.convs.len() - 1;

        let mut grad = grad_predictions.clone().insert_axis(Axis(1));
        grad = self.convs[hidden_blocks].backward(&grad, adjacency);

        for i in (0..hidden_blocks).rev() {
            if self.config.dropout > 0.0 {
                grad *= &self.dropout_masks[i];
            }
            grad *= &self.relu_masks[i];
            grad = self.norms[i].backward(&grad);
            grad = self.convs[i].backward(&grad, adjacency);
        }
    }

    /// Apply accumulated gradients with L2 weight decay.
    pub fn apply_gradients(&mut self, learning_rate: f64, weight_decay: f64) {
        for conv in &mut self.convs {
            conv.apply_gradients(learning_rate, weight_decay);
        }
        for norm in &mut self.norms {
            norm.apply_gradients(learning_rate, weight_decay);
        }
    }

    /// Get total number of learnable parameters.
    pub fn num_parameters(&self) -> usize {
        self.convs.iter().map(|c| c.num_parameters()).sum::<usize>()
            + self.norms.iter().map(|n| n.num_parameters()).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn config(seed: u64) -> GcnConfig {
        GcnConfig {
            in_dim: 3,
            hidden_dim: 4,
            out_dim: 1,
            num_layers: 3,
            dropout: 0.0,
            seed: Some(seed),
        }
    }

    fn inputs() -> (Array2<f64>, Array2<f64>) {
        let features = array![
            [0.5, -0.2, 0.1],
            [0.3, 0.8, -0.4],
            [-0.6, 0.2, 0.9],
            [0.1, -0.9, 0.4]
        ];
        let adjacency = array![
            [0.5, 0.5, 0.0, 0.0],
            [0.5, 0.3, 0.2, 0.0],
            [0.0, 0.2, 0.4, 0.4],
            [0.0, 0.0, 0.4, 0.6]
        ];
        (features, adjacency)
    }

    #[test]
    fn test_forward_shape_and_order() {
        let mut model = Gcn::new(config(0)).unwrap();
        let (features, adjacency) = inputs();
        let preds = model.forward(&features, &adjacency, true).unwrap();
        assert_eq!(preds.len(), 4);
    }

    #[test]
    fn test_seeded_init_is_reproducible() {
        let a = Gcn::new(config(7)).unwrap();
        let b = Gcn::new(config(7)).unwrap();
        assert_eq!(a.convs[0].weights, b.convs[0].weights);

        let c = Gcn::new(config(8)).unwrap();
        assert_ne!(a.convs[0].weights, c.convs[0].weights);
    }

    #[test]
    fn test_inference_is_deterministic_with_dropout_configured() {
        let mut cfg = config(3);
        cfg.dropout = 0.6;
        let mut model = Gcn::new(cfg).unwrap();
        let (features, adjacency) = inputs();

        let a = model.predict(&features, &adjacency).unwrap();
        let b = model.predict(&features, &adjacency).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut model = Gcn::new(config(0)).unwrap();
        let bad = Array2::zeros((4, 7));
        let adjacency = Array2::eye(4);
        assert!(matches!(
            model.forward(&bad, &adjacency, false),
            Err(ModelError::DimensionMismatch {
                expected: 3,
                actual: 7
            })
        ));
    }

    #[test]
    fn test_too_few_layers_rejected() {
        let mut cfg = config(0);
        cfg.num_layers = 1;
        assert!(matches!(Gcn::new(cfg), Err(ModelError::InvalidConfig(_))));
    }

    #[test]
    fn test_full_gradient_matches_finite_difference() {
        let (features, adjacency) = inputs();
        let labels = array![0.2, -0.4, 0.6, -0.1];

        let mse_grad = |preds: &Array1<f64>| -> Array1<f64> {
            let n = preds.len() as f64;
            (preds - &labels) * (2.0 / n)
        };
        let mse = |preds: &Array1<f64>| -> f64 {
            (preds - &labels).mapv(|d| d * d).mean().unwrap()
        };

        let mut model = Gcn::new(config(11)).unwrap();
        let preds = model.forward(&features, &adjacency, true).unwrap();
        model.backward(&mse_grad(&preds), &adjacency);
        let analytic = model.convs[0].grad_weights[[1, 2]];

        let h = 1e-6;
        let mut plus = model.clone();
        plus.convs[0].weights[[1, 2]] += h;
        let mut minus = model.clone();
        minus.convs[0].weights[[1, 2]] -= h;
        let loss_plus = mse(&plus.forward(&features, &adjacency, true).unwrap());
        let loss_minus = mse(&minus.forward(&features, &adjacency, true).unwrap());
        let numeric = (loss_plus - loss_minus) / (2.0 * h);

        assert!(
            (analytic - numeric).abs() < 1e-5,
            "analytic {} vs numeric {}",
            analytic,
            numeric
        );
    }
}
