//! Graph convolution and batch normalization layers.
//!
//! Each layer caches its forward activations and exposes a `backward`
//! that fills parameter gradients and returns the gradient with respect
//! to its input, so the model can chain them in reverse.

use ndarray::{Array1, Array2, Axis};
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand_distr::Uniform;

/// A graph convolution: Z = A_hat * X * W + b.
///
/// `A_hat` is the normalized adjacency, so each row of `A_hat * X`
/// mixes a node's own features with its neighbors' before the learned
/// projection.
#[derive(Debug, Clone)]
pub struct GraphConvLayer {
    /// Weight matrix (input_dim x output_dim)
    pub weights: Array2<f64>,
    /// Bias vector (output_dim)
    pub bias: Array1<f64>,

    pub(crate) grad_weights: Array2<f64>,
    pub(crate) grad_bias: Array1<f64>,
    aggregated: Option<Array2<f64>>,
}

impl GraphConvLayer {
    /// Create a layer with Xavier-initialized weights.
    pub fn new(input_dim: usize, output_dim: usize, rng: &mut StdRng) -> Self {
        let limit = (6.0 / (input_dim + output_dim) as f64).sqrt();
        let weights =
            Array2::random_using((input_dim, output_dim), Uniform::new(-limit, limit), rng);

        Self {
            weights,
            bias: Array1::zeros(output_dim),
            grad_weights: Array2::zeros((input_dim, output_dim)),
            grad_bias: Array1::zeros(output_dim),
            aggregated: None,
        }
    }

    /// Forward pass, caching the aggregated input for backward.
    pub fn forward(&mut self, x: &Array2<f64>, adjacency: &Array2<f64>) -> Array2<f64> {
        let aggregated = adjacency.dot(x);
        let mut z = aggregated.dot(&self.weights);
        for mut row in z.rows_mut() {
            row += &self.bias;
        }
        self.aggregated = Some(aggregated);
        z
    }

    /// Backward pass. Fills parameter gradients and returns the
    /// gradient with respect to the layer input.
    pub fn backward(&mut self, grad_output: &Array2<f64>, adjacency: &Array2<f64>) -> Array2<f64> {
        let aggregated = self
            .aggregated
            .as_ref()
            .expect("forward must run before backward");

        self.grad_weights = aggregated.t().dot(grad_output);
        self.grad_bias = grad_output.sum_axis(Axis(0));

        adjacency.t().dot(&grad_output.dot(&self.weights.t()))
    }

    /// Gradient-descent update with L2 weight decay.
    pub fn apply_gradients(&mut self, learning_rate: f64, weight_decay: f64) {
        self.weights = &self.weights
            - &((&self.grad_weights + &(&self.weights * weight_decay)) * learning_rate);
        self.bias =
            &self.bias - &((&self.grad_bias + &(&self.bias * weight_decay)) * learning_rate);
    }

    /// Get number of learnable parameters.
    pub fn num_parameters(&self) -> usize {
        self.weights.len() + self.bias.len()
    }
}

/// Feature-wise batch normalization over the node dimension.
///
/// Batch statistics drive normalization during training and feed the
/// running statistics; inference uses the frozen running statistics.
#[derive(Debug, Clone)]
pub struct BatchNorm {
    /// Learned scale per feature
    pub gamma: Array1<f64>,
    /// Learned shift per feature
    pub beta: Array1<f64>,
    /// Running mean, updated in training mode only
    pub running_mean: Array1<f64>,
    /// Running variance, updated in training mode only
    pub running_var: Array1<f64>,
    momentum: f64,
    eps: f64,

    pub(crate) grad_gamma: Array1<f64>,
    pub(crate) grad_beta: Array1<f64>,
    cache: Option<BatchNormCache>,
}

#[derive(Debug, Clone)]
struct BatchNormCache {
    x_hat: Array2<f64>,
    inv_std: Array1<f64>,
}

impl BatchNorm {
    /// Create a batch-norm layer over `dim` features.
    pub fn new(dim: usize) -> Self {
        Self {
            gamma: Array1::ones(dim),
            beta: Array1::zeros(dim),
            running_mean: Array1::zeros(dim),
            running_var: Array1::ones(dim),
            momentum: 0.1,
            eps: 1e-5,
            grad_gamma: Array1::zeros(dim),
            grad_beta: Array1::zeros(dim),
            cache: None,
        }
    }

    /// Forward pass. Training mode normalizes by batch statistics and
    /// updates the running statistics; inference mode uses the running
    /// statistics unchanged.
    pub fn forward(&mut self, x: &Array2<f64>, training: bool) -> Array2<f64> {
        let n = x.nrows() as f64;

        if training {
            let mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
            let var = x.map_axis(Axis(0), |column| {
                column.iter().map(|v| (v - column.mean().unwrap_or(0.0)).powi(2)).sum::<f64>() / n
            });

            self.running_mean =
                &self.running_mean * (1.0 - self.momentum) + &(&mean * self.momentum);
            self.running_var = &self.running_var * (1.0 - self.momentum) + &(&var * self.momentum);

            let inv_std = var.mapv(|v| 1.0 / (v + self.eps).sqrt());
            let mut x_hat = x.clone();
            for mut row in x_hat.rows_mut() {
                row -= &mean;
                row *= &inv_std;
            }

            let mut out = x_hat.clone();
            for mut row in out.rows_mut() {
                row *= &self.gamma;
                row += &self.beta;
            }
            self.cache = Some(BatchNormCache { x_hat, inv_std });
            out
        } else {
            let inv_std = self.running_var.mapv(|v| 1.0 / (v + self.eps).sqrt());
            let mut out = x.clone();
            for mut row in out.rows_mut() {
                row -= &self.running_mean;
                row *= &inv_std;
                row *= &self.gamma;
                row += &self.beta;
            }
            out
        }
    }

    /// Backward pass through the batch-statistics normalization.
    pub fn backward(&mut self, grad_output: &Array2<f64>) -> Array2<f64> {
        let cache = self
            .cache
            .as_ref()
            .expect("training forward must run before backward");
        let n = grad_output.nrows() as f64;

        self.grad_beta = grad_output.sum_axis(Axis(0));
        self.grad_gamma = (grad_output * &cache.x_hat).sum_axis(Axis(0));

        // dx = gamma * inv_std / n * (n*g - sum(g) - x_hat * sum(g * x_hat))
        let mut grad_input = grad_output * n;
        for mut row in grad_input.rows_mut() {
            row -= &self.grad_beta;
        }
        grad_input = grad_input - &cache.x_hat * &self.grad_gamma;
        for mut row in grad_input.rows_mut() {
            row *= &self.gamma;
            row *= &cache.inv_std;
        }
        grad_input / n
    }

    /// Gradient-descent update with L2 weight decay on gamma/beta.
    pub fn apply_gradients(&mut self, learning_rate: f64, weight_decay: f64) {
        self.gamma =
            &self.gamma - &((&self.grad_gamma + &(&self.gamma * weight_decay)) * learning_rate);
        self.beta =
            &self.beta - &((&self.grad_beta + &(&self.beta * weight_decay)) * learning_rate);
    }

    /// Get number of learnable parameters.
    pub fn num_parameters(&self) -> usize {
        self.gamma.len() + self.beta.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    #[test]
    fn test_conv_forward_shape() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut layer = GraphConvLayer::new(5, 8, &mut rng);

        let x = Array2::ones((4, 5));
        let adj = Array2::eye(4);
        let z = layer.forward(&x, &adj);
        assert_eq!(z.dim(), (4, 8));
    }

    #[test]
    fn test_conv_init_is_seeded_and_bounded() {
        let mut a_rng = StdRng::seed_from_u64(9);
        let mut b_rng = StdRng::seed_from_u64(9);
        let a = GraphConvLayer::new(4, 3, &mut a_rng);
        let b = GraphConvLayer::new(4, 3, &mut b_rng);
        assert_eq!(a.weights, b.weights);

        let limit = (6.0 / 7.0_f64).sqrt();
        assert!(a.weights.iter().all(|w| w.abs() <= limit));
    }

    #[test]
    fn test_conv_identity_adjacency_is_linear_layer() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut layer = GraphConvLayer::new(2, 1, &mut rng);
        layer.weights = array![[2.0], [0.5]];
        layer.bias = array![1.0];

        let x = array![[1.0, 4.0], [3.0, 2.0]];
        let z = layer.forward(&x, &Array2::eye(2));
        assert!((z[[0, 0]] - 5.0).abs() < 1e-12);
        assert!((z[[1, 0]] - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_conv_gradient_matches_finite_difference() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut layer = GraphConvLayer::new(3, 2, &mut rng);

        let x = array![[0.5, -0.2, 0.1], [0.3, 0.8, -0.4], [-0.6, 0.2, 0.9]];
        let adj = array![[0.5, 0.5, 0.0], [0.5, 0.4, 0.1], [0.0, 0.1, 0.9]];

        // Loss = sum of outputs, so grad_output is all ones.
        let ones = Array2::ones((3, 2));
        layer.forward(&x, &adj);
        layer.backward(&ones, &adj);
        let analytic = layer.grad_weights[[1, 0]];

        let h = 1e-6;
        let mut plus = layer.clone();
        plus.weights[[1, 0]] += h;
        let mut minus = layer.clone();
        minus.weights[[1, 0]] -= h;
        let numeric = (plus.forward(&x, &adj).sum() - minus.forward(&x, &adj).sum()) / (2.0 * h);

        assert!((analytic - numeric).abs() < 1e-6);
    }

    #[test]
    fn test_batchnorm_normalizes_batch() {
        let mut bn = BatchNorm::new(2);
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]];
        let out = bn.forward(&x, true);

        for j in 0..2 {
            let column = out.column(j);
            let mean = column.mean().unwrap();
            let var = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 4.0;
            assert!(mean.abs() < 1e-10);
            assert!((var - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_batchnorm_inference_uses_running_stats() {
        let mut bn = BatchNorm::new(1);
        let x = array![[100.0], [200.0]];

        // Fresh running stats are mean 0, var 1: inference is identity.
        let out = bn.forward(&x, false);
        assert!((out[[0, 0]] - 100.0).abs() < 1e-2);

        // A training pass moves the running stats toward the batch.
        bn.forward(&x, true);
        assert!(bn.running_mean[0] > 0.0);
    }

    #[test]
    fn test_batchnorm_gradient_matches_finite_difference() {
        let mut bn = BatchNorm::new(2);
        bn.gamma = array![1.3, 0.7];
        bn.beta = array![0.2, -0.1];

        let x = array![[0.5, -0.2], [0.3, 0.8], [-0.6, 0.2], [0.9, -0.7]];

        // Loss = sum of squared outputs.
        let out = bn.forward(&x, true);
        let grad_out = &out * 2.0;
        let grad_in = bn.backward(&grad_out);
        let analytic = grad_in[[2, 1]];

        let h = 1e-6;
        let loss = |bn: &mut BatchNorm, x: &Array2<f64>| bn.forward(x, true).mapv(|v| v * v).sum();
        let mut x_plus = x.clone();
        x_plus[[2, 1]] += h;
        let mut x_minus = x.clone();
        x_minus[[2, 1]] -= h;
        let numeric = (loss(&mut bn, &x_plus) - loss(&mut bn, &x_minus)) / (2.0 * h);

        assert!(
            (analytic - numeric).abs() < 1e-5,
            "analytic {} vs numeric {}",
            analytic,
            numeric
        );
    }
}
