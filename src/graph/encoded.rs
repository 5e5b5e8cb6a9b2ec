//! Dense tensor snapshot of a stock graph.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Immutable tensor encoding of a [`super::StockGraph`].
///
/// Row `i` of `features`, element `i` of `labels` and index `i` in
/// `edge_index` pairs all refer to the same node, `symbols[i]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodedGraph {
    /// Ticker symbols in row order
    pub symbols: Vec<String>,
    /// Node feature matrix (nodes x features)
    pub features: Array2<f64>,
    /// Regression target per node
    pub labels: Array1<f64>,
    /// Directed edges as (source-row, target-row) pairs
    pub edge_index: Vec<(usize, usize)>,
}

impl EncodedGraph {
    /// Get the number of nodes (rows).
    pub fn node_count(&self) -> usize {
        self.features.nrows()
    }

    /// Get the feature dimension (columns).
    pub fn feature_dim(&self) -> usize {
        self.features.ncols()
    }

    /// Get the symmetrically normalized adjacency matrix with self-loops.
    ///
    /// Edges are symmetrized, every node gets a self-loop, and the
    /// result is D^-1/2 (A + I) D^-1/2. Multiplying node features by
    /// this matrix averages each node with its neighborhood weighted by
    /// degree, which is the aggregation step of a graph convolution.
    pub fn normalized_adjacency(&self) -> Array2<f64> {
        let n = self.node_count();
        let mut adj: Array2<f64> = Array2::zeros((n, n));

        for &(source, target) in &self.edge_index {
            adj[[source, target]] = 1.0;
            adj[[target, source]] = 1.0;
        }
        for i in 0..n {
            adj[[i, i]] = 1.0;
        }

        let d_inv_sqrt: Vec<f64> = (0..n)
            .map(|i| 1.0 / adj.row(i).sum().max(1e-10).sqrt())
            .collect();

        let mut normalized = Array2::zeros((n, n));
        for i in 0..n {
            for j in 0..n {
                normalized[[i, j]] = d_inv_sqrt[i] * adj[[i, j]] * d_inv_sqrt[j];
            }
        }

        normalized
    }
}
