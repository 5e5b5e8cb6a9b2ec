//! Standardization of node features and labels.

use crate::data::DataSplit;
use crate::graph::EncodedGraph;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Which rows contribute to the normalization statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalerScope {
    /// Statistics over every node, validation and test included.
    ///
    /// This matches the reference pipeline. It leaks held-out
    /// statistics into training, so stricter runs should opt into
    /// [`ScalerScope::TrainOnly`].
    AllNodes,
    /// Statistics over the train split only.
    TrainOnly,
}

impl Default for ScalerScope {
    fn default() -> Self {
        Self::AllNodes
    }
}

/// Per-column feature statistics and label statistics.
///
/// Fitted once after encoding and read-only afterwards. A zero
/// standard deviation is replaced by a scale of 1 so constant columns
/// map to zero instead of NaN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Mean per feature column
    pub feature_mean: Array1<f64>,
    /// Scale per feature column
    pub feature_scale: Array1<f64>,
    /// Label mean
    pub label_mean: f64,
    /// Label scale
    pub label_scale: f64,
}

const MIN_SCALE: f64 = 1e-12;

impl StandardScaler {
    /// Fit statistics over all nodes of the encoded graph.
    pub fn fit(encoded: &EncodedGraph) -> Self {
        Self::fit_rows(&encoded.features, &encoded.labels, None)
    }

    /// Fit statistics with an explicit scope.
    ///
    /// [`ScalerScope::TrainOnly`] restricts the statistics to the train
    /// split; the transform is still applied identically to every row.
    pub fn fit_scoped(encoded: &EncodedGraph, scope: ScalerScope, split: &DataSplit) -> Self {
        match scope {
            ScalerScope::AllNodes => Self::fit(encoded),
            ScalerScope::TrainOnly => {
                Self::fit_rows(&encoded.features, &encoded.labels, Some(&split.train[..]))
            }
        }
    }

    fn fit_rows(features: &Array2<f64>, labels: &Array1<f64>, rows: Option<&[usize]>) -> Self {
        let (features, labels) = match rows {
            Some(rows) => (
                features.select(Axis(0), rows),
                labels.select(Axis(0), rows),
            ),
            None => (features.clone(), labels.clone()),
        };

        let d = features.ncols();
        let mut feature_mean = Array1::zeros(d);
        let mut feature_scale = Array1::ones(d);

        for j in 0..d {
            let column = features.column(j);
            let (mean, std) = mean_std(column.iter().copied());
            feature_mean[j] = mean;
            feature_scale[j] = if std > MIN_SCALE {
                std
            } else {
                warn!(column = j, "zero variance in feature column, using scale 1");
                1.0
            };
        }

        let (label_mean, label_std) = mean_std(labels.iter().copied());
        let label_scale = if label_std > MIN_SCALE {
            label_std
        } else {
            warn!("zero variance in labels, using scale 1");
            1.0
        };

        Self {
            feature_mean,
            feature_scale,
            label_mean,
            label_scale,
        }
    }

    /// Apply the fitted statistics to every row of the encoded graph.
    pub fn transform(&self, encoded: &EncodedGraph) -> EncodedGraph {
        let mut features = encoded.features.clone();
        for (j, mut column) in features.columns_mut().into_iter().enumerate() {
            let mean = self.feature_mean[j];
            let scale = self.feature_scale[j];
            column.mapv_inplace(|v| (v - mean) / scale);
        }

        let labels = encoded
            .labels
            .mapv(|y| (y - self.label_mean) / self.label_scale);

        EncodedGraph {
            symbols: encoded.symbols.clone(),
            features,
            labels,
            edge_index: encoded.edge_index.clone(),
        }
    }

    /// Map standardized label-space values back to return space.
    pub fn inverse_labels(&self, values: &Array1<f64>) -> Array1<f64> {
        values.mapv(|v| v * self.label_scale + self.label_mean)
    }
}

fn mean_std(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let n = values.clone().count() as f64;
    if n == 0.0 {
        return (0.0, 0.0);
    }
    let mean = values.clone().sum::<f64>() / n;
    let variance = values.map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}
