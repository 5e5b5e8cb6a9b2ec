//! Forecast-quality metrics over the held-out test nodes.
//!
//! All metrics are computed once, from a single frozen forward pass.
//! Degenerate cases get a defined fallback instead of a crash: 0 for
//! directional accuracy and the Sharpe ratio, NaN for MAPE and the
//! information coefficient where the quantity is mathematically
//! undefined. Fallbacks are surfaced in the report, never dropped.

use crate::data::DataSplit;
use crate::graph::EncodedGraph;
use crate::model::{Gcn, ModelError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::warn;

/// Errors raised during evaluation.
#[derive(Error, Debug)]
pub enum EvalError {
    #[error("test split is empty, metrics are undefined")]
    EmptyTestSplit,

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Final metric report of a trained model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastReport {
    /// Mean absolute error
    pub mae: f64,
    /// Root mean squared error
    pub rmse: f64,
    /// Mean absolute percentage error (NaN when any true value is 0)
    pub mape_pct: f64,
    /// Share of consecutive prediction deltas with the correct sign
    pub directional_accuracy_pct: f64,
    /// Share of predictions whose sign matches the true value's sign
    pub hit_rate_pct: f64,
    /// Mean over std of the prediction-minus-truth residual
    pub sharpe_ratio: f64,
    /// Pearson correlation between predictions and truths
    pub information_coefficient: f64,
}

impl ForecastReport {
    /// Compute the full metric battery from aligned prediction and
    /// truth slices. Both must be in test-row order and non-empty.
    pub fn compute(predictions: &[f64], truths: &[f64]) -> Self {
        debug_assert_eq!(predictions.len(), truths.len());
        debug_assert!(!truths.is_empty(), "metrics over an empty window are undefined");
        let n = truths.len() as f64;

        let mae = predictions
            .iter()
            .zip(truths)
            .map(|(p, t)| (t - p).abs())
            .sum::<f64>()
            / n;
        let rmse = (predictions
            .iter()
            .zip(truths)
            .map(|(p, t)| (t - p).powi(2))
            .sum::<f64>()
            / n)
            .sqrt();

        let mape_pct = if truths.iter().any(|&t| t == 0.0) {
            warn!("zero true value in test window, MAPE is undefined");
            f64::NAN
        } else {
            predictions
                .iter()
                .zip(truths)
                .map(|(p, t)| ((t - p) / t).abs())
                .sum::<f64>()
                / n
                * 100.0
        };

        let directional_accuracy_pct = if truths.len() < 2 {
            warn!("fewer than two test rows, directional accuracy falls back to 0");
            0.0
        } else {
            let hits = predictions
                .windows(2)
                .zip(truths.windows(2))
                .filter(|(p, t)| sign(p[1] - p[0]) == sign(t[1] - t[0]))
                .count();
            hits as f64 / (truths.len() - 1) as f64 * 100.0
        };

        let hit_rate_pct = predictions
            .iter()
            .zip(truths)
            .filter(|(p, t)| sign(**p) == sign(**t))
            .count() as f64
            / n
            * 100.0;

        let residuals: Vec<f64> = predictions.iter().zip(truths).map(|(p, t)| p - t).collect();
        let (res_mean, res_std) = mean_std(&residuals);
        let sharpe_ratio = if res_std > 0.0 {
            res_mean / res_std
        } else {
            warn!("zero residual variance, Sharpe ratio falls back to 0");
            0.0
        };

        let information_coefficient = pearson(predictions, truths);

        Self {
            mae,
            rmse,
            mape_pct,
            directional_accuracy_pct,
            hit_rate_pct,
            sharpe_ratio,
            information_coefficient,
        }
    }
}

impl fmt::Display for ForecastReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"Evaluation Metrics
==================
MAE:                      {:.4}
RMSE:                     {:.4}
MAPE (%):                 {:.4}
Directional Accuracy (%): {:.4}
Hit Rate (%):             {:.4}
Sharpe Ratio:             {:.4}
Information Coefficient:  {:.4}"#,
            self.mae,
            self.rmse,
            self.mape_pct,
            self.directional_accuracy_pct,
            self.hit_rate_pct,
            self.sharpe_ratio,
            self.information_coefficient,
        )
    }
}

/// Score a trained model on the test split of an encoded graph.
///
/// Predictions come from one inference-mode pass over the full graph;
/// test rows are then taken in their original row order (split indices
/// are stored ascending), not re-sorted by any temporal key.
pub fn evaluate(
    model: &mut Gcn,
    encoded: &EncodedGraph,
    split: &DataSplit,
) -> Result<ForecastReport, EvalError> {
    if split.test.is_empty() {
        return Err(EvalError::EmptyTestSplit);
    }

    let adjacency = encoded.normalized_adjacency();
    let predictions = model.predict(&encoded.features, &adjacency)?;

    let test_predictions: Vec<f64> = split.test.iter().map(|&i| predictions[i]).collect();
    let test_truths: Vec<f64> = split.test.iter().map(|&i| encoded.labels[i]).collect();

    Ok(ForecastReport::compute(&test_predictions, &test_truths))
}

fn sign(x: f64) -> i8 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Pearson correlation; NaN when either side has zero variance or
/// there are fewer than two samples.
fn pearson(a: &[f64], b: &[f64]) -> f64 {
    if a.len() < 2 {
        warn!("fewer than two test rows, information coefficient is undefined");
        return f64::NAN;
    }
    let (mean_a, std_a) = mean_std(a);
    let (mean_b, std_b) = mean_std(b);
    if std_a == 0.0 || std_b == 0.0 {
        warn!("zero variance in predictions or truths, information coefficient is undefined");
        return f64::NAN;
    }

    let covariance = a
        .iter()
        .zip(b)
        .map(|(x, y)| (x - mean_a) * (y - mean_b))
        .sum::<f64>()
        / a.len() as f64;
    covariance / (std_a * std_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_predictions() {
        let truths = [0.5, -0.3, 0.8, -0.1, 0.2];
        let report = ForecastReport::compute(&truths, &truths);

        assert!(report.mae.abs() < 1e-12);
        assert!(report.rmse.abs() < 1e-12);
        assert!(report.mape_pct.abs() < 1e-12);
        assert!((report.directional_accuracy_pct - 100.0).abs() < 1e-12);
        assert!((report.hit_rate_pct - 100.0).abs() < 1e-12);
        assert!((report.information_coefficient - 1.0).abs() < 1e-12);
        // Zero residual variance falls back to 0.
        assert_eq!(report.sharpe_ratio, 0.0);
    }

    #[test]
    fn test_single_test_row_fallbacks() {
        let report = ForecastReport::compute(&[0.4], &[0.5]);

        assert!((report.mae - 0.1).abs() < 1e-12);
        assert_eq!(report.directional_accuracy_pct, 0.0);
        assert_eq!(report.sharpe_ratio, 0.0);
        assert!(report.information_coefficient.is_nan());
        assert!(report.mape_pct.is_finite());
    }

    #[test]
    #[should_panic(expected = "empty window")]
    fn test_compute_rejects_empty_window() {
        ForecastReport::compute(&[], &[]);
    }

    #[test]
    fn test_mape_undefined_on_zero_truth() {
        let report = ForecastReport::compute(&[0.1, 0.2], &[0.0, 0.4]);
        assert!(report.mape_pct.is_nan());
        assert!(report.mae.is_finite());
    }

    #[test]
    fn test_hit_rate_counts_sign_agreement() {
        let predictions = [0.5, -0.5, 0.5, -0.5];
        let truths = [1.0, 1.0, 2.0, -2.0];
        let report = ForecastReport::compute(&predictions, &truths);
        assert!((report.hit_rate_pct - 75.0).abs() < 1e-12);
    }

    #[test]
    fn test_directional_accuracy_counts_delta_signs() {
        // Prediction deltas: +, -; truth deltas: +, +.
        let predictions = [0.0, 1.0, 0.5];
        let truths = [0.0, 1.0, 2.0];
        let report = ForecastReport::compute(&predictions, &truths);
        assert!((report.directional_accuracy_pct - 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_anticorrelated_information_coefficient() {
        let predictions = [1.0, 2.0, 3.0, 4.0];
        let truths = [4.0, 3.0, 2.0, 1.0];
        let report = ForecastReport::compute(&predictions, &truths);
        assert!((report.information_coefficient + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_sharpe_from_residuals() {
        // Residuals: 0.1, 0.3 -> mean 0.2, std 0.1.
        let predictions = [1.1, 1.3];
        let truths = [1.0, 1.0];
        let report = ForecastReport::compute(&predictions, &truths);
        assert!((report.sharpe_ratio - 2.0).abs() < 1e-9);
    }
}
