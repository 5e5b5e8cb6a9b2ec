//! End-to-end forecasting pipeline.
//!
//! Strictly sequential: encode the graph, fit and apply the scaler,
//! partition the nodes, train for the fixed epoch budget, evaluate the
//! held-out split once. A failure at any stage aborts the run; there
//! is no partial report.

use crate::data::{DataSplit, ScalerScope, StandardScaler};
use crate::evaluation::{evaluate, EvalError, ForecastReport};
use crate::graph::{GraphError, StockGraph};
use crate::model::{Gcn, GcnConfig, ModelError};
use crate::training::{EpochMetrics, TrainConfig, TrainError, Trainer};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Errors from any pipeline stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("graph encoding failed: {0}")]
    Graph(#[from] GraphError),

    #[error("model construction failed: {0}")]
    Model(#[from] ModelError),

    #[error("training failed: {0}")]
    Train(#[from] TrainError),

    #[error("evaluation failed: {0}")]
    Eval(#[from] EvalError),
}

/// Node partitioning parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of nodes assigned to the train split
    pub train_ratio: f64,
    /// Fraction of nodes assigned to the validation split
    pub val_ratio: f64,
    /// Shuffle seed
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_ratio: 0.7,
            val_ratio: 0.15,
            seed: 42,
        }
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Model architecture (input dimension is inferred from the graph)
    pub model: GcnConfig,
    /// Training hyperparameters
    pub training: TrainConfig,
    /// Partitioning parameters
    pub split: SplitConfig,
    /// Which rows feed the normalization statistics
    pub scaler_scope: ScalerScope,
}

/// Result of a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Final metric report over the test split
    pub report: ForecastReport,
    /// Per-epoch loss history
    pub history: Vec<EpochMetrics>,
    /// Partition used for training and evaluation
    pub split: DataSplit,
}

/// Run the full pipeline over a stock graph.
pub fn run(graph: &StockGraph, config: &PipelineConfig) -> Result<PipelineOutcome, PipelineError> {
    let encoded = graph.encode()?;
    info!(
        nodes = encoded.node_count(),
        edges = encoded.edge_index.len(),
        "graph encoded"
    );

    let split = DataSplit::random(
        encoded.node_count(),
        config.split.train_ratio,
        config.split.val_ratio,
        config.split.seed,
    );
    info!(
        train = split.train.len(),
        val = split.val.len(),
        test = split.test.len(),
        "nodes partitioned"
    );

    let scaler = StandardScaler::fit_scoped(&encoded, config.scaler_scope, &split);
    let normalized = scaler.transform(&encoded);

    let mut model = Gcn::new(GcnConfig {
        in_dim: normalized.feature_dim(),
        ..config.model.clone()
    })?;
    info!(parameters = model.num_parameters(), "model initialized");

    let trainer = Trainer::new(config.training.clone());
    let history = trainer.fit(&mut model, &normalized, &split)?;

    let report = evaluate(&mut model, &normalized, &split)?;
    info!("evaluation complete");

    Ok(PipelineOutcome {
        report,
        history,
        split,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::FEATURE_ATTRIBUTES;
    use std::collections::HashMap;

    /// Four-node chain A->B->C->D with the label equal to the node
    /// index and the remaining attributes held constant.
    fn chain_graph() -> StockGraph {
        let mut graph = StockGraph::new();
        for (i, symbol) in ["A", "B", "C", "D"].iter().enumerate() {
            let mut attributes: HashMap<String, f64> = FEATURE_ATTRIBUTES
                .iter()
                .zip([1.0, 2.0, 3.0, 4.0, 5.0])
                .map(|(k, v)| (k.to_string(), v))
                .collect();
            attributes.insert("daily_return".to_string(), i as f64);
            graph.add_node(*symbol, attributes);
        }
        graph.add_edge("A", "B");
        graph.add_edge("B", "C");
        graph.add_edge("C", "D");
        graph
    }

    fn chain_config(epochs: usize) -> PipelineConfig {
        PipelineConfig {
            model: GcnConfig {
                hidden_dim: 8,
                seed: Some(0),
                ..GcnConfig::default()
            },
            training: TrainConfig {
                epochs,
                ..TrainConfig::default()
            },
            split: SplitConfig {
                train_ratio: 0.5,
                val_ratio: 0.25,
                seed: 42,
            },
            scaler_scope: ScalerScope::AllNodes,
        }
    }

    #[test]
    fn test_zero_epoch_run_produces_well_formed_report() {
        let graph = chain_graph();
        let outcome = run(&graph, &chain_config(0)).unwrap();

        assert_eq!(outcome.split.train.len(), 2);
        assert_eq!(outcome.split.val.len(), 1);
        assert_eq!(outcome.split.test.len(), 1);
        assert!(outcome.history.is_empty());
        assert!(outcome.report.mae.is_finite());
        assert!(outcome.report.rmse.is_finite());
        // Single test row: defined fallbacks, not a crash.
        assert_eq!(outcome.report.directional_accuracy_pct, 0.0);
        assert_eq!(outcome.report.sharpe_ratio, 0.0);
    }

    #[test]
    fn test_run_is_reproducible_with_fixed_seeds() {
        let graph = chain_graph();
        let a = run(&graph, &chain_config(5)).unwrap();
        let b = run(&graph, &chain_config(5)).unwrap();

        assert_eq!(a.report.mae, b.report.mae);
        assert_eq!(a.report.rmse, b.report.rmse);
        for (x, y) in a.history.iter().zip(&b.history) {
            assert_eq!(x.train_loss, y.train_loss);
        }
    }

    #[test]
    fn test_empty_graph_aborts() {
        let graph = StockGraph::new();
        assert!(matches!(
            run(&graph, &chain_config(1)),
            Err(PipelineError::Graph(GraphError::EmptyGraph))
        ));
    }

    #[test]
    fn test_train_only_scope_runs() {
        let graph = chain_graph();
        let mut config = chain_config(2);
        config.scaler_scope = ScalerScope::TrainOnly;
        let outcome = run(&graph, &config).unwrap();
        assert!(outcome.report.mae.is_finite());
    }
}
