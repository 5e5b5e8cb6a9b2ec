//! # Graph-Based Stock Return Forecasting
//!
//! This library evaluates whether price, sentiment and graph signals
//! predict stock returns, using a graph convolutional regressor over a
//! cross-ticker relationship graph.
//!
//! ## Pipeline
//!
//! - Encode a [`graph::StockGraph`] into a dense tensor snapshot
//! - Standardize features and labels with [`data::StandardScaler`]
//! - Partition nodes into train/validation/test with [`data::DataSplit`]
//! - Train a [`model::Gcn`] with the fixed-epoch [`training::Trainer`]
//! - Score the held-out nodes into an [`evaluation::ForecastReport`]
//!
//! ## Example
//!
//! ```rust
//! use stock_gnn::graph::StockGraph;
//! use stock_gnn::pipeline::{self, PipelineConfig};
//! use std::collections::HashMap;
//!
//! let mut graph = StockGraph::new();
//! for (symbol, ret) in [("AAPL", 0.012), ("MSFT", -0.004), ("GOOG", 0.007)] {
//!     let mut attributes = HashMap::new();
//!     attributes.insert("daily_return".to_string(), ret);
//!     attributes.insert("momentum".to_string(), ret * 2.0);
//!     graph.add_node(symbol, attributes);
//! }
//! graph.add_edge("AAPL", "MSFT");
//! graph.add_edge("MSFT", "GOOG");
//!
//! let mut config = PipelineConfig::default();
//! config.model.seed = Some(42);
//! config.training.epochs = 10;
//! config.split.train_ratio = 0.5;
//! config.split.val_ratio = 0.25;
//!
//! let outcome = pipeline::run(&graph, &config).unwrap();
//! println!("{}", outcome.report);
//! ```

pub mod data;
pub mod evaluation;
pub mod graph;
pub mod model;
pub mod pipeline;
pub mod training;

pub use data::{DataSplit, ScalerScope, StandardScaler};
pub use evaluation::{EvalError, ForecastReport};
pub use graph::{EncodedGraph, GraphError, StockGraph};
pub use model::{Gcn, GcnConfig, ModelError};
pub use pipeline::{PipelineConfig, PipelineError, PipelineOutcome};
pub use training::{EpochMetrics, TrainConfig, TrainError, Trainer};
