//! Stock relationship graph and its dense tensor encoding.
//!
//! A [`StockGraph`] is the relational view: named ticker nodes carrying
//! numeric attributes, plus directed edges between tickers. Before any
//! model sees it, the graph is projected once into an [`EncodedGraph`]
//! with a stable node-to-row mapping that every downstream structure
//! (features, labels, edges, splits) shares.

mod encoded;

pub use encoded::EncodedGraph;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Node attributes projected into feature columns, in column order.
pub const FEATURE_ATTRIBUTES: [&str; 5] = [
    "volume_weighted_sentiment",
    "daily_return",
    "rolling_avg",
    "volatility",
    "momentum",
];

/// Node attribute used as the regression target.
pub const LABEL_ATTRIBUTE: &str = "daily_return";

/// Errors raised while loading or encoding a stock graph.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("graph has no nodes")]
    EmptyGraph,

    #[error("edge references unknown node '{symbol}'")]
    UnknownNode { symbol: String },
}

/// A ticker node with its numeric attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockNode {
    /// Ticker symbol (e.g., "AAPL")
    pub symbol: String,
    /// Attribute name to value mapping
    #[serde(default)]
    pub attributes: HashMap<String, f64>,
}

/// A directed relation between two tickers, stored by symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockEdge {
    /// Source ticker symbol
    pub source: String,
    /// Target ticker symbol
    pub target: String,
}

/// A relationship graph over tickers.
///
/// Node insertion order is the canonical enumeration order: encoding
/// assigns row indices by iterating `nodes` front to back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StockGraph {
    /// Nodes in insertion order
    pub nodes: Vec<StockNode>,
    /// Directed edges by symbol pair
    pub edges: Vec<StockEdge>,
}

impl StockGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with the given symbol and attributes.
    pub fn add_node(
        &mut self,
        symbol: impl Into<String>,
        attributes: HashMap<String, f64>,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(StockNode {
            symbol: symbol.into(),
            attributes,
        });
        id
    }

    /// Add a directed edge between two symbols.
    ///
    /// Endpoints are not validated here; encoding fails if either
    /// symbol never becomes a node.
    pub fn add_edge(&mut self, source: impl Into<String>, target: impl Into<String>) {
        self.edges.push(StockEdge {
            source: source.into(),
            target: target.into(),
        });
    }

    /// Get the number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get the number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Project the graph into its dense tensor encoding.
    ///
    /// Rows follow node insertion order. Each row holds the five
    /// [`FEATURE_ATTRIBUTES`], with absent attributes defaulting to 0.0;
    /// the label is [`LABEL_ATTRIBUTE`]. Edges are translated into
    /// (source-row, target-row) pairs in the same index space.
    pub fn encode(&self) -> Result<EncodedGraph, GraphError> {
        if self.nodes.is_empty() {
            return Err(GraphError::EmptyGraph);
        }

        let n = self.nodes.len();
        let d = FEATURE_ATTRIBUTES.len();

        let mapping: HashMap<&str, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.symbol.as_str(), i))
            .collect();

        let mut features = Array2::zeros((n, d));
        let mut labels = Array1::zeros(n);
        let mut symbols = Vec::with_capacity(n);

        for (i, node) in self.nodes.iter().enumerate() {
            for (j, name) in FEATURE_ATTRIBUTES.iter().enumerate() {
                features[[i, j]] = node.attributes.get(*name).copied().unwrap_or(0.0);
            }
            labels[i] = node.attributes.get(LABEL_ATTRIBUTE).copied().unwrap_or(0.0);
            symbols.push(node.symbol.clone());
        }

        let mut edge_index = Vec::with_capacity(self.edges.len());
        for edge in &self.edges {
            let source = *mapping
                .get(edge.source.as_str())
                .ok_or_else(|| GraphError::UnknownNode {
                    symbol: edge.source.clone(),
                })?;
            let target = *mapping
                .get(edge.target.as_str())
                .ok_or_else(|| GraphError::UnknownNode {
                    symbol: edge.target.clone(),
                })?;
            edge_index.push((source, target));
        }

        Ok(EncodedGraph {
            symbols,
            features,
            labels,
            edge_index,
        })
    }
}
