//! CLI driver for the graph-based return forecasting pipeline.

use anyhow::{Context, Result};
use clap::Parser;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tracing::info;

use stock_gnn::graph::StockGraph;
use stock_gnn::pipeline::{self, PipelineConfig};
use stock_gnn::ScalerScope;

#[derive(Parser)]
#[command(name = "stock-gnn")]
#[command(about = "GCN-based stock return forecasting over a relationship graph")]
struct Cli {
    /// Path to a JSON stock graph (a built-in demo graph is used when omitted)
    #[arg(short, long)]
    graph: Option<PathBuf>,

    /// Number of training epochs
    #[arg(short, long, default_value = "100")]
    epochs: usize,

    /// Hidden layer width
    #[arg(long, default_value = "32")]
    hidden_dim: usize,

    /// Learning rate
    #[arg(long, default_value = "0.01")]
    lr: f64,

    /// Dropout probability
    #[arg(long, default_value = "0.6")]
    dropout: f64,

    /// Fraction of nodes used for training
    #[arg(long, default_value = "0.7")]
    train_ratio: f64,

    /// Fraction of nodes used for validation
    #[arg(long, default_value = "0.15")]
    val_ratio: f64,

    /// Random seed for splitting, weight init and dropout
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Restrict normalization statistics to the train split
    #[arg(long)]
    train_only_stats: bool,

    /// Optional path to write the metric report as JSON
    #[arg(short, long)]
    report: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let graph = match &cli.graph {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open graph file {}", path.display()))?;
            let graph: StockGraph = serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("failed to parse graph file {}", path.display()))?;
            info!(
                path = %path.display(),
                nodes = graph.node_count(),
                edges = graph.edge_count(),
                "graph loaded"
            );
            graph
        }
        None => {
            info!("no graph file given, using built-in demo graph");
            demo_graph()
        }
    };

    let mut config = PipelineConfig::default();
    config.model.hidden_dim = cli.hidden_dim;
    config.model.dropout = cli.dropout;
    config.model.seed = Some(cli.seed);
    config.training.epochs = cli.epochs;
    config.training.learning_rate = cli.lr;
    config.split.train_ratio = cli.train_ratio;
    config.split.val_ratio = cli.val_ratio;
    config.split.seed = cli.seed;
    config.scaler_scope = if cli.train_only_stats {
        ScalerScope::TrainOnly
    } else {
        ScalerScope::AllNodes
    };

    let outcome = pipeline::run(&graph, &config)?;

    println!("{}", outcome.report);

    if let Some(path) = &cli.report {
        let file = File::create(path)
            .with_context(|| format!("failed to create report file {}", path.display()))?;
        serde_json::to_writer_pretty(file, &outcome.report)?;
        info!(path = %path.display(), "report written");
    }

    Ok(())
}

/// A small synthetic ticker graph for running the pipeline without an
/// input file.
fn demo_graph() -> StockGraph {
    let tickers: [(&str, f64, f64); 10] = [
        ("AAPL", 0.012, 0.4),
        ("MSFT", 0.008, 0.3),
        ("GOOG", -0.004, -0.1),
        ("AMZN", 0.015, 0.5),
        ("META", -0.009, -0.3),
        ("NVDA", 0.021, 0.7),
        ("TSLA", -0.013, -0.4),
        ("AMD", 0.017, 0.6),
        ("INTC", -0.006, -0.2),
        ("CRM", 0.005, 0.2),
    ];

    let mut graph = StockGraph::new();
    for (symbol, daily_return, sentiment) in tickers {
        let mut attributes = HashMap::new();
        attributes.insert("volume_weighted_sentiment".to_string(), sentiment);
        attributes.insert("daily_return".to_string(), daily_return);
        attributes.insert("rolling_avg".to_string(), daily_return * 0.8);
        attributes.insert("volatility".to_string(), daily_return.abs() * 2.0);
        attributes.insert("momentum".to_string(), daily_return * 3.0);
        graph.add_node(symbol, attributes);
    }

    // Sector-style relations among the demo tickers.
    let edges = [
        ("AAPL", "MSFT"),
        ("MSFT", "GOOG"),
        ("GOOG", "META"),
        ("AMZN", "GOOG"),
        ("NVDA", "AMD"),
        ("AMD", "INTC"),
        ("AAPL", "NVDA"),
        ("MSFT", "CRM"),
        ("TSLA", "NVDA"),
        ("AMZN", "MSFT"),
    ];
    for (source, target) in edges {
        graph.add_edge(source, target);
    }

    graph
}
