//! Group counties by migration flows.
//!
//! Run with `RUST_LOG=unfolding=info cargo run --example county_flows` to see
//! per-pass progress.

use tracing_subscriber::EnvFilter;
use unfolding::{Louvain, ModularityScorer, Normalization, RawEdgeRecord, WeightedGraph};

/// (origin FIPS, destination FIPS, movers) as read from a flow table.
const FLOWS: &[(&str, &str, &str)] = &[
    // Bay Area
    ("06001", "06013", "4120"),
    ("06013", "06001", "3875"),
    ("06075", "06001", "5310"),
    ("06001", "06075", "2980"),
    ("06081", "06075", "3340"),
    ("06085", "06081", "2715"),
    ("06085", "06001", "1960"),
    // Houston
    ("48201", "48157", "6250"),
    ("48157", "48201", "4410"),
    ("48339", "48201", "5120"),
    ("48201", "48039", "2870"),
    ("48167", "48201", "2290"),
    ("48039", "48157", "1110"),
    // New York
    ("36061", "36047", "7030"),
    ("36047", "36081", "6480"),
    ("36081", "36061", "5990"),
    ("36005", "36061", "4060"),
    ("36085", "36047", "2150"),
    ("36081", "36059", "3820"),
    // Long-distance moves
    ("06075", "36061", "610"),
    ("36061", "06075", "540"),
    ("48201", "06001", "180"),
    ("36047", "48201", "95"),
    // Non-movers, ignored for community structure
    ("48201", "48201", "310000"),
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let records = FLOWS
        .iter()
        .map(|&(origin, dest, movers)| RawEdgeRecord::new(Some(origin), Some(dest), Some(movers)));
    let graph = WeightedGraph::try_from_raw(records)?;
    println!(
        "{} counties, {} county pairs, {} movers",
        graph.node_count(),
        graph.edge_count(),
        graph.total_weight()
    );

    let louvain = Louvain::new().with_seed(42).with_max_passes(50);
    let run = louvain.run_with_progress(&graph, |p| {
        println!(
            "pass {:>2}: {:>3} moved, {:>3} communities",
            p.pass, p.moved, p.non_empty
        );
    })?;

    let report = run.report();
    println!(
        "stopped after {} passes ({:?}), Q = {:.4}",
        report.passes(),
        report.stop_reason,
        run.modularity()
    );

    let view = run.view();
    for (community, members) in view.communities_by_size() {
        println!("community {community:>3} ({} counties): {}", members.len(), members.join(" "));
    }

    let literal = ModularityScorer::with_normalization(&graph, Normalization::TotalWeight);
    println!(
        "Q over i != j with m as normaliser: {:.4}",
        literal.global_modularity(run.partition())
    );

    Ok(())
}
