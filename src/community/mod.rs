//! Community detection by greedy local moving.
//!
//! Given a weighted graph, find groupings where nodes within groups are
//! densely connected, and connections between groups are sparse.
//!
//! ## The Modularity Objective
//!
//! Local moving optimizes **modularity** Q, which compares the actual edge
//! weight within communities to the weight expected in a random graph with
//! the same weighted degrees:
//!
//! ```text
//! Q = (1/2m) × Σ[w_ij - (d_i × d_j)/(2m)] × δ(c_i, c_j)
//! ```
//!
//! Where:
//! - m = total edge weight (each undirected edge once)
//! - w_ij = edge weight between i and j
//! - d_i = attached (weighted) degree of node i
//! - δ(c_i, c_j) = 1 if i and j are in same community
//!
//! **Intuition**: For each pair in the same community, we add (actual weight) -
//! (expected weight). A good partition has Q > 0.
//!
//! [`Normalization::TotalWeight`] swaps 2m for m in both places and drops the
//! `i = j` terms; see [`ModularityScorer`] for the consequences.
//!
//! ## Pieces
//!
//! | Type | Role |
//! |------|------|
//! | [`Partition`] | node→community and community→members, with cached weights |
//! | [`ModularityScorer`] | Q of a partition, O(degree) gain of one move |
//! | [`LocalMoving`] | one randomized pass of best-gain moves |
//! | [`Louvain`] / [`Unfolding`] | passes until nothing moves |
//! | [`PartitionView`] | reporting in the caller's node ids |
//!
//! ## Usage
//!
//! ```rust
//! use unfolding::{EdgeRecord, Louvain, WeightedGraph};
//!
//! let graph = WeightedGraph::from_records(vec![
//!     EdgeRecord::new("a", "b", 3),
//!     EdgeRecord::new("b", "a", 2),
//!     EdgeRecord::new("b", "c", 4),
//!     EdgeRecord::new("a", "c", 5),
//! ])
//! .unwrap();
//!
//! let run = Louvain::new().with_seed(7).run(&graph).unwrap();
//! assert!(run.report().converged());
//! assert_eq!(run.view().non_empty_count(), 1);
//! ```
//!
//! ## References
//!
//! - Blondel et al. (2008). "Fast unfolding of communities in large networks."
//! - Newman & Girvan (2004). "Finding and evaluating community structure in networks."

mod local_moving;
mod louvain;
mod modularity;
mod partition;

#[cfg(feature = "petgraph")]
mod traits;

pub use local_moving::{LocalMoving, PassOutcome, DEFAULT_EPSILON};
pub use louvain::{Louvain, PassProgress, StopReason, Unfolding, UnfoldingReport};
pub use modularity::{ModularityScorer, NeighborLinks, Normalization};
pub use partition::{CommunityId, Partition, PartitionView};

#[cfg(feature = "petgraph")]
pub use traits::CommunityDetection;
