//! # unfolding
//!
//! Fast unfolding of communities: greedy single-level modularity optimisation
//! for weighted graphs.
//!
//! Directed flow records (`source -> target`, integer count) are folded into
//! a [`WeightedGraph`]; [`Louvain`] then repeatedly moves single nodes to the
//! neighbouring community with the best modularity gain until no move helps,
//! and reports the resulting partition.
//!
//! **Default build** includes the petgraph bridge ([`CommunityDetection`]);
//! disable the `petgraph` feature for the record-based API alone.

pub mod community;
/// Error types used across `unfolding`.
pub mod error;
pub mod graph;


pub use community::{
    CommunityId, LocalMoving, Louvain, ModularityScorer, Normalization, Partition, PartitionView,
    PassOutcome, PassProgress, StopReason, Unfolding, UnfoldingReport,
};
pub use error::{Error, Result};
pub use graph::{EdgeRecord, GraphBuilder, RawEdgeRecord, WeightedGraph, MAX_TOTAL_WEIGHT};

#[cfg(feature = "petgraph")]
pub use community::CommunityDetection;
