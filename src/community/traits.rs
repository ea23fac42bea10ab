//! Community detection traits.

use crate::error::Result;
use petgraph::graph::UnGraph;

/// Trait for community detection over petgraph graphs.
pub trait CommunityDetection {
    /// Detect communities in a graph whose edge weights are integer counts.
    ///
    /// Returns a mapping from node index to community ID, with IDs
    /// renumbered to `0..k`.
    fn detect<N, E>(&self, graph: &UnGraph<N, E>) -> Result<Vec<usize>>
    where
        E: Copy + Into<u64>;
}
