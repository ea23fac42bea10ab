//! Modularity of a partition and the incremental gain of a single move.
//!
//! ## Objective
//!
//! With m the total edge weight, d_i the attached weight of node i and M the
//! normalising weight:
//!
//! ```text
//! Q = (1/M) × Σ_{i≠j, c_i = c_j} [w_ij - d_i × d_j / M]
//! ```
//!
//! summed over ordered pairs. Two normalisations are offered:
//!
//! - [`Normalization::Newman`] (default): M = 2m, and the diagonal null-model
//!   term `-d_i²/M` is kept, which is exactly Newman's Q.
//! - [`Normalization::TotalWeight`]: M = m, diagonal excluded. Its null-model
//!   penalty is twice Newman's relative to the edge term, so it merges far
//!   less eagerly: a unit-weight 4-clique stays as four singletons.
//!
//! Grouping the sum per community `C` gives an O(V + E) evaluation:
//!
//! ```text
//! Newman:       Q = (1/M) × Σ_C [2 × in_C - tot_C² / M]
//! TotalWeight:  Q = (1/M) × Σ_C [2 × in_C - (tot_C² - Σ_{i∈C} d_i²) / M]
//! ```
//!
//! ## Move gain
//!
//! For community `C` (without the node), let a = 2 × in_C (ordered pairs),
//! b = weight from the node to `C`, c = tot_C, d = the node's attached
//! weight. Inserting the node changes Q by
//!
//! ```text
//! [(a + 2b)/M - ((c + d)/M)²] - [a/M - (c/M)² - (d/M)²]  =  2b/M - 2cd/M²
//! ```
//!
//! under either normalisation (the diagonal term does not depend on the
//! partition). Leaving the current community costs the same expression
//! evaluated on the community it leaves, with the node taken out. A move's
//! gain is insertion into the target minus that departure cost; for a
//! singleton node the departure cost is zero. With M = 2m this is the
//! familiar `k_in/m - tot × k/(2m²)` of Blondel et al.

use super::partition::{CommunityId, Partition};
use crate::error::{Error, Result};
use crate::graph::WeightedGraph;
use std::collections::HashMap;

/// Which weight normalises the modularity sum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Normalization {
    /// M = 2m with the diagonal term: Newman's Q.
    #[default]
    Newman,
    /// M = m over pairs `i != j` only.
    TotalWeight,
}

impl Normalization {
    /// M for a graph of total edge weight `m`.
    pub fn scale(self, total_weight: u64) -> f64 {
        match self {
            Normalization::Newman => 2.0 * total_weight as f64,
            Normalization::TotalWeight => total_weight as f64,
        }
    }
}

/// Evaluates modularity and move gains against a fixed graph.
#[derive(Debug)]
pub struct ModularityScorer<'g, N> {
    graph: &'g WeightedGraph<N>,
    normalization: Normalization,
    scale: f64,
}

impl<N> Clone for ModularityScorer<'_, N> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<N> Copy for ModularityScorer<'_, N> {}

/// Weights linking one node to the communities around it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NeighborLinks {
    /// Weight from the node to the rest of its own community.
    pub own: u64,
    /// Weight to every other adjacent community, in order of first
    /// appearance in the node's adjacency.
    pub others: Vec<(CommunityId, u64)>,
}

impl<'g, N> ModularityScorer<'g, N> {
    /// Score partitions of `graph` with Newman's normalisation.
    pub fn new(graph: &'g WeightedGraph<N>) -> Self {
        Self::with_normalization(graph, Normalization::Newman)
    }

    /// Score partitions of `graph` with the given normalisation.
    pub fn with_normalization(graph: &'g WeightedGraph<N>, normalization: Normalization) -> Self {
        Self {
            graph,
            normalization,
            scale: normalization.scale(graph.total_weight()),
        }
    }

    /// Normalisation in use.
    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    /// Global modularity Q of `partition`. Zero when the graph has no edges.
    ///
    /// `partition` must have been built for the scorer's graph.
    pub fn global_modularity(&self, partition: &Partition) -> f64 {
        let scale = self.scale;
        if scale == 0.0 {
            return 0.0;
        }

        // Σ d_i² per community; only the pairwise form drops the diagonal.
        let mut diagonal = vec![0.0f64; partition.community_count()];
        if self.normalization == Normalization::TotalWeight {
            for (node, &c) in partition.assignment().iter().enumerate() {
                let d = self.graph.attached_weight(node) as f64;
                diagonal[c] += d * d;
            }
        }

        let q: f64 = (0..partition.community_count())
            .filter(|&c| !partition.members(c).is_empty())
            .map(|c| {
                let internal = partition.internal_weight(c) as f64;
                let tot = partition.total_weight(c) as f64;
                2.0 * internal - (tot * tot - diagonal[c]) / scale
            })
            .sum();

        q / scale
    }

    /// Gain in Q from moving `node` into `target`.
    ///
    /// Costs O(degree(node)); zero if `target` is the node's community.
    ///
    /// This is not the bare Blondel bracket
    /// `[(a+b)/m - ((c+d)/m)²] - [a/m - (c/m)² - (d/m)²]` with `a` the
    /// target's internal weight counted once. Two terms differ: `a` counts
    /// ordered pairs, so the link weight enters doubled (`a + 2b`), and the
    /// same bracket for the node's current community (node taken out) is
    /// subtracted as a departure cost. For a singleton the departure cost is
    /// zero. With both corrections the result equals
    /// `global_modularity(after) - global_modularity(before)` under either
    /// normalisation, including [`Normalization::TotalWeight`].
    ///
    /// Fails with [`Error::InconsistentPartition`] if `partition` was built
    /// for a graph of a different size.
    pub fn move_gain(
        &self,
        partition: &Partition,
        node: usize,
        target: CommunityId,
    ) -> Result<f64> {
        partition.check_covers(self.graph)?;
        if node >= partition.node_count() {
            return Err(Error::UnknownNode(format!("index {node}")));
        }
        if target >= partition.community_count() {
            return Err(Error::UnknownCommunity(target));
        }
        if partition.community_of(node) == target {
            return Ok(0.0);
        }

        let links = self.neighbor_links(partition, node);
        let to_target = links
            .others
            .iter()
            .find(|&&(c, _)| c == target)
            .map_or(0, |&(_, w)| w);
        Ok(self.gain_with_links(partition, node, links.own, target, to_target))
    }

    /// Sum the node's edge weights per adjacent community.
    ///
    /// # Panics
    ///
    /// If `node` or one of its neighbours is outside `partition`.
    pub fn neighbor_links(&self, partition: &Partition, node: usize) -> NeighborLinks {
        let own_community = partition.community_of(node);
        let mut links = NeighborLinks::default();
        let mut slot: HashMap<CommunityId, usize> = HashMap::new();

        for &(neighbor, w) in self.graph.neighbors(node) {
            let c = partition.community_of(neighbor);
            if c == own_community {
                links.own += w;
                continue;
            }
            match slot.get(&c) {
                Some(&i) => links.others[i].1 += w,
                None => {
                    let _ = slot.insert(c, links.others.len());
                    links.others.push((c, w));
                }
            }
        }
        links
    }

    /// Move gain with the node's links precomputed.
    pub(crate) fn gain_with_links(
        &self,
        partition: &Partition,
        node: usize,
        link_own: u64,
        target: CommunityId,
        link_target: u64,
    ) -> f64 {
        let scale = self.scale;
        if scale == 0.0 {
            return 0.0;
        }
        let d = self.graph.attached_weight(node);
        let own = partition.community_of(node);

        let join = insertion_gain(
            2 * partition.internal_weight(target),
            link_target,
            partition.total_weight(target),
            d,
            scale,
        );
        let leave = insertion_gain(
            2 * (partition.internal_weight(own) - link_own),
            link_own,
            partition.total_weight(own) - d,
            d,
            scale,
        );
        join - leave
    }
}

/// Change in Q from inserting a node into a community it is not part of.
///
/// `a`: ordered-pair internal weight, `b`: node→community weight,
/// `c`: community attached weight, `d`: node attached weight.
fn insertion_gain(a: u64, b: u64, c: u64, d: u64, scale: f64) -> f64 {
    let (a, b, c, d) = (a as f64, b as f64, c as f64, d as f64);
    let after = (a + 2.0 * b) / scale - ((c + d) / scale).powi(2);
    let before = a / scale - (c / scale).powi(2) - (d / scale).powi(2);
    after - before
}

#[cfg(test)]
#[allow(clippy::unwrap_used, unused_results)]
mod tests {
    use super::*;
    use crate::graph::EdgeRecord;

    const TOL: f64 = 1e-12;

    /// Q straight from the pairwise definition.
    fn brute_force_q(
        graph: &WeightedGraph<usize>,
        partition: &Partition,
        normalization: Normalization,
    ) -> f64 {
        let scale = normalization.scale(graph.total_weight());
        if scale == 0.0 {
            return 0.0;
        }
        let n = graph.node_count();
        let mut q = 0.0;
        for i in 0..n {
            for j in 0..n {
                if i == j && normalization == Normalization::TotalWeight {
                    continue;
                }
                if partition.community_of(i) == partition.community_of(j) {
                    let w = graph.weight_between(i, j) as f64;
                    let di = graph.attached_weight(i) as f64;
                    let dj = graph.attached_weight(j) as f64;
                    q += w - di * dj / scale;
                }
            }
        }
        q / scale
    }

    /// Two triangles (0,1,2) and (3,4,5), weight 4, joined by 2--3 weight 1.
    fn two_triangles() -> WeightedGraph<usize> {
        WeightedGraph::from_records(vec![
            EdgeRecord::new(0, 1, 4),
            EdgeRecord::new(1, 2, 4),
            EdgeRecord::new(0, 2, 4),
            EdgeRecord::new(3, 4, 4),
            EdgeRecord::new(4, 5, 4),
            EdgeRecord::new(3, 5, 4),
            EdgeRecord::new(2, 3, 1),
        ])
        .unwrap()
    }

    fn triangles_partition(g: &WeightedGraph<usize>) -> Partition {
        let mut p = Partition::singletons(g);
        for (node, c) in [(1, 0), (2, 0), (4, 3), (5, 3)] {
            p.move_node(g, node, c).unwrap();
        }
        p
    }

    fn assert_gain_matches_delta(
        g: &WeightedGraph<usize>,
        p: &mut Partition,
        node: usize,
        target: CommunityId,
        normalization: Normalization,
    ) -> f64 {
        let scorer = ModularityScorer::with_normalization(g, normalization);
        let before = scorer.global_modularity(p);
        let gain = scorer.move_gain(p, node, target).unwrap();
        p.move_node(g, node, target).unwrap();
        let after = scorer.global_modularity(p);
        assert!(
            (gain - (after - before)).abs() < TOL,
            "gain={gain} delta={}",
            after - before
        );
        gain
    }

    #[test]
    fn test_newman_matches_known_value() {
        // a - b ---- d - e
        //  \  |       \  |
        //    c          f
        let g = WeightedGraph::from_records(vec![
            EdgeRecord::new(0, 1, 1),
            EdgeRecord::new(1, 2, 1),
            EdgeRecord::new(2, 0, 1),
            EdgeRecord::new(3, 1, 1),
            EdgeRecord::new(3, 4, 1),
            EdgeRecord::new(4, 5, 1),
            EdgeRecord::new(5, 3, 1),
        ])
        .unwrap();
        let mut p = Partition::singletons(&g);
        for (node, c) in [(1, 0), (2, 0), (4, 3), (5, 3)] {
            p.move_node(&g, node, c).unwrap();
        }
        let q = ModularityScorer::new(&g).global_modularity(&p);
        assert!((q - 0.357_142_857_142_857_1).abs() < TOL, "q={q}");
    }

    #[test]
    fn test_modularity_matches_pairwise_definition() {
        let g = two_triangles();
        for partition in [Partition::singletons(&g), triangles_partition(&g)] {
            for norm in [Normalization::Newman, Normalization::TotalWeight] {
                let scorer = ModularityScorer::with_normalization(&g, norm);
                let q = scorer.global_modularity(&partition);
                assert!((q - brute_force_q(&g, &partition, norm)).abs() < TOL);
            }
        }
    }

    #[test]
    fn test_single_community_newman_is_zero() {
        let g = two_triangles();
        let mut p = Partition::singletons(&g);
        for node in 1..6 {
            p.move_node(&g, node, 0).unwrap();
        }
        assert!(ModularityScorer::new(&g).global_modularity(&p).abs() < TOL);
    }

    #[test]
    fn test_total_weight_singletons_is_zero() {
        let g = two_triangles();
        let p = Partition::singletons(&g);
        // No same-community pairs with i != j.
        let scorer = ModularityScorer::with_normalization(&g, Normalization::TotalWeight);
        assert!(scorer.global_modularity(&p).abs() < TOL);
    }

    #[test]
    fn test_modularity_empty_graph() {
        let g: WeightedGraph<usize> = WeightedGraph::from_records(Vec::new()).unwrap();
        let p = Partition::singletons(&g);
        assert_eq!(ModularityScorer::new(&g).global_modularity(&p), 0.0);
    }

    #[test]
    fn test_gain_matches_measured_delta_for_bridge_node() {
        let g = two_triangles();
        for norm in [Normalization::Newman, Normalization::TotalWeight] {
            let mut p = triangles_partition(&g);
            let gain = assert_gain_matches_delta(&g, &mut p, 2, 3, norm);
            // Pulling the bridge node away from its triangle must hurt.
            assert!(gain < 0.0);
        }
    }

    #[test]
    fn test_gain_matches_measured_delta_from_singleton() {
        let g = two_triangles();
        for norm in [Normalization::Newman, Normalization::TotalWeight] {
            let mut p = Partition::singletons(&g);
            p.move_node(&g, 1, 0).unwrap();
            let gain = assert_gain_matches_delta(&g, &mut p, 2, 0, norm);
            assert!(gain > 0.0);
        }
    }

    #[test]
    fn test_gain_to_non_adjacent_community() {
        let g = two_triangles();
        let mut p = triangles_partition(&g);
        let _ = assert_gain_matches_delta(&g, &mut p, 0, 3, Normalization::Newman);
    }

    #[test]
    fn test_singleton_gain_is_bracketed_insertion_term() {
        let g = two_triangles();
        let mut p = Partition::singletons(&g);
        p.move_node(&g, 1, 0).unwrap();
        let scorer = ModularityScorer::with_normalization(&g, Normalization::TotalWeight);

        // Node 2 is a singleton: a = 2 * 4, b = 8, c = 8 + 8, d = 9, m = 25.
        let m: f64 = 25.0;
        let (a, b, c, d): (f64, f64, f64, f64) = (8.0, 8.0, 16.0, 9.0);
        let expected = ((a + 2.0 * b) / m - ((c + d) / m).powi(2))
            - (a / m - (c / m).powi(2) - (d / m).powi(2));
        let gain = scorer.move_gain(&p, 2, 0).unwrap();
        assert!((gain - expected).abs() < TOL);
    }

    #[test]
    fn test_newman_gain_is_blondel_formula() {
        let g = two_triangles();
        let mut p = Partition::singletons(&g);
        p.move_node(&g, 1, 0).unwrap();

        // k_in / m - tot * k / (2m²)
        let (m, k_in, tot, k): (f64, f64, f64, f64) = (25.0, 8.0, 16.0, 9.0);
        let expected = k_in / m - tot * k / (2.0 * m * m);
        let gain = ModularityScorer::new(&g).move_gain(&p, 2, 0).unwrap();
        assert!((gain - expected).abs() < TOL);
    }

    #[test]
    fn test_gain_to_own_community_is_zero() {
        let g = two_triangles();
        let p = triangles_partition(&g);
        assert_eq!(ModularityScorer::new(&g).move_gain(&p, 1, 0).unwrap(), 0.0);
    }

    #[test]
    fn test_gain_rejects_unknown_ids() {
        let g = two_triangles();
        let p = Partition::singletons(&g);
        let scorer = ModularityScorer::new(&g);
        assert!(matches!(scorer.move_gain(&p, 42, 0), Err(Error::UnknownNode(_))));
        assert_eq!(scorer.move_gain(&p, 0, 42), Err(Error::UnknownCommunity(42)));
    }

    #[test]
    fn test_gain_rejects_partition_of_other_graph() {
        let g = two_triangles();
        let pair = WeightedGraph::from_records(vec![EdgeRecord::new(0, 1, 3)]).unwrap();

        let p = Partition::singletons(&g);
        let scorer = ModularityScorer::new(&pair);
        assert!(matches!(
            scorer.move_gain(&p, 5, 4),
            Err(Error::InconsistentPartition(_))
        ));

        let q = Partition::singletons(&pair);
        let scorer = ModularityScorer::new(&g);
        assert!(matches!(
            scorer.move_gain(&q, 0, 1),
            Err(Error::InconsistentPartition(_))
        ));
    }

    #[test]
    fn test_neighbor_links_groups_by_community() {
        let g = two_triangles();
        let p = triangles_partition(&g);
        let links = ModularityScorer::new(&g).neighbor_links(&p, 2);
        assert_eq!(links.own, 8);
        assert_eq!(links.others, vec![(3, 1)]);
    }
}
