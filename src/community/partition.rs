//! Community assignment with cached per-community aggregates.
//!
//! [`Partition`] is the index-level state mutated by local moving;
//! [`PartitionView`] maps it back to the caller's node ids for reporting.
//!
//! For every community `C` the partition caches
//!
//! - `total(C)`: Σ attached weight of members (Σ_tot)
//! - `internal(C)`: Σ weight of undirected edges with both ends in `C`
//!
//! Both are updated on every move from the moving node's links, so a move
//! costs O(degree) instead of a rescan of the community.

use crate::error::{Error, Result};
use crate::graph::WeightedGraph;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::Hash;

/// Community identifier. Initial ids equal node creation indices.
pub type CommunityId = usize;

/// Node→community assignment and its inverse.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// Community of each node.
    assignment: Vec<CommunityId>,
    /// Members of each community (possibly empty, never removed).
    members: Vec<BTreeSet<usize>>,
    /// Σ attached weight of each community's members.
    total: Vec<u64>,
    /// Σ internal undirected edge weight of each community.
    internal: Vec<u64>,
}

impl Partition {
    /// Every node in its own community.
    pub fn singletons<N>(graph: &WeightedGraph<N>) -> Self {
        let n = graph.node_count();
        Self {
            assignment: (0..n).collect(),
            members: (0..n).map(|i| BTreeSet::from([i])).collect(),
            total: (0..n).map(|i| graph.attached_weight(i)).collect(),
            internal: vec![0; n],
        }
    }

    /// Number of nodes covered.
    pub fn node_count(&self) -> usize {
        self.assignment.len()
    }

    /// Number of community slots, empty ones included.
    pub fn community_count(&self) -> usize {
        self.members.len()
    }

    /// Community of node `idx`.
    pub fn community_of(&self, idx: usize) -> CommunityId {
        self.assignment[idx]
    }

    /// Community of every node, by creation index.
    pub fn assignment(&self) -> &[CommunityId] {
        &self.assignment
    }

    /// Members of `community`.
    pub fn members(&self, community: CommunityId) -> &BTreeSet<usize> {
        &self.members[community]
    }

    /// Σ attached weight of `community`'s members.
    pub fn total_weight(&self, community: CommunityId) -> u64 {
        self.total[community]
    }

    /// Σ weight of edges inside `community`, each edge once.
    pub fn internal_weight(&self, community: CommunityId) -> u64 {
        self.internal[community]
    }

    /// Communities with at least one member.
    pub fn non_empty_count(&self) -> usize {
        self.members.iter().filter(|m| !m.is_empty()).count()
    }

    /// Non-empty communities ascending by size, ties by id.
    pub fn communities_by_size(&self) -> Vec<(CommunityId, &BTreeSet<usize>)> {
        let mut out: Vec<(CommunityId, &BTreeSet<usize>)> = self
            .members
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.is_empty())
            .collect();
        out.sort_by_key(|&(id, m)| (m.len(), id));
        out
    }

    /// Labels renumbered to `0..non_empty_count()`, in ascending id order.
    pub fn labels(&self) -> Vec<usize> {
        let mut next = 0;
        let mut relabel = vec![usize::MAX; self.members.len()];
        for (id, m) in self.members.iter().enumerate() {
            if !m.is_empty() {
                relabel[id] = next;
                next += 1;
            }
        }
        self.assignment.iter().map(|&c| relabel[c]).collect()
    }

    /// Move node `idx` to `to`, keeping every cached aggregate in step.
    ///
    /// Returns `false` if the node is already there. Fails with
    /// [`Error::InconsistentPartition`] if `graph` is not the graph this
    /// partition was built for (different node count).
    pub fn move_node<N>(
        &mut self,
        graph: &WeightedGraph<N>,
        idx: usize,
        to: CommunityId,
    ) -> Result<bool> {
        self.check_covers(graph)?;
        if idx >= self.assignment.len() {
            return Err(Error::UnknownNode(format!("index {idx}")));
        }
        if to >= self.members.len() {
            return Err(Error::UnknownCommunity(to));
        }
        let from = self.assignment[idx];
        if from == to {
            return Ok(false);
        }

        let mut link_from = 0;
        let mut link_to = 0;
        for &(neighbor, w) in graph.neighbors(idx) {
            let c = self.assignment[neighbor];
            if c == from {
                link_from += w;
            } else if c == to {
                link_to += w;
            }
        }
        self.apply_move(graph.attached_weight(idx), idx, to, link_from, link_to);
        Ok(true)
    }

    pub(crate) fn check_covers<N>(&self, graph: &WeightedGraph<N>) -> Result<()> {
        if self.assignment.len() == graph.node_count() {
            Ok(())
        } else {
            Err(Error::InconsistentPartition(format!(
                "partition covers {} nodes, graph has {}",
                self.assignment.len(),
                graph.node_count()
            )))
        }
    }

    /// Move with the node's links to its old and new community precomputed.
    pub(crate) fn apply_move(
        &mut self,
        degree: u64,
        idx: usize,
        to: CommunityId,
        link_from: u64,
        link_to: u64,
    ) {
        let from = self.assignment[idx];
        debug_assert_ne!(from, to);

        self.internal[from] -= link_from;
        self.internal[to] += link_to;
        self.total[from] -= degree;
        self.total[to] += degree;

        let _ = self.members[from].remove(&idx);
        let _ = self.members[to].insert(idx);
        self.assignment[idx] = to;
    }

    /// Recompute every invariant from scratch and compare with the caches.
    ///
    /// - `assignment` and `members` are mutual inverses
    /// - every node sits in exactly one community
    /// - `total` and `internal` match a rescan of the graph
    pub fn check_consistency<N>(&self, graph: &WeightedGraph<N>) -> Result<()> {
        let n = graph.node_count();
        if self.assignment.len() != n {
            return Err(Error::InconsistentPartition(format!(
                "assignment covers {} nodes, graph has {n}",
                self.assignment.len()
            )));
        }

        let mut seen = vec![false; n];
        for (c, members) in self.members.iter().enumerate() {
            for &node in members {
                if node >= n || self.assignment[node] != c {
                    return Err(Error::InconsistentPartition(format!(
                        "node {node} listed in community {c} but assigned elsewhere"
                    )));
                }
                if std::mem::replace(&mut seen[node], true) {
                    return Err(Error::InconsistentPartition(format!(
                        "node {node} listed twice"
                    )));
                }
            }
        }
        if let Some(node) = seen.iter().position(|s| !s) {
            return Err(Error::InconsistentPartition(format!(
                "node {node} is in no community"
            )));
        }

        let mut total = vec![0u64; self.members.len()];
        let mut internal = vec![0u64; self.members.len()];
        for u in 0..n {
            let c = self.assignment[u];
            total[c] += graph.attached_weight(u);
            for &(v, w) in graph.neighbors(u) {
                if u < v && self.assignment[v] == c {
                    internal[c] += w;
                }
            }
        }
        if total != self.total {
            return Err(Error::InconsistentPartition(
                "cached community totals drifted".to_string(),
            ));
        }
        if internal != self.internal {
            return Err(Error::InconsistentPartition(
                "cached internal weights drifted".to_string(),
            ));
        }
        Ok(())
    }
}

/// Read-only view of a [`Partition`] in terms of the caller's node ids.
#[derive(Debug, Clone)]
pub struct PartitionView<'a, N> {
    graph: &'a WeightedGraph<N>,
    partition: &'a Partition,
}

impl<'a, N: Clone + Eq + Hash> PartitionView<'a, N> {
    /// Wrap a graph and a partition over it.
    pub fn new(graph: &'a WeightedGraph<N>, partition: &'a Partition) -> Self {
        Self { graph, partition }
    }

    /// The underlying index-level partition.
    pub fn partition(&self) -> &'a Partition {
        self.partition
    }

    /// Community of `node`, if it is in the graph.
    pub fn community_of(&self, node: &N) -> Option<CommunityId> {
        self.graph
            .index_of(node)
            .map(|idx| self.partition.community_of(idx))
    }

    /// Node id → community id, every node present once.
    pub fn node_community(&self) -> HashMap<N, CommunityId> {
        self.graph
            .nodes()
            .iter()
            .cloned()
            .zip(self.partition.assignment().iter().copied())
            .collect()
    }

    /// Community id → member ids in creation order, non-empty communities only.
    pub fn community_members(&self) -> BTreeMap<CommunityId, Vec<N>> {
        self.partition
            .members
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.is_empty())
            .map(|(c, m)| (c, self.ids(m)))
            .collect()
    }

    /// Non-empty communities ascending by member count, ties by id.
    pub fn communities_by_size(&self) -> Vec<(CommunityId, Vec<N>)> {
        self.partition
            .communities_by_size()
            .into_iter()
            .map(|(c, m)| (c, self.ids(m)))
            .collect()
    }

    /// Communities with at least one member.
    pub fn non_empty_count(&self) -> usize {
        self.partition.non_empty_count()
    }

    fn ids(&self, members: &BTreeSet<usize>) -> Vec<N> {
        members.iter().map(|&i| self.graph.node(i).clone()).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, unused_results)]
mod tests {
    use super::*;
    use crate::graph::EdgeRecord;

    /// Path a - b - c - d with weights 1, 2, 3.
    fn path() -> WeightedGraph<&'static str> {
        WeightedGraph::from_records(vec![
            EdgeRecord::new("a", "b", 1),
            EdgeRecord::new("b", "c", 2),
            EdgeRecord::new("c", "d", 3),
        ])
        .unwrap()
    }

    #[test]
    fn test_singletons() {
        let g = path();
        let p = Partition::singletons(&g);
        assert_eq!(p.non_empty_count(), 4);
        assert_eq!(p.community_count(), 4);
        for i in 0..4 {
            assert_eq!(p.community_of(i), i);
            assert_eq!(p.total_weight(i), g.attached_weight(i));
            assert_eq!(p.internal_weight(i), 0);
        }
        p.check_consistency(&g).unwrap();
    }

    #[test]
    fn test_move_updates_aggregates() -> Result<()> {
        let g = path();
        let mut p = Partition::singletons(&g);

        assert!(p.move_node(&g, 1, 2)?);
        assert_eq!(p.internal_weight(2), 2);
        assert_eq!(p.total_weight(2), 3 + 5);
        assert_eq!(p.total_weight(1), 0);
        assert!(p.members(1).is_empty());
        assert_eq!(p.non_empty_count(), 3);

        assert!(p.move_node(&g, 3, 2)?);
        assert_eq!(p.internal_weight(2), 5);
        p.check_consistency(&g)?;

        // Moving back out drops the internal weight again.
        assert!(p.move_node(&g, 2, 1)?);
        assert_eq!(p.internal_weight(2), 0);
        assert_eq!(p.internal_weight(1), 0);
        assert_eq!(p.total_weight(1), 5);
        p.check_consistency(&g)?;
        Ok(())
    }

    #[test]
    fn test_move_to_same_community_is_noop() -> Result<()> {
        let g = path();
        let mut p = Partition::singletons(&g);
        assert!(!p.move_node(&g, 0, 0)?);
        assert_eq!(p, Partition::singletons(&g));
        Ok(())
    }

    #[test]
    fn test_move_rejects_unknown_ids() {
        let g = path();
        let mut p = Partition::singletons(&g);
        assert!(matches!(p.move_node(&g, 9, 0), Err(Error::UnknownNode(_))));
        assert_eq!(p.move_node(&g, 0, 9), Err(Error::UnknownCommunity(9)));
    }

    #[test]
    fn test_move_rejects_partition_of_other_graph() {
        let g = path();
        let pair = WeightedGraph::from_records(vec![EdgeRecord::new("x", "y", 1)]).unwrap();

        // Node 3 exists in the path but not in the pair.
        let mut p = Partition::singletons(&g);
        assert!(matches!(
            p.move_node(&pair, 3, 2),
            Err(Error::InconsistentPartition(_))
        ));
        let mut q = Partition::singletons(&pair);
        assert!(matches!(
            q.move_node(&g, 0, 1),
            Err(Error::InconsistentPartition(_))
        ));
        assert_eq!(p, Partition::singletons(&g));
        assert_eq!(q, Partition::singletons(&pair));
    }

    #[test]
    fn test_empty_communities_are_kept() -> Result<()> {
        let g = path();
        let mut p = Partition::singletons(&g);
        p.move_node(&g, 0, 1)?;
        assert_eq!(p.community_count(), 4);
        assert_eq!(p.non_empty_count(), 3);
        // An emptied community can be reused.
        p.move_node(&g, 0, 0)?;
        assert_eq!(p.non_empty_count(), 4);
        Ok(())
    }

    #[test]
    fn test_communities_by_size_order() -> Result<()> {
        let g = path();
        let mut p = Partition::singletons(&g);
        p.move_node(&g, 2, 3)?;
        p.move_node(&g, 1, 3)?;

        let by_size: Vec<(CommunityId, usize)> = p
            .communities_by_size()
            .into_iter()
            .map(|(c, m)| (c, m.len()))
            .collect();
        assert_eq!(by_size, vec![(0, 1), (3, 3)]);
        Ok(())
    }

    #[test]
    fn test_labels_are_consecutive() -> Result<()> {
        let g = path();
        let mut p = Partition::singletons(&g);
        p.move_node(&g, 0, 3)?;
        p.move_node(&g, 1, 2)?;
        assert_eq!(p.labels(), vec![1, 0, 0, 1]);
        Ok(())
    }

    #[test]
    fn test_view_maps_ids() -> Result<()> {
        let g = path();
        let mut p = Partition::singletons(&g);
        p.move_node(&g, 1, 0)?;
        let view = PartitionView::new(&g, &p);

        assert_eq!(view.community_of(&"b"), Some(0));
        assert_eq!(view.community_of(&"zz"), None);
        assert_eq!(view.non_empty_count(), 3);

        let members = view.community_members();
        assert_eq!(members[&0], vec!["a", "b"]);
        assert!(!members.contains_key(&1));

        let by_size = view.communities_by_size();
        assert_eq!(by_size.last().unwrap(), &(0, vec!["a", "b"]));
        assert_eq!(by_size[0], (2, vec!["c"]));

        let nc = view.node_community();
        assert_eq!(nc.len(), 4);
        assert_eq!(nc[&"a"], nc[&"b"]);
        Ok(())
    }

    #[test]
    fn test_consistency_detects_drift() {
        let g = path();
        let mut p = Partition::singletons(&g);
        p.total[0] += 1;
        assert!(matches!(
            p.check_consistency(&g),
            Err(Error::InconsistentPartition(_))
        ));
    }
}
