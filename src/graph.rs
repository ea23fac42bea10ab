//! Weighted undirected graph built from directed flow records.
//!
//! Records describe directed flows (`source -> target`, integer count). The
//! graph folds them into undirected edges: every record for the unordered
//! pair `{u, v}` is summed into one weight, stored on both endpoints.
//!
//! ```text
//! A -> B  (3)
//! B -> A  (2)      ==>   A --6-- B
//! A -> B  (1)
//! ```
//!
//! Aggregates maintained while folding:
//!
//! - `attached_weight[u]`: weighted degree, Σ of `u`'s edge weights
//! - `total_weight` (m): Σ over undirected edges, each counted once
//!
//! so that `Σ attached_weight = 2m` always holds.
//!
//! ## Self-loops
//!
//! A record with `source == target` registers the node but never enters the
//! adjacency, the attached weight, or m. Its weight is tallied separately in
//! [`WeightedGraph::self_loop_weight`]. Modularity is defined over pairs
//! `i != j`, so a self-loop has no place in either term.

use crate::error::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use tracing::{debug, trace};

/// One directed flow record: `weight` units moved from `source` to `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRecord<N> {
    /// Origin node.
    pub source: N,
    /// Destination node.
    pub target: N,
    /// Flow count.
    pub weight: u64,
}

impl<N> EdgeRecord<N> {
    /// Create a record.
    pub fn new(source: N, target: N, weight: u64) -> Self {
        Self {
            source,
            target,
            weight,
        }
    }
}

/// A record as handed over by a text reader: every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEdgeRecord {
    /// Origin identifier.
    pub source: Option<String>,
    /// Destination identifier.
    pub target: Option<String>,
    /// Flow count, unparsed.
    pub weight: Option<String>,
}

impl RawEdgeRecord {
    /// Create a raw record from optional string fields.
    pub fn new(source: Option<&str>, target: Option<&str>, weight: Option<&str>) -> Self {
        Self {
            source: source.map(str::to_owned),
            target: target.map(str::to_owned),
            weight: weight.map(str::to_owned),
        }
    }

    /// Validate the fields into an [`EdgeRecord`].
    ///
    /// Identifiers must be present and non-blank. The weight must parse as a
    /// non-negative integer; negative or fractional values are rejected
    /// rather than clamped or rounded.
    pub fn validate(&self, position: usize) -> Result<EdgeRecord<String>> {
        let malformed = |reason: String| Error::MalformedRecord { position, reason };

        let source = required_field(self.source.as_deref(), "source").map_err(malformed)?;
        let target = required_field(self.target.as_deref(), "target").map_err(malformed)?;
        let raw_weight = required_field(self.weight.as_deref(), "weight").map_err(malformed)?;
        let weight = parse_weight(raw_weight).map_err(malformed)?;

        Ok(EdgeRecord::new(source.to_owned(), target.to_owned(), weight))
    }
}

fn required_field<'a>(
    value: Option<&'a str>,
    name: &str,
) -> std::result::Result<&'a str, String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        Some(_) => Err(format!("{name} is blank")),
        None => Err(format!("{name} is missing")),
    }
}

fn parse_weight(raw: &str) -> std::result::Result<u64, String> {
    if let Ok(w) = raw.parse::<u64>() {
        return Ok(w);
    }
    if let Ok(w) = raw.parse::<i128>() {
        return Err(if w < 0 {
            format!("weight {raw} is negative")
        } else {
            format!("weight {raw} is out of range")
        });
    }
    if raw.parse::<f64>().is_ok() {
        return Err(format!("weight {raw} is not an integer"));
    }
    Err(format!("weight {raw:?} is not a number"))
}

/// Largest total edge weight m a graph may carry.
///
/// Keeps 2m, and with it every attached weight and community aggregate,
/// within `u64`.
pub const MAX_TOTAL_WEIGHT: u64 = u64::MAX / 2;

/// Incremental builder for [`WeightedGraph`].
///
/// Node creation indices follow first appearance, so the same record stream
/// always yields the same indices.
#[derive(Debug, Clone)]
pub struct GraphBuilder<N> {
    index: HashMap<N, usize>,
    nodes: Vec<N>,
    adj: Vec<BTreeMap<usize, u64>>,
    attached_weight: Vec<u64>,
    total_weight: u64,
    self_loop_weight: u64,
    records: usize,
}

impl<N: Clone + Eq + Hash> GraphBuilder<N> {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self {
            index: HashMap::new(),
            nodes: Vec::new(),
            adj: Vec::new(),
            attached_weight: Vec::new(),
            total_weight: 0,
            self_loop_weight: 0,
            records: 0,
        }
    }

    /// Register a node, returning its creation index.
    ///
    /// Registering an existing node is a no-op.
    pub fn add_node(&mut self, node: N) -> usize {
        if let Some(&idx) = self.index.get(&node) {
            return idx;
        }
        let idx = self.nodes.len();
        let _ = self.index.insert(node.clone(), idx);
        self.nodes.push(node);
        self.adj.push(BTreeMap::new());
        self.attached_weight.push(0);
        idx
    }

    /// Fold one directed record into the undirected graph.
    ///
    /// Fails with [`Error::WeightOverflow`] if the record would push m past
    /// [`MAX_TOTAL_WEIGHT`] (or overflow the self-loop tally). A rejected
    /// record leaves every weight unchanged; its endpoints stay registered.
    pub fn add_record(&mut self, record: EdgeRecord<N>) -> Result<&mut Self> {
        let position = self.records;
        self.records += 1;
        let u = self.add_node(record.source);
        let v = self.add_node(record.target);
        let w = record.weight;
        let overflow = || Error::WeightOverflow {
            position,
            weight: w,
        };

        if u == v {
            self.self_loop_weight = self.self_loop_weight.checked_add(w).ok_or_else(overflow)?;
            trace!(node = u, weight = w, "self-loop record excluded from modularity");
            return Ok(self);
        }
        if w == 0 {
            return Ok(self);
        }
        let total_weight = self
            .total_weight
            .checked_add(w)
            .filter(|&m| m <= MAX_TOTAL_WEIGHT)
            .ok_or_else(overflow)?;

        let folded = {
            let entry = self.adj[u].entry(v).or_insert(0);
            let prior = *entry;
            *entry += w;
            prior
        };
        *self.adj[v].entry(u).or_insert(0) += w;
        if folded > 0 {
            debug!(u, v, prior = folded, added = w, "folded record into existing edge");
        }

        self.attached_weight[u] += w;
        self.attached_weight[v] += w;
        self.total_weight = total_weight;
        Ok(self)
    }

    /// Fold a sequence of records, stopping at the first that overflows.
    pub fn extend_records<I>(&mut self, records: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = EdgeRecord<N>>,
    {
        for record in records {
            let _ = self.add_record(record)?;
        }
        Ok(self)
    }

    /// Freeze into a read-only graph.
    pub fn build(self) -> WeightedGraph<N> {
        let adj: Vec<Vec<(usize, u64)>> = self
            .adj
            .into_iter()
            .map(|row| row.into_iter().collect())
            .collect();
        let edge_count = adj.iter().map(Vec::len).sum::<usize>() / 2;

        debug!(
            nodes = self.nodes.len(),
            edges = edge_count,
            records = self.records,
            total_weight = self.total_weight,
            "built weighted graph"
        );

        WeightedGraph {
            index: self.index,
            nodes: self.nodes,
            adj,
            attached_weight: self.attached_weight,
            total_weight: self.total_weight,
            self_loop_weight: self.self_loop_weight,
            edge_count,
        }
    }
}

impl GraphBuilder<String> {
    /// Validate and fold raw text records.
    ///
    /// Aborts on the first malformed record. The error carries the record's
    /// position counted over this call's input.
    pub fn try_extend_raw<I>(&mut self, records: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = RawEdgeRecord>,
    {
        for (position, raw) in records.into_iter().enumerate() {
            let record = raw.validate(position)?;
            let weight = record.weight;
            if self.add_record(record).is_err() {
                return Err(Error::MalformedRecord {
                    position,
                    reason: format!("weight {weight} overflows the total edge weight"),
                });
            }
        }
        Ok(self)
    }
}

impl<N: Clone + Eq + Hash> Default for GraphBuilder<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Undirected weighted graph with cached weighted degrees.
///
/// Nodes are addressed by dense creation index (`0..node_count()`); the
/// caller's ids are kept for reporting.
#[derive(Debug, Clone)]
pub struct WeightedGraph<N> {
    index: HashMap<N, usize>,
    nodes: Vec<N>,
    /// Adjacency: node -> [(neighbor, weight)], sorted by neighbor.
    adj: Vec<Vec<(usize, u64)>>,
    attached_weight: Vec<u64>,
    total_weight: u64,
    self_loop_weight: u64,
    edge_count: usize,
}

impl<N: Clone + Eq + Hash> WeightedGraph<N> {
    /// Start a [`GraphBuilder`].
    pub fn builder() -> GraphBuilder<N> {
        GraphBuilder::new()
    }

    /// Build directly from directed records.
    pub fn from_records<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = EdgeRecord<N>>,
    {
        let mut builder = GraphBuilder::new();
        let _ = builder.extend_records(records)?;
        Ok(builder.build())
    }

    /// Creation index of `node`.
    pub fn index_of(&self, node: &N) -> Option<usize> {
        self.index.get(node).copied()
    }
}

impl WeightedGraph<String> {
    /// Build from raw text records, failing on the first malformed one.
    pub fn try_from_raw<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = RawEdgeRecord>,
    {
        let mut builder = GraphBuilder::new();
        let _ = builder.try_extend_raw(records)?;
        Ok(builder.build())
    }
}

impl<N> WeightedGraph<N> {
    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of undirected edges with positive weight.
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Caller id of node `idx`.
    ///
    /// # Panics
    ///
    /// Index accessors panic if `idx >= node_count()`.
    pub fn node(&self, idx: usize) -> &N {
        &self.nodes[idx]
    }

    /// Caller ids in creation order.
    pub fn nodes(&self) -> &[N] {
        &self.nodes
    }

    /// Neighbours of `idx` with edge weights, sorted by neighbour index.
    pub fn neighbors(&self, idx: usize) -> &[(usize, u64)] {
        &self.adj[idx]
    }

    /// Weighted degree of `idx`.
    pub fn attached_weight(&self, idx: usize) -> u64 {
        self.attached_weight[idx]
    }

    /// m: sum of undirected edge weights, each edge once.
    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    /// Weight carried by self-loop records (not part of m).
    pub fn self_loop_weight(&self) -> u64 {
        self.self_loop_weight
    }

    /// Weight of the undirected edge `{u, v}`, zero if absent.
    pub fn weight_between(&self, u: usize, v: usize) -> u64 {
        self.adj[u]
            .binary_search_by_key(&v, |&(n, _)| n)
            .map(|pos| self.adj[u][pos].1)
            .unwrap_or(0)
    }

    /// True when `idx` has no incident edge.
    pub fn is_isolated(&self, idx: usize) -> bool {
        self.adj[idx].is_empty()
    }
}

#[cfg(feature = "petgraph")]
impl WeightedGraph<usize> {
    /// Convert a petgraph undirected graph with integer edge weights.
    ///
    /// Node ids are petgraph node indices. Parallel edges are summed;
    /// self-loops are excluded as for records.
    pub fn from_petgraph<V, E>(graph: &petgraph::graph::UnGraph<V, E>) -> Result<Self>
    where
        E: Copy + Into<u64>,
    {
        use petgraph::visit::EdgeRef;

        let mut builder = GraphBuilder::new();
        for idx in graph.node_indices() {
            let _ = builder.add_node(idx.index());
        }
        for edge in graph.edge_references() {
            let _ = builder.add_record(EdgeRecord::new(
                edge.source().index(),
                edge.target().index(),
                (*edge.weight()).into(),
            ))?;
        }
        Ok(builder.build())
    }
}
