//! One local-moving pass: every node tries its best neighbouring community.
//!
//! Nodes are visited in a fresh random order each pass, and each node's
//! candidate communities are tried in a second random order. A node moves to
//! the candidate with the highest gain only if that gain exceeds `epsilon`;
//! ties keep the first candidate seen.
//!
//! Moves are applied immediately, so later nodes in the same pass see the
//! updated partition. The result therefore depends on visiting order, and is
//! reproducible only for a seeded generator.

use super::modularity::{ModularityScorer, Normalization};
use super::partition::{CommunityId, Partition};
use crate::error::{Error, Result};
use crate::graph::WeightedGraph;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::trace;

/// Default acceptance threshold for a move's gain.
pub const DEFAULT_EPSILON: f64 = 1e-5;

/// Thresholds must be finite and strictly positive: with zero, gains that
/// are rounding noise could keep nodes trading places forever.
pub(crate) fn check_epsilon(epsilon: f64) -> Result<()> {
    if epsilon.is_finite() && epsilon > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidParameter {
            name: "epsilon",
            message: "must be finite and positive",
        })
    }
}

/// Counts from one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassOutcome {
    /// Nodes with at least one incident edge that were considered.
    pub visited: usize,
    /// Nodes that changed community.
    pub moved: usize,
}

/// Single-pass local moving optimizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalMoving {
    epsilon: f64,
    normalization: Normalization,
}

impl LocalMoving {
    /// Optimizer accepting moves with gain strictly above `epsilon`.
    ///
    /// Fails with [`Error::InvalidParameter`] unless `epsilon` is finite and
    /// positive.
    pub fn new(epsilon: f64) -> Result<Self> {
        check_epsilon(epsilon)?;
        Ok(Self {
            epsilon,
            normalization: Normalization::Newman,
        })
    }

    /// Score moves under `normalization`.
    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    /// Acceptance threshold.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Normalisation moves are scored under.
    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    /// Run one pass over every node of `graph`, mutating `partition`.
    ///
    /// `partition` must have been built for `graph`.
    pub fn pass<N, R>(
        &self,
        graph: &WeightedGraph<N>,
        partition: &mut Partition,
        rng: &mut R,
    ) -> PassOutcome
    where
        R: Rng + ?Sized,
    {
        let scorer = ModularityScorer::with_normalization(graph, self.normalization);
        let mut outcome = PassOutcome::default();

        let mut order: Vec<usize> = (0..graph.node_count()).collect();
        order.shuffle(rng);

        for node in order {
            // Isolated nodes cannot gain anything and stay where they are.
            if graph.is_isolated(node) {
                continue;
            }
            outcome.visited += 1;

            let mut links = scorer.neighbor_links(partition, node);
            links.others.shuffle(rng);

            let mut best: Option<(CommunityId, u64)> = None;
            let mut best_gain = self.epsilon;
            for &(target, link) in &links.others {
                let gain = scorer.gain_with_links(partition, node, links.own, target, link);
                if gain > best_gain {
                    best_gain = gain;
                    best = Some((target, link));
                }
            }

            if let Some((target, link)) = best {
                let from = partition.community_of(node);
                trace!(node, from, to = target, gain = best_gain, "move");
                partition.apply_move(graph.attached_weight(node), node, target, links.own, link);
                outcome.moved += 1;
            }
        }

        outcome
    }
}

impl Default for LocalMoving {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
            normalization: Normalization::Newman,
        }
    }
}
