//! Louvain local moving, run to a fixed point.
//!
//! Fast modularity optimisation through repeated passes of single-node moves.
//!
//! ## The Algorithm (Blondel et al. 2008, phase 1)
//!
//! 1. Start with each node in its own community.
//! 2. Run a local-moving pass (see [`LocalMoving`]).
//! 3. Repeat until a pass moves no node.
//!
//! Every accepted move raises Q by more than `epsilon` and Q is bounded, so
//! the loop terminates. `max_passes` and `time_budget` are extra stops for
//! callers that want a hard bound; either returns the current partition,
//! which is always valid.
//!
//! The multi-level aggregation of full Louvain (contracting communities into
//! super-nodes) is not performed.
//!
//! ## References
//!
//! Blondel et al. (2008). "Fast unfolding of communities in large networks."
//! Journal of Statistical Mechanics: Theory and Experiment, P10008.

use super::local_moving::{check_epsilon, LocalMoving, PassOutcome, DEFAULT_EPSILON};
use super::modularity::{ModularityScorer, Normalization};
use super::partition::{Partition, PartitionView};
use crate::error::{Error, Result};
use crate::graph::WeightedGraph;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Louvain local-moving configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Louvain {
    /// Minimum gain for a move to be accepted.
    epsilon: f64,
    /// Random seed; `None` draws one from the OS.
    seed: Option<u64>,
    /// Stop after this many passes.
    max_passes: Option<usize>,
    /// Stop once this much wall-clock time has elapsed.
    time_budget: Option<Duration>,
    /// Modularity normalisation used for gains and reporting.
    normalization: Normalization,
}

impl Louvain {
    /// Create a new Louvain detector with default settings.
    pub fn new() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
            seed: None,
            max_passes: None,
            time_budget: None,
            normalization: Normalization::Newman,
        }
    }

    /// Set the gain threshold a move must exceed. Must be finite and positive.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Stop after at most `max_passes` passes.
    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = Some(max_passes);
        self
    }

    /// Stop starting new passes once `budget` has elapsed.
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    /// Set the modularity normalisation.
    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    /// Gain threshold.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Modularity normalisation.
    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        check_epsilon(self.epsilon)?;
        if self.max_passes == Some(0) {
            return Err(Error::InvalidParameter {
                name: "max_passes",
                message: "must be at least 1",
            });
        }
        Ok(())
    }

    /// Set up a run on `graph` with every node in its own community.
    pub fn start<'g, N>(&self, graph: &'g WeightedGraph<N>) -> Result<Unfolding<'g, N>> {
        self.validate()?;
        let rng = match self.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_os_rng(),
        };
        Ok(Unfolding {
            graph,
            partition: Partition::singletons(graph),
            mover: LocalMoving::new(self.epsilon)?.with_normalization(self.normalization),
            rng,
            max_passes: self.max_passes,
            time_budget: self.time_budget,
            report: UnfoldingReport::default(),
        })
    }

    /// Run local moving on `graph` until a fixed point or a configured stop.
    pub fn run<'g, N>(&self, graph: &'g WeightedGraph<N>) -> Result<Unfolding<'g, N>> {
        self.run_with_progress(graph, |_| {})
    }

    /// Like [`Louvain::run`], calling `progress` after every pass.
    pub fn run_with_progress<'g, N, F>(
        &self,
        graph: &'g WeightedGraph<N>,
        progress: F,
    ) -> Result<Unfolding<'g, N>>
    where
        F: FnMut(&PassProgress),
    {
        let mut run = self.start(graph)?;
        let _ = run.converge_with_progress(progress);
        Ok(run)
    }
}

impl Default for Louvain {
    fn default() -> Self {
        Self::new()
    }
}

/// Why the pass loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A pass moved no node.
    Converged,
    /// `max_passes` passes were run.
    PassLimit,
    /// The time budget ran out.
    TimeBudget,
}

/// Snapshot handed to the progress callback after each pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassProgress {
    /// 1-based pass number.
    pub pass: usize,
    /// Nodes moved in this pass.
    pub moved: usize,
    /// Non-empty communities after this pass.
    pub non_empty: usize,
    /// Time since the loop started.
    pub elapsed: Duration,
}

/// Per-pass history of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnfoldingReport {
    /// Moves made in each pass.
    pub moves_per_pass: Vec<usize>,
    /// Non-empty communities after each pass.
    pub non_empty_per_pass: Vec<usize>,
    /// Set once the loop has stopped.
    pub stop_reason: Option<StopReason>,
}

impl UnfoldingReport {
    /// Number of passes run.
    pub fn passes(&self) -> usize {
        self.moves_per_pass.len()
    }

    /// Total moves over all passes.
    pub fn total_moves(&self) -> usize {
        self.moves_per_pass.iter().sum()
    }

    /// True if the last stop was a fixed point.
    pub fn converged(&self) -> bool {
        self.stop_reason == Some(StopReason::Converged)
    }
}

/// One optimisation run: the graph, the partition being improved and the
/// generator that orders the passes.
///
/// Runs own all of their mutable state, so independent runs on the same
/// graph do not interact.
#[derive(Debug)]
pub struct Unfolding<'g, N> {
    graph: &'g WeightedGraph<N>,
    partition: Partition,
    mover: LocalMoving,
    rng: StdRng,
    max_passes: Option<usize>,
    time_budget: Option<Duration>,
    report: UnfoldingReport,
}

impl<'g, N> Unfolding<'g, N> {
    /// Run a single local-moving pass and record it.
    pub fn pass(&mut self) -> PassOutcome {
        let outcome = self.mover.pass(self.graph, &mut self.partition, &mut self.rng);
        self.report.moves_per_pass.push(outcome.moved);
        self.report
            .non_empty_per_pass
            .push(self.partition.non_empty_count());
        outcome
    }

    /// Run passes until a fixed point or a configured stop.
    pub fn converge(&mut self) -> &UnfoldingReport {
        self.converge_with_progress(|_| {})
    }

    /// Like [`Unfolding::converge`], calling `progress` after every pass.
    pub fn converge_with_progress<F>(&mut self, mut progress: F) -> &UnfoldingReport
    where
        F: FnMut(&PassProgress),
    {
        let started = Instant::now();
        let first_pass = self.report.passes();

        let reason = loop {
            let done = self.report.passes() - first_pass;
            if self.max_passes.is_some_and(|max| done >= max) {
                break StopReason::PassLimit;
            }
            if self.time_budget.is_some_and(|budget| started.elapsed() >= budget) {
                break StopReason::TimeBudget;
            }

            let outcome = self.pass();
            let update = PassProgress {
                pass: self.report.passes(),
                moved: outcome.moved,
                non_empty: self.partition.non_empty_count(),
                elapsed: started.elapsed(),
            };
            info!(
                pass = update.pass,
                moved = update.moved,
                visited = outcome.visited,
                communities = update.non_empty,
                "local moving pass"
            );
            progress(&update);

            if outcome.moved == 0 {
                break StopReason::Converged;
            }
        };

        match reason {
            StopReason::Converged => debug!(
                passes = self.report.passes(),
                moves = self.report.total_moves(),
                "reached fixed point"
            ),
            StopReason::PassLimit | StopReason::TimeBudget => warn!(
                ?reason,
                passes = self.report.passes(),
                "stopped before reaching a fixed point"
            ),
        }
        self.report.stop_reason = Some(reason);
        &self.report
    }

    /// The graph being partitioned.
    pub fn graph(&self) -> &'g WeightedGraph<N> {
        self.graph
    }

    /// Current partition.
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Per-pass history so far.
    pub fn report(&self) -> &UnfoldingReport {
        &self.report
    }

    /// Q of the current partition under the run's normalisation.
    pub fn modularity(&self) -> f64 {
        ModularityScorer::with_normalization(self.graph, self.mover.normalization())
            .global_modularity(&self.partition)
    }

    /// Take the partition out of the run.
    pub fn into_partition(self) -> Partition {
        self.partition
    }
}

impl<'g, N: Clone + Eq + Hash> Unfolding<'g, N> {
    /// Current partition in terms of the caller's node ids.
    pub fn view(&self) -> PartitionView<'_, N> {
        PartitionView::new(self.graph, &self.partition)
    }
}

#[cfg(feature = "petgraph")]
impl super::traits::CommunityDetection for Louvain {
    fn detect<V, E>(&self, graph: &petgraph::graph::UnGraph<V, E>) -> Result<Vec<usize>>
    where
        E: Copy + Into<u64>,
    {
        if graph.node_count() == 0 {
            return Err(Error::EmptyInput);
        }
        let weighted = WeightedGraph::from_petgraph(graph)?;
        let run = self.run(&weighted)?;
        Ok(run.partition().labels())
    }
}
