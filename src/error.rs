use thiserror::Error as ThisError;

/// Result alias for `unfolding`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by graph ingestion and community detection.
#[derive(Debug, Clone, PartialEq, ThisError)]
pub enum Error {
    /// An edge record could not be ingested.
    ///
    /// Ingestion stops at the first bad record: silently dropping it would
    /// leave attached weights and the total weight out of step with the edges.
    #[error("malformed record #{position}: {reason}")]
    MalformedRecord {
        /// 0-based position of the record in the input stream.
        position: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// A record would push the total edge weight past what `u64` can hold
    /// once doubled.
    #[error("record #{position} with weight {weight} overflows the total edge weight")]
    WeightOverflow {
        /// 0-based position of the record among those fed to the builder.
        position: usize,
        /// The record's weight.
        weight: u64,
    },

    /// Input was empty.
    #[error("empty input provided")]
    EmptyInput,

    /// Invalid parameter value.
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: &'static str,
    },

    /// A node id or index that is not part of the graph.
    #[error("unknown node {0}")]
    UnknownNode(String),

    /// A community id outside the partition.
    #[error("unknown community {0}")]
    UnknownCommunity(usize),

    /// The partition's cached state disagrees with a recomputation.
    #[error("inconsistent partition: {0}")]
    InconsistentPartition(String),
}
