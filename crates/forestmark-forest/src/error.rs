//! Error types for forest construction

use forestmark_comm::CommError;

/// Forest construction, adaptation and partitioning errors
#[derive(Debug, thiserror::Error)]
pub enum ForestError {
    /// Coarse mesh without trees
    #[error("coarse mesh has no trees")]
    EmptyMesh,

    /// Requested refinement beyond what an element path can encode
    #[error("refinement level {level} exceeds the maximum of {max}")]
    LevelTooDeep {
        /// Requested level
        level: u8,
        /// Deepest supported level
        max: u8,
    },

    /// Global element count does not fit the index type
    #[error("forest with {trees} trees at level {level} has too many elements")]
    TooManyElements {
        /// Number of coarse trees
        trees: usize,
        /// Uniform level
        level: u8,
    },

    /// Another rank failed during a collective forest operation
    #[error("adaptation failed on another rank")]
    PeerFailed,

    /// Partition traffic could not be decoded
    #[error("corrupt partition data from rank {source_rank}: {detail}")]
    CorruptPartition {
        /// Rank that sent the data
        source_rank: usize,
        /// What was wrong
        detail: String,
    },

    /// Collective communication failed
    #[error("communication failed: {0}")]
    Comm(#[from] CommError),
}
