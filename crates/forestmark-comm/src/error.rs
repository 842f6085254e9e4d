//! Error types for collective communication

/// Collective communication errors
///
/// Every variant is fatal for the group: once a collective fails there is no
/// way to resynchronise the ranks.
#[derive(Debug, thiserror::Error)]
pub enum CommError {
    /// A group must contain at least one rank
    #[error("a process group needs at least one rank")]
    EmptyGroup,

    /// Root rank outside the group
    #[error("root rank {root} is outside a group of {size}")]
    InvalidRoot {
        /// Requested root
        root: usize,
        /// Group size
        size: usize,
    },

    /// A peer left the group while this rank was inside a collective
    #[error("a peer left the group during a collective operation")]
    PeerDeparted,

    /// Some rank contributed a malformed payload; the collective is void on every rank
    #[error("collective poisoned by a malformed contribution")]
    Poisoned,

    /// Payload shape did not match what the collective expects
    #[error("malformed payload: expected {expected} bytes or parts, got {actual}")]
    MalformedPayload {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// A rank thread could not be started
    #[error("failed to start rank {rank}: {source}")]
    Spawn {
        /// Rank that failed to start
        rank: usize,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// A rank panicked before finishing
    #[error("rank {rank} panicked")]
    RankPanicked {
        /// Rank that panicked
        rank: usize,
    },
}

impl CommError {
    /// Check if the error was caused by another rank rather than this one
    #[inline]
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::PeerDeparted | Self::Poisoned)
    }
}
