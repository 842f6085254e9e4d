//! Error types for dataset writing and reading

use crate::format::DataType;
use forestmark_comm::CommError;
use std::io;
use std::path::PathBuf;

/// Dataset write and read errors
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// File system failure
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Header could not be encoded or decoded
    #[error("invalid header: {0}")]
    Header(#[from] serde_json::Error),

    /// File does not start with a known magic number
    #[error("not a forestmark dataset (magic {found:?})")]
    BadMagic {
        /// First four bytes of the file
        found: [u8; 4],
    },

    /// Header does not describe the file it heads
    #[error("corrupt header in {}: {detail}", path.display())]
    CorruptHeader {
        /// File being read
        path: PathBuf,
        /// What was wrong
        detail: String,
    },

    /// Variable length differs from the local element count
    #[error("variable {name} has {actual} values for {expected} local elements")]
    VariableLength {
        /// Variable name
        name: String,
        /// Local element count
        expected: usize,
        /// Number of values supplied
        actual: usize,
    },

    /// Two variables share a name
    #[error("variable {name} defined twice")]
    DuplicateVariable {
        /// Variable name
        name: String,
    },

    /// Variable name collides with the mesh variables
    #[error("variable name {name} is reserved for the mesh")]
    ReservedName {
        /// Variable name
        name: String,
    },

    /// Variable not present in the header
    #[error("no variable named {name}")]
    UnknownVariable {
        /// Requested name
        name: String,
    },

    /// Variable read with the wrong element type
    #[error("variable {name} holds {actual} values, not {expected}")]
    TypeMismatch {
        /// Variable name
        name: String,
        /// Type requested
        expected: DataType,
        /// Type stored
        actual: DataType,
    },

    /// Gathered shard data could not be decoded
    #[error("corrupt shard from rank {source_rank}: {detail}")]
    CorruptShard {
        /// Rank that contributed the shard
        source_rank: usize,
        /// What was wrong
        detail: String,
    },

    /// Another rank failed its part of the write
    #[error("write failed on another rank")]
    PeerFailed,

    /// Collective communication failed
    #[error("communication failed: {0}")]
    Comm(#[from] CommError),
}

impl WriteError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }

    /// Returns true if the error was caused by another rank
    #[must_use]
    pub fn is_remote(&self) -> bool {
        match self {
            Self::PeerFailed => true,
            Self::Comm(e) => e.is_remote(),
            _ => false,
        }
    }
}
