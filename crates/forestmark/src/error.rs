//! Error types for the benchmark
//!
//! Configuration problems are detected before any collective starts;
//! everything else is fatal for the whole group.

use crate::timing::TimingState;
use forestmark_comm::CommError;
use forestmark_forest::ForestError;
use forestmark_writer::{ParseOptionError, WriteError};
use std::path::PathBuf;

/// Invalid or unreadable configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Scenario id not in the registry
    #[error("unknown scenario '{name}' (available: {})", available.join(", "))]
    UnknownScenario {
        /// Requested id
        name: String,
        /// Registered ids
        available: Vec<String>,
    },

    /// Unrecognized enumerated value
    #[error(transparent)]
    InvalidOption(#[from] ParseOptionError),

    /// Value outside its allowed range
    #[error("invalid value '{value}' for {option}: {reason}")]
    InvalidValue {
        /// Option name
        option: String,
        /// Rejected value
        value: String,
        /// Why it was rejected
        reason: String,
    },

    /// Scenario option that no scenario declares
    #[error("scenario '{scenario}' has no option '{option}'")]
    UnknownOption {
        /// Selected scenario
        scenario: String,
        /// Offending key
        option: String,
    },

    /// Configuration file could not be read
    #[error("cannot read {}: {source}", path.display())]
    ReadFile {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for a benchmark configuration
    #[error("cannot parse {}: {source}", path.display())]
    ParseFile {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: toml::de::Error,
    },

    /// Log filter directive rejected
    #[error("invalid log filter: {0}")]
    Logging(String),
}

impl ConfigError {
    pub(crate) fn invalid(option: &str, value: impl ToString, reason: &str) -> Self {
        Self::InvalidValue {
            option: option.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Benchmark errors
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Collective protocol failure
    #[error("collective failed: {0}")]
    Comm(#[from] CommError),

    /// Tree library failure
    #[error("forest error: {0}")]
    Forest(#[from] ForestError),

    /// Dataset write failure
    #[error("write failed: {0}")]
    Write(#[from] WriteError),

    /// Elapsed-time reduction failed after the write
    #[error("timing reduction failed: {0}")]
    TimingReduction(#[source] CommError),

    /// Timing harness driven out of order
    #[error("illegal timing transition {from:?} -> {to:?}")]
    IllegalTransition {
        /// Current state
        from: TimingState,
        /// Requested state
        to: TimingState,
    },

    /// Refinement probability could not be used
    #[error("refinement ratio {ratio} is not a probability")]
    InvalidRatio {
        /// Offending ratio
        ratio: f64,
    },

    /// Result or sweep artifact could not be written or read
    #[error("cannot access {}: {source}", path.display())]
    Artifact {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Result record could not be encoded or decoded
    #[error("invalid result record: {0}")]
    Record(#[from] serde_json::Error),

    /// Another rank failed during a phase
    #[error("{phase} failed on another rank")]
    PeerFailed {
        /// Pipeline phase
        phase: &'static str,
    },
}

impl BenchError {
    pub(crate) fn artifact(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Artifact { path, source }
    }

    /// Check if the error was detected before any collective started
    #[inline]
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Check if the error originated on another rank
    #[inline]
    #[must_use]
    pub fn is_remote(&self) -> bool {
        match self {
            Self::PeerFailed { .. } => true,
            Self::Comm(e) | Self::TimingReduction(e) => e.is_remote(),
            Self::Write(e) => e.is_remote(),
            Self::Forest(ForestError::PeerFailed) => true,
            _ => false,
        }
    }
}
