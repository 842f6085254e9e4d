//! Write options
//!
//! Enumerated options parse case-insensitively from their friendly names and
//! from the `NC_*` spellings used by netCDF tooling; they display as the
//! canonical command-line value.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unrecognized enumerated option value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} '{value}', expected one of: {expected}")]
pub struct ParseOptionError {
    /// Option being parsed
    pub kind: &'static str,
    /// Rejected input
    pub value: String,
    /// Accepted spellings
    pub expected: &'static str,
}

fn parse_variant<T: Copy>(
    kind: &'static str,
    expected: &'static str,
    value: &str,
    table: &[(&str, T)],
) -> Result<T, ParseOptionError> {
    table
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(value))
        .map(|(_, variant)| *variant)
        .ok_or_else(|| ParseOptionError {
            kind,
            value: value.to_string(),
            expected,
        })
}

/// Placement of each variable's bytes in the data section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageLayout {
    /// One region per variable
    #[serde(alias = "NC_CONTIGUOUS")]
    Contiguous,
    /// Fixed-size chunks, interleaved across variables sharing a dimension
    #[serde(alias = "NC_CHUNKED")]
    Chunked,
}

impl FromStr for StorageLayout {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant(
            "storage mode",
            "contiguous, NC_CONTIGUOUS, chunked, NC_CHUNKED",
            s,
            &[
                ("contiguous", Self::Contiguous),
                ("nc_contiguous", Self::Contiguous),
                ("chunked", Self::Chunked),
                ("nc_chunked", Self::Chunked),
            ],
        )
    }
}

impl fmt::Display for StorageLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contiguous => write!(f, "NC_CONTIGUOUS"),
            Self::Chunked => write!(f, "NC_CHUNKED"),
        }
    }
}

/// How ranks reach the file system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    /// Every rank writes its own rows into the shared file
    #[serde(alias = "NC_INDEPENDENT")]
    Independent,
    /// Rows are gathered and written by a single rank
    #[serde(alias = "NC_COLLECTIVE")]
    Collective,
    /// Every rank writes a file of its own
    FilePerProcess,
}

impl FromStr for AccessMode {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant(
            "access mode",
            "independent, NC_INDEPENDENT, collective, NC_COLLECTIVE, file_per_process",
            s,
            &[
                ("independent", Self::Independent),
                ("nc_independent", Self::Independent),
                ("collective", Self::Collective),
                ("nc_collective", Self::Collective),
                ("file_per_process", Self::FilePerProcess),
            ],
        )
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Independent => write!(f, "NC_INDEPENDENT"),
            Self::Collective => write!(f, "NC_COLLECTIVE"),
            Self::FilePerProcess => write!(f, "file_per_process"),
        }
    }
}

/// File format generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatGeneration {
    /// Flat classic layout with 64-bit offsets
    #[serde(rename = "cdf5", alias = "classic64")]
    Classic64,
    /// Grouped layout
    #[serde(rename = "netcdf4_hdf5", alias = "hierarchical")]
    Hierarchical,
}

impl FormatGeneration {
    /// Magic number written at the start of the file
    #[inline]
    #[must_use]
    pub const fn magic(self) -> [u8; 4] {
        match self {
            Self::Classic64 => crate::format::CLASSIC64_MAGIC,
            Self::Hierarchical => crate::format::HIERARCHICAL_MAGIC,
        }
    }
}

impl FromStr for FormatGeneration {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant(
            "format",
            "cdf5, classic64, netcdf4_hdf5, hierarchical",
            s,
            &[
                ("cdf5", Self::Classic64),
                ("classic64", Self::Classic64),
                ("netcdf4_hdf5", Self::Hierarchical),
                ("hierarchical", Self::Hierarchical),
            ],
        )
    }
}

impl fmt::Display for FormatGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classic64 => write!(f, "cdf5"),
            Self::Hierarchical => write!(f, "netcdf4_hdf5"),
        }
    }
}

/// Everything that shapes one write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    /// Storage layout
    pub layout: StorageLayout,
    /// Access mode
    pub access: AccessMode,
    /// Pre-write fill values before data
    pub fill: bool,
    /// Format generation
    pub format: FormatGeneration,
    /// Rows per chunk for [`StorageLayout::Chunked`]
    pub chunk_len: u64,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            layout: StorageLayout::Chunked,
            access: AccessMode::Collective,
            fill: false,
            format: FormatGeneration::Hierarchical,
            chunk_len: 4096,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_spellings_in_any_case() {
        assert_eq!("NC_CHUNKED".parse(), Ok(StorageLayout::Chunked));
        assert_eq!("Contiguous".parse(), Ok(StorageLayout::Contiguous));
        assert_eq!("nc_independent".parse(), Ok(AccessMode::Independent));
        assert_eq!("FILE_PER_PROCESS".parse(), Ok(AccessMode::FilePerProcess));
        assert_eq!("CDF5".parse(), Ok(FormatGeneration::Classic64));
        assert_eq!("hierarchical".parse(), Ok(FormatGeneration::Hierarchical));
    }

    #[test]
    fn rejects_unknown_values() {
        let err = "NC_STRIPED".parse::<StorageLayout>().unwrap_err();
        assert_eq!(err.kind, "storage mode");
        assert_eq!(err.value, "NC_STRIPED");
        assert!(err.to_string().contains("NC_CHUNKED"));
    }

    #[test]
    fn display_parses_back() {
        for access in [
            AccessMode::Independent,
            AccessMode::Collective,
            AccessMode::FilePerProcess,
        ] {
            assert_eq!(access.to_string().parse(), Ok(access));
        }
        assert_eq!(StorageLayout::Chunked.to_string(), "NC_CHUNKED");
        assert_eq!(FormatGeneration::Hierarchical.to_string(), "netcdf4_hdf5");
    }

    #[test]
    fn defaults() {
        let options = WriteOptions::default();
        assert_eq!(options.layout, StorageLayout::Chunked);
        assert_eq!(options.access, AccessMode::Collective);
        assert!(!options.fill);
        assert_eq!(options.format, FormatGeneration::Hierarchical);
    }
}
