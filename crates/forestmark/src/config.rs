//! Benchmark configuration
//!
//! Sources, later wins: built-in defaults, an optional TOML file, then flags
//! given on the command line.

use crate::error::ConfigError;
use crate::rng::DEFAULT_SEED;
use crate::scenario::{PseudoRandom, Scenario, ScenarioRegistry};
use forestmark_writer::{AccessMode, FormatGeneration, StorageLayout, WriteOptions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// File name stem of the written dataset
pub const OUTPUT_STEM: &str = "forestmark_write_test";

/// Everything that shapes one benchmark run
///
/// # Example
///
/// ```toml
/// scenario = "pseudo_random"
/// storage_mode = "NC_CHUNKED"
/// mpi_access = "file_per_process"
/// netcdf_version = "cdf5"
/// num_element_wise_variables = 4
/// ranks = 8
///
/// [scenario_options]
/// "pseudo_random:bytes" = "100000000"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchConfig {
    /// Scenario id
    pub scenario: String,
    /// Scenario option values keyed `<scenario>:<name>`
    pub scenario_options: BTreeMap<String, String>,
    /// Pre-write fill values
    pub fill: bool,
    /// Storage layout
    pub storage_mode: StorageLayout,
    /// Access mode
    pub mpi_access: AccessMode,
    /// Format generation
    pub netcdf_version: FormatGeneration,
    /// Number of synthetic variables
    pub num_element_wise_variables: usize,
    /// Group size
    pub ranks: usize,
    /// Run seed
    pub seed: u64,
    /// Directory receiving the dataset and `results.json`
    pub output_dir: PathBuf,
    /// Rows per chunk in the chunked layout
    pub chunk_len: u64,
}

impl Default for BenchConfig {
    fn default() -> Self {
        let write = WriteOptions::default();
        Self {
            scenario: PseudoRandom::ID.to_string(),
            scenario_options: BTreeMap::new(),
            fill: write.fill,
            storage_mode: write.layout,
            mpi_access: write.access,
            netcdf_version: write.format,
            num_element_wise_variables: 0,
            ranks: 1,
            seed: DEFAULT_SEED,
            output_dir: PathBuf::from("."),
            chunk_len: write.chunk_len,
        }
    }
}

impl BenchConfig {
    /// Parse a TOML configuration; missing fields keep their defaults
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read and parse a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text, path)
    }

    /// Reject values no run can use
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ranks == 0 {
            return Err(ConfigError::invalid("ranks", self.ranks, "must be at least 1"));
        }
        if self.chunk_len == 0 {
            return Err(ConfigError::invalid("chunk_len", self.chunk_len, "must be at least 1"));
        }
        Ok(())
    }

    /// Validate and instantiate the configured scenario
    pub fn scenario(&self, registry: &ScenarioRegistry) -> Result<Scenario, ConfigError> {
        self.validate()?;
        let mut scenario = registry.create(&self.scenario)?;
        scenario.configure(&self.scenario_options)?;
        Ok(scenario)
    }

    /// Writer settings
    #[must_use]
    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            layout: self.storage_mode,
            access: self.mpi_access,
            fill: self.fill,
            format: self.netcdf_version,
            chunk_len: self.chunk_len,
        }
    }

    /// Path stem of the dataset
    #[must_use]
    pub fn output_stem(&self) -> PathBuf {
        self.output_dir.join(OUTPUT_STEM)
    }
}
