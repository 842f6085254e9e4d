//! Benchmark scenarios
//!
//! A scenario decides which forest is written. Scenarios declare their own
//! command-line options, namespaced as `<scenario id>:<name>`.

mod pseudo_random;
mod registry;

pub use pseudo_random::PseudoRandom;
pub use registry::ScenarioRegistry;

use crate::error::{BenchError, ConfigError};
use forestmark_comm::Communicator;
use forestmark_forest::Forest;
use std::collections::BTreeMap;

/// One scenario-specific option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioOption {
    /// Full option key, also used as the long flag
    pub key: &'static str,
    /// Default value as typed on the command line
    pub default: &'static str,
    /// Help text
    pub help: &'static str,
}

/// The scenarios known to this build
#[derive(Debug, Clone, PartialEq)]
pub enum Scenario {
    /// Uniform forest plus random refinement sized to a byte budget
    PseudoRandom(PseudoRandom),
}

impl Scenario {
    /// Registry id
    #[must_use]
    pub fn id(&self) -> &'static str {
        match self {
            Self::PseudoRandom(_) => PseudoRandom::ID,
        }
    }

    /// Options this scenario reads
    #[must_use]
    pub fn declare_options(&self) -> &'static [ScenarioOption] {
        match self {
            Self::PseudoRandom(_) => PseudoRandom::OPTIONS,
        }
    }

    /// Apply option values keyed by [`ScenarioOption::key`]
    ///
    /// Keys declared by no option of this scenario are rejected.
    pub fn configure(&mut self, options: &BTreeMap<String, String>) -> Result<(), ConfigError> {
        let declared = self.declare_options();
        if let Some(key) = options.keys().find(|k| !declared.iter().any(|o| o.key == k.as_str())) {
            return Err(ConfigError::UnknownOption {
                scenario: self.id().to_string(),
                option: key.clone(),
            });
        }
        match self {
            Self::PseudoRandom(scenario) => scenario.configure(options),
        }
    }

    /// Build the forest to write (collective)
    pub fn build_forest(&self, seed: u64, comm: &dyn Communicator) -> Result<Forest, BenchError> {
        match self {
            Self::PseudoRandom(scenario) => scenario.build_forest(seed, comm),
        }
    }
}
