//! Forest sized to a byte budget by random refinement

use super::ScenarioOption;
use crate::error::{BenchError, ConfigError};
use crate::refine::RefinementEngine;
use crate::solver::solve;
use forestmark_comm::Communicator;
use forestmark_forest::Forest;
use std::collections::BTreeMap;
use tracing::info;

const BYTES_KEY: &str = "pseudo_random:bytes";

/// Default byte budget, 1 GiB
pub const DEFAULT_BYTES: u64 = 1 << 30;

/// Pseudo-random scenario
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PseudoRandom {
    /// Byte budget the forest is sized to
    pub bytes: u64,
}

impl Default for PseudoRandom {
    fn default() -> Self {
        Self {
            bytes: DEFAULT_BYTES,
        }
    }
}

impl PseudoRandom {
    /// Registry id
    pub const ID: &'static str = "pseudo_random";

    pub(super) const OPTIONS: &'static [ScenarioOption] = &[ScenarioOption {
        key: BYTES_KEY,
        default: "1073741824",
        help: "Approximate number of bytes the forest should occupy",
    }];

    pub(super) fn configure(&mut self, options: &BTreeMap<String, String>) -> Result<(), ConfigError> {
        if let Some(value) = options.get(BYTES_KEY) {
            self.bytes = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid(BYTES_KEY, value, "expected a non-negative integer"))?;
        }
        Ok(())
    }

    pub(super) fn build_forest(&self, seed: u64, comm: &dyn Communicator) -> Result<Forest, BenchError> {
        let config = solve(self.bytes);
        if comm.rank() == 0 {
            info!(
                bytes = self.bytes,
                initial_level = config.initial_level,
                additional_refined_ratio = config.additional_refined_ratio,
                "refinement solved"
            );
        }
        RefinementEngine::default().build(&config, seed, comm)
    }
}
