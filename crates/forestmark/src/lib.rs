//! forestmark - collective write benchmark
//!
//! Builds a pseudo-randomly refined hybrid forest sized to a byte budget,
//! writes it with its element-wise variables from every rank at once, and
//! reports how long the slowest rank took.
//!
//! # Core Concepts
//!
//! - [`BenchConfig`]: one run's settings, from defaults, TOML and flags
//! - [`Scenario`] / [`ScenarioRegistry`]: which forest is written
//! - [`solve`]: byte budget to uniform level plus refinement ratio
//! - [`TimingHarness`]: barrier, timed write, max-reduction
//! - [`ResultRecord`]: the `results.json` artifact
//! - [`SweepPlan`]: a resumable matrix of runs
//!
//! # Example
//!
//! ```rust,ignore
//! use forestmark::{run, BenchConfig, ScenarioRegistry};
//!
//! let config = BenchConfig {
//!     ranks: 4,
//!     ..BenchConfig::default()
//! };
//! let outcome = run(&config, &ScenarioRegistry::with_defaults())?;
//! println!("{} B/s", outcome.record.throughput);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod cli;
pub mod config;
pub mod error;
pub mod estimate;
pub mod logging;
pub mod pipeline;
pub mod refine;
pub mod report;
pub mod rng;
pub mod scenario;
pub mod solver;
pub mod sweep;
pub mod timing;
pub mod variables;

// Re-exports for convenience
pub use config::{BenchConfig, OUTPUT_STEM};
pub use error::{BenchError, ConfigError};
pub use estimate::{information_bytes, StorageEstimator};
pub use pipeline::{run, run_rank, RunOutcome, REPORTING_RANK};
pub use refine::RefinementEngine;
pub use report::{ResultRecord, ResultReporter, RESULTS_FILE};
pub use rng::{StreamKind, DEFAULT_SEED};
pub use scenario::{PseudoRandom, Scenario, ScenarioOption, ScenarioRegistry};
pub use solver::{solve, RefinementConfig, ELEMENT_COST_BYTES};
pub use sweep::{extract, run_sweep, SweepPlan, SweepPoint, SweepSummary};
pub use timing::{TimingHarness, TimingResult, TimingState};
pub use variables::{synthesize, variable_name, ElementWiseVariable};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
