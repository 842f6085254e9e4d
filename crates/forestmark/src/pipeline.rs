//! One benchmark run across a rank group
//!
//! Every rank runs [`run_rank`]; the phases and their collectives happen in
//! the same order everywhere. Phases that can fail locally end with a vote so
//! all ranks abort together.

use crate::config::BenchConfig;
use crate::error::BenchError;
use crate::estimate::StorageEstimator;
use crate::report::{ResultRecord, ResultReporter};
use crate::rng::{self, StreamKind};
use crate::scenario::{Scenario, ScenarioRegistry};
use crate::timing::TimingHarness;
use crate::variables::synthesize;
use forestmark_comm::{Communicator, LocalWorld};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, info_span};

/// Rank that estimates and reports
pub const REPORTING_RANK: usize = 0;

/// What rank 0 knows after a successful run
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    /// The persisted record
    pub record: ResultRecord,
    /// Where it was written
    pub results_path: PathBuf,
    /// Global element count of the written forest
    pub num_elements: u64,
}

/// Agree on a phase outcome; a peer's failure becomes [`BenchError::PeerFailed`]
fn settle<T>(
    comm: &dyn Communicator,
    phase: &'static str,
    outcome: Result<T, BenchError>,
) -> Result<T, BenchError> {
    if comm.vote(outcome.is_ok())? {
        outcome
    } else {
        Err(outcome.err().unwrap_or(BenchError::PeerFailed { phase }))
    }
}

/// The full pipeline on one rank (collective)
///
/// Returns the outcome on [`REPORTING_RANK`] and `None` elsewhere.
pub fn run_rank(
    config: &BenchConfig,
    scenario: &Scenario,
    comm: &dyn Communicator,
) -> Result<Option<RunOutcome>, BenchError> {
    let rank = comm.rank();
    let forest = settle(comm, "forest construction", scenario.build_forest(config.seed, comm))?;
    if rank == REPORTING_RANK {
        info!(
            scenario = scenario.id(),
            elements = forest.global_num_elements(),
            ranks = comm.size(),
            "forest ready"
        );
    }

    let estimate = StorageEstimator::estimate(
        &forest,
        config.num_element_wise_variables,
        REPORTING_RANK,
        comm,
    )?;

    let mut draws = rng::stream(config.seed, rank, StreamKind::Variables);
    let variables = synthesize(
        forest.local_num_elements(),
        config.num_element_wise_variables,
        &mut draws,
    );

    let mut harness = TimingHarness::new();
    let (timing, _) = harness.time_write(
        &config.output_stem(),
        &forest,
        &variables,
        &config.write_options(),
        comm,
    )?;
    let num_elements = forest.global_num_elements();
    drop(variables);
    drop(forest);

    let reported = if rank == REPORTING_RANK {
        info!("The time elapsed to write the file is: {}", timing.seconds);
        let record = ResultRecord::new(estimate, timing.seconds);
        ResultReporter::report(&record, &config.output_dir).map(|results_path| {
            Some(RunOutcome {
                record,
                results_path,
                num_elements,
            })
        })
    } else {
        Ok(None)
    };
    settle(comm, "report", reported)
}

/// Run the benchmark described by `config` on an in-process group
pub fn run(config: &BenchConfig, registry: &ScenarioRegistry) -> Result<RunOutcome, BenchError> {
    let scenario = config.scenario(registry)?;
    fs::create_dir_all(&config.output_dir).map_err(BenchError::artifact(&config.output_dir))?;
    let world = LocalWorld::new(config.ranks)?;
    info!(
        scenario = scenario.id(),
        ranks = config.ranks,
        storage_mode = %config.storage_mode,
        mpi_access = %config.mpi_access,
        netcdf_version = %config.netcdf_version,
        fill = config.fill,
        variables = config.num_element_wise_variables,
        "starting benchmark"
    );

    let mut results = world.run(|comm| {
        let _span = info_span!("rank", rank = comm.rank()).entered();
        let outcome = run_rank(config, &scenario, comm);
        if let Err(e) = &outcome {
            debug!(remote = e.is_remote(), "rank failed: {e}");
        }
        outcome
    })?;

    // a local failure is preferred over the peers' echo of it
    if let Some(index) = results.iter().position(|r| matches!(r, Err(e) if !e.is_remote())) {
        if let Err(e) = results.swap_remove(index) {
            return Err(e);
        }
    }
    match results.swap_remove(REPORTING_RANK) {
        Ok(Some(outcome)) => Ok(outcome),
        Ok(None) => Err(BenchError::PeerFailed { phase: "report" }),
        Err(e) => Err(e),
    }
}
