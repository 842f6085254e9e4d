//! Testing utilities for forestmark workspace
//!
//! Shared test helpers, fixtures, and assertions.

#![allow(missing_docs)]

use forestmark::{BenchConfig, ELEMENT_COST_BYTES};
use forestmark_comm::{Communicator, LocalComm, LocalWorld};
use forestmark_forest::{CoarseMesh, Forest};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Byte budget that solves to exactly `elements` elements at level 0
pub fn budget_for_elements(elements: u64) -> u64 {
    elements * ELEMENT_COST_BYTES
}

pub fn scratch_dir() -> TempDir {
    tempfile::tempdir().unwrap()
}

pub fn small_config(dir: &Path, ranks: usize, elements: u64) -> BenchConfig {
    BenchConfig {
        ranks,
        output_dir: dir.to_path_buf(),
        scenario_options: BTreeMap::from([(
            "pseudo_random:bytes".to_string(),
            budget_for_elements(elements).to_string(),
        )]),
        ..BenchConfig::default()
    }
}

pub fn hypercube() -> Arc<CoarseMesh> {
    Arc::new(CoarseMesh::hybrid_hypercube())
}

pub fn uniform_forest(level: u8, comm: &dyn Communicator) -> Forest {
    Forest::new_uniform(hypercube(), level, comm).unwrap()
}

/// Run `program` on `ranks` in-process ranks and unwrap the group
pub fn on_ranks<T, F>(ranks: usize, program: F) -> Vec<T>
where
    F: Fn(&LocalComm) -> T + Sync,
    T: Send,
{
    LocalWorld::new(ranks).unwrap().run(program).unwrap()
}

pub fn assert_all_equal<T: PartialEq + std::fmt::Debug>(values: &[T]) {
    if let Some(first) = values.first() {
        for (rank, value) in values.iter().enumerate() {
            assert_eq!(value, first, "rank {rank} disagrees with rank 0");
        }
    }
}
