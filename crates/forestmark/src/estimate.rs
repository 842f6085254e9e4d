//! Expected dataset size

use crate::error::BenchError;
use forestmark_comm::{Communicator, ReduceOp};
use forestmark_forest::Forest;
use tracing::debug;

/// Bytes per element of the shape tag, tree id and node slot columns
const ELEMENT_BYTES: u64 = 4 + 8 + 8 * 8;

/// Bytes per node: three coordinates
const NODE_BYTES: u64 = 3 * 8;

/// Bytes per element of each element-wise variable
const VARIABLE_BYTES: u64 = 8;

/// Collective storage estimate
#[derive(Debug, Clone, Copy, Default)]
pub struct StorageEstimator;

impl StorageEstimator {
    /// Expected information bytes of `forest` with `num_variables` variables
    /// (collective)
    ///
    /// Only `reporting_rank` receives the node total; every other rank gets 0.
    pub fn estimate(
        forest: &Forest,
        num_variables: usize,
        reporting_rank: usize,
        comm: &dyn Communicator,
    ) -> Result<u64, BenchError> {
        let local_nodes = forest.local_num_vertices();
        let Some(nodes) = comm.reduce_u64(local_nodes, ReduceOp::Sum, reporting_rank)? else {
            return Ok(0);
        };

        let elements = forest.global_num_elements();
        let bytes = information_bytes(elements, nodes, num_variables as u64);
        debug!(elements, nodes, num_variables, bytes, "storage estimated");
        Ok(bytes)
    }
}

/// `E*4 + E*8 + E*64 + N*24 + V*E*8`, saturating
#[must_use]
pub fn information_bytes(elements: u64, nodes: u64, num_variables: u64) -> u64 {
    elements
        .saturating_mul(ELEMENT_BYTES)
        .saturating_add(nodes.saturating_mul(NODE_BYTES))
        .saturating_add(num_variables.saturating_mul(elements).saturating_mul(VARIABLE_BYTES))
}

#[cfg(test)]
mod tests {
    use super::*;
    use forestmark_comm::{LocalWorld, SelfComm};
    use forestmark_forest::CoarseMesh;
    use std::sync::Arc;

    #[test]
    fn formula() {
        assert_eq!(information_bytes(1, 8, 0), 76 + 192);
        assert_eq!(information_bytes(10, 60, 2), 760 + 1440 + 160);
        assert_eq!(information_bytes(u64::MAX, 1, 1), u64::MAX);
    }

    #[test]
    fn level_zero_hypercube() {
        let comm = SelfComm::new();
        let forest = Forest::new_uniform(Arc::new(CoarseMesh::hybrid_hypercube()), 0, &comm).unwrap();
        let bytes = StorageEstimator::estimate(&forest, 1, 0, &comm).unwrap();
        // 92 nodes
        assert_eq!(bytes, 16 * 76 + 92 * 24 + 16 * 8);
    }

    #[test]
    fn only_the_reporting_rank_sees_the_total() {
        let world = LocalWorld::new(3).unwrap();
        let mesh = Arc::new(CoarseMesh::hybrid_hypercube());
        let estimates = world
            .run(|comm| {
                let forest = Forest::new_uniform(Arc::clone(&mesh), 1, comm).unwrap();
                StorageEstimator::estimate(&forest, 0, 1, comm).unwrap()
            })
            .unwrap();
        assert_eq!(estimates[0], 0);
        assert_eq!(estimates[2], 0);
        assert_eq!(estimates[1], 128 * 76 + 8 * 92 * 24);
    }
}
