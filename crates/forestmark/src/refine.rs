//! Uniform forest plus one stochastic refinement pass

use crate::error::BenchError;
use crate::rng::{self, StreamKind};
use crate::solver::RefinementConfig;
use forestmark_comm::Communicator;
use forestmark_forest::{Adapt, CoarseMesh, Forest};
use rand::distr::{Bernoulli, Distribution};
use std::sync::Arc;
use tracing::debug;

/// Builds the benchmark forest from a [`RefinementConfig`]
#[derive(Debug, Clone)]
pub struct RefinementEngine {
    mesh: Arc<CoarseMesh>,
}

impl Default for RefinementEngine {
    fn default() -> Self {
        Self::new(Arc::new(CoarseMesh::hybrid_hypercube()))
    }
}

impl RefinementEngine {
    /// Engine refining `mesh`
    #[must_use]
    pub fn new(mesh: Arc<CoarseMesh>) -> Self {
        Self { mesh }
    }

    /// Uniform forest at `config.initial_level`, every element refined once
    /// more with probability `config.additional_refined_ratio`, then
    /// repartitioned (collective)
    ///
    /// The ratio is clamped to `[0, 1]`.
    pub fn build(
        &self,
        config: &RefinementConfig,
        seed: u64,
        comm: &dyn Communicator,
    ) -> Result<Forest, BenchError> {
        let ratio = config.additional_refined_ratio;
        let probability = ratio.clamp(0.0, 1.0);
        if probability != ratio {
            debug!(ratio, probability, "refinement ratio clamped");
        }
        let coin = Bernoulli::new(probability).map_err(|_| BenchError::InvalidRatio { ratio })?;

        let uniform = Forest::new_uniform(Arc::clone(&self.mesh), config.initial_level, comm)?;
        debug!(
            level = config.initial_level,
            elements = uniform.global_num_elements(),
            "uniform forest built"
        );

        let mut draws = rng::stream(seed, comm.rank(), StreamKind::Refinement);
        let adapted = uniform.adapt(comm, false, |_, _| {
            if coin.sample(&mut draws) {
                Adapt::Refine
            } else {
                Adapt::Keep
            }
        })?;
        let forest = adapted.partition(comm)?;

        debug!(
            elements = forest.global_num_elements(),
            local = forest.local_num_elements(),
            "refined forest partitioned"
        );
        Ok(forest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::solve;
    use forestmark_comm::SelfComm;

    fn build(ratio: f64, level: u8, seed: u64) -> Forest {
        let config = RefinementConfig {
            initial_level: level,
            additional_refined_ratio: ratio,
        };
        RefinementEngine::default()
            .build(&config, seed, &SelfComm::new())
            .unwrap()
    }

    #[test]
    fn ratio_bounds() {
        assert_eq!(build(0.0, 1, 1).global_num_elements(), 128);
        assert_eq!(build(1.0, 1, 1).global_num_elements(), 1024);
        // clamped rather than rejected
        assert_eq!(build(-1e-17, 1, 1).global_num_elements(), 128);
        assert_eq!(build(1.5, 0, 1).global_num_elements(), 128);
    }

    #[test]
    fn at_most_one_extra_level() {
        let forest = build(1.0, 1, 3);
        assert!(forest.elements().iter().all(|e| e.level() == 2));
    }

    #[test]
    fn same_seed_same_forest() {
        let a = build(0.3, 2, 42);
        let b = build(0.3, 2, 42);
        assert_eq!(a.elements(), b.elements());
    }

    #[test]
    fn count_follows_the_ratio() {
        let config = solve(268 * 16 * 64 * 3);
        assert_eq!(config.initial_level, 2);
        let forest = RefinementEngine::default()
            .build(&config, 5489, &SelfComm::new())
            .unwrap();
        let expected = config.expected_elements();
        let actual = forest.global_num_elements() as f64;
        // 1024 Bernoulli draws; refined count has a standard deviation near 15
        assert!((actual - expected).abs() < 7.0 * 8.0 * 15.0, "{actual} vs {expected}");
    }
}
