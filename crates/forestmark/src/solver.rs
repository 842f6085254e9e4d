//! Byte budget to refinement parameters
//!
//! The hybrid hypercube starts with 16 trees and every refinement level
//! multiplies the element count by 8. Refining a fraction `a` of the
//! elements at level `i` once more yields `(1 + 7a) * 16 * 8^i` elements.

use forestmark_forest::MAX_LEVEL;
use serde::{Deserialize, Serialize};

/// Worst-case bytes per element: shape tag, tree id, eight node slots and
/// eight nodes of three coordinates
pub const ELEMENT_COST_BYTES: u64 = 4 + 8 + 8 * 8 + 8 * 3 * 8;

/// Level-0 elements of the coarse mesh
pub const BASE_ELEMENTS: f64 = 16.0;

/// Parameters of the uniform-then-stochastic refinement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RefinementConfig {
    /// Level of the uniform forest
    pub initial_level: u8,
    /// Expected fraction of uniform elements refined once more
    ///
    /// Not clamped; slightly negative values appear when floating point
    /// rounding lands just below a level boundary.
    pub additional_refined_ratio: f64,
}

impl RefinementConfig {
    /// Expected element count after refinement
    #[must_use]
    pub fn expected_elements(&self) -> f64 {
        (1.0 + 7.0 * self.additional_refined_ratio) * BASE_ELEMENTS * level_elements(self.initial_level)
    }
}

fn level_elements(level: u8) -> f64 {
    8f64.powi(i32::from(level))
}

/// Solve for the refinement that fills `budget` bytes in expectation
#[must_use]
pub fn solve(budget: u64) -> RefinementConfig {
    let target = budget as f64 / ELEMENT_COST_BYTES as f64;

    // powers of eight are exact, so compare instead of taking a logarithm
    let mut initial_level = 0;
    while initial_level < MAX_LEVEL && BASE_ELEMENTS * level_elements(initial_level + 1) <= target {
        initial_level += 1;
    }

    let additional_refined_ratio = target / (7.0 * BASE_ELEMENTS * level_elements(initial_level)) - 1.0 / 7.0;
    RefinementConfig {
        initial_level,
        additional_refined_ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn element_cost() {
        assert_eq!(ELEMENT_COST_BYTES, 268);
    }

    #[test]
    fn one_coarse_mesh_worth_of_bytes() {
        let config = solve(4288);
        assert_eq!(config.initial_level, 0);
        assert!(config.additional_refined_ratio.abs() < 1e-12);
    }

    #[test]
    fn twice_the_coarse_mesh() {
        let config = solve(8576);
        assert_eq!(config.initial_level, 0);
        assert!((config.additional_refined_ratio - 1.0 / 7.0).abs() < 1e-12);
        assert!((config.expected_elements() - 32.0).abs() < 1e-9);
    }

    #[test]
    fn small_budgets_stay_at_level_zero() {
        for budget in [0, 1, 268, 4287] {
            let config = solve(budget);
            assert_eq!(config.initial_level, 0);
            assert!(config.additional_refined_ratio < 0.0);
        }
    }

    #[test]
    fn exact_level_boundaries() {
        // 16 * 8^3 elements
        let config = solve(268 * 16 * 512);
        assert_eq!(config.initial_level, 3);
        assert!(config.additional_refined_ratio.abs() < 1e-12);
    }

    #[test]
    fn default_budget() {
        let config = solve(1_073_741_824);
        assert_eq!(config.initial_level, 5);
        assert!((0.0..1.0).contains(&config.additional_refined_ratio));
    }

    proptest! {
        #[test]
        fn prop_level_is_largest_fitting(budget in 0u64..u64::MAX / 2) {
            let config = solve(budget);
            let target = budget as f64 / 268.0;
            let fits = |level: u8| 16.0 * 8f64.powi(i32::from(level)) <= target;
            if config.initial_level > 0 {
                prop_assert!(fits(config.initial_level));
            }
            prop_assert!(!fits(config.initial_level + 1));
        }

        #[test]
        fn prop_reconstructs_target(budget in 4288u64..1u64 << 50) {
            let config = solve(budget);
            let target = budget as f64 / 268.0;
            prop_assert!((0.0..1.0).contains(&config.additional_refined_ratio));
            let relative = (config.expected_elements() - target).abs() / target;
            prop_assert!(relative < 1e-9);
        }
    }
}
