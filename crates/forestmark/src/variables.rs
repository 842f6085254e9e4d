//! Synthetic element-wise payload

pub use forestmark_writer::ElementWiseVariable;
use rand::Rng;

/// Name of the `index`-th synthetic variable
#[must_use]
pub fn variable_name(index: usize) -> String {
    format!("element_wise_variable_{index}")
}

/// `count` variables of `local_element_count` uniform `i64` values each
///
/// The variables draw from `rng` one after the other.
pub fn synthesize<R: Rng>(
    local_element_count: usize,
    count: usize,
    rng: &mut R,
) -> Vec<ElementWiseVariable> {
    (0..count)
        .map(|index| {
            let values = (0..local_element_count).map(|_| rng.random::<i64>()).collect();
            ElementWiseVariable::new(variable_name(index), values)
        })
        .collect()
}
