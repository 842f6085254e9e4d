//! Scenario registry
//!
//! Provides [`ScenarioRegistry`] for looking up scenarios by id.

use super::{PseudoRandom, Scenario, ScenarioOption};
use crate::error::ConfigError;
use indexmap::IndexMap;

/// Creates a scenario with default settings
pub type ScenarioFactory = fn() -> Scenario;

/// Scenarios by id, in registration order
#[derive(Debug, Clone, Default)]
pub struct ScenarioRegistry {
    factories: IndexMap<&'static str, ScenarioFactory>,
}

impl ScenarioRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create registry with built-in scenarios
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(PseudoRandom::ID, || Scenario::PseudoRandom(PseudoRandom::default()));
        registry
    }

    /// Register a scenario; a later registration under the same id wins
    pub fn register(&mut self, id: &'static str, factory: ScenarioFactory) {
        self.factories.insert(id, factory);
    }

    /// Check if a scenario exists
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Registered ids in registration order
    #[must_use]
    pub fn ids(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    /// Fresh scenario for `id`
    pub fn create(&self, id: &str) -> Result<Scenario, ConfigError> {
        self.factories
            .get(id)
            .map(|factory| factory())
            .ok_or_else(|| ConfigError::UnknownScenario {
                name: id.to_string(),
                available: self.ids().iter().map(ToString::to_string).collect(),
            })
    }

    /// Options of every registered scenario
    pub fn all_options(&self) -> impl Iterator<Item = &'static ScenarioOption> + '_ {
        self.factories
            .values()
            .flat_map(|factory| factory().declare_options().iter())
    }

    /// Get number of registered scenarios
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
