//! Registry: id uniqueness, dependency validation, and the dependents guard
//!
//! The registry holds active definitions only. A cleaned definition is
//! removed (bounding memory for long-lived managers) and its id recorded in
//! a cleaned-id set so dependency gating can still resolve it; a monotonic
//! counter tracks cleaned totals separately from the live size.

use crate::error::{RegistryError, Result};
use crate::resource::{RegisterOptions, ResourceCategory, ResourceCleanup, ResourceDefinition};
use std::collections::{HashMap, HashSet};

pub struct Registry {
    max_resources: usize,
    entries: HashMap<String, ResourceDefinition>,
    cleaned_ids: HashSet<String>,
    cleaned_count: u64,
    next_seq: u64,
}

impl Registry {
    pub fn new(max_resources: usize) -> Self {
        Self {
            max_resources,
            entries: HashMap::new(),
            cleaned_ids: HashSet::new(),
            cleaned_count: 0,
            next_seq: 0,
        }
    }

    /// Validate and store one definition, deriving priority from category
    /// where unset. Returns the resolved category for event emission.
    pub fn register(
        &mut self,
        id: String,
        cleanup: ResourceCleanup,
        options: RegisterOptions,
    ) -> Result<ResourceCategory> {
        if self.entries.contains_key(&id) {
            return Err(RegistryError::DuplicateResource { id });
        }
        if self.entries.len() >= self.max_resources {
            return Err(RegistryError::CapacityExceeded {
                max: self.max_resources,
            });
        }
        // Dependencies must already be known: either still active, or
        // already cleaned. Forward references are rejected, which makes
        // dependency cycles structurally impossible.
        for dependency in &options.dependencies {
            if !self.entries.contains_key(dependency) && !self.cleaned_ids.contains(dependency) {
                return Err(RegistryError::UnknownDependency {
                    id,
                    dependency: dependency.clone(),
                });
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        let definition = ResourceDefinition::new(id.clone(), cleanup, options, seq);
        let category = definition.category;
        // Re-registering an id that was previously cleaned starts a fresh
        // lifecycle for it.
        self.cleaned_ids.remove(&id);
        self.entries.insert(id, definition);
        Ok(category)
    }

    /// Remove a definition by explicit unregistration
    ///
    /// Returns `Ok(None)` when the id is not active. Fails while any other
    /// active definition lists the id as a dependency; this guard does not
    /// apply to removal via successful cleanup.
    pub fn unregister(&mut self, id: &str) -> Result<Option<ResourceCategory>> {
        if !self.entries.contains_key(id) {
            return Ok(None);
        }

        let dependents = self.dependents_of(id);
        if !dependents.is_empty() {
            return Err(RegistryError::LiveDependents {
                id: id.to_string(),
                dependents,
            });
        }

        Ok(self.entries.remove(id).map(|def| def.category))
    }

    /// Transition a definition to its terminal cleaned state
    pub fn mark_cleaned(&mut self, id: &str) -> Option<ResourceCategory> {
        let mut definition = self.entries.remove(id)?;
        definition.cleaned = true;
        self.cleaned_ids.insert(definition.id.clone());
        self.cleaned_count += 1;
        Some(definition.category)
    }

    /// Whether a dependency id counts as satisfied for the cleanup gate
    ///
    /// An id that resolves to neither an active nor a cleaned definition is
    /// conservatively treated as not cleaned, withholding its dependents.
    pub fn dependency_cleaned(&self, id: &str) -> bool {
        self.cleaned_ids.contains(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&ResourceDefinition> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cleaned_count(&self) -> u64 {
        self.cleaned_count
    }

    pub fn entries(&self) -> impl Iterator<Item = &ResourceDefinition> {
        self.entries.values()
    }

    /// Active definitions that list `id` as a dependency
    pub fn dependents_of(&self, id: &str) -> Vec<String> {
        let mut dependents: Vec<String> = self
            .entries
            .values()
            .filter(|def| def.dependencies.iter().any(|dep| dep == id))
            .map(|def| def.id.clone())
            .collect();
        dependents.sort();
        dependents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> ResourceCleanup {
        ResourceCleanup::sync(|| Ok(()))
    }

    fn registry() -> Registry {
        Registry::new(100)
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut reg = registry();
        reg.register("db".to_string(), noop(), RegisterOptions::default())
            .expect("first registration should succeed");

        let err = reg
            .register("db".to_string(), noop(), RegisterOptions::default())
            .expect_err("duplicate id should be rejected");
        assert!(matches!(err, RegistryError::DuplicateResource { id } if id == "db"));
    }

    #[test]
    fn test_capacity_enforced() {
        let mut reg = Registry::new(2);
        reg.register("a".to_string(), noop(), RegisterOptions::default())
            .expect("should fit");
        reg.register("b".to_string(), noop(), RegisterOptions::default())
            .expect("should fit");

        let err = reg
            .register("c".to_string(), noop(), RegisterOptions::default())
            .expect_err("third registration should exceed capacity");
        assert!(matches!(err, RegistryError::CapacityExceeded { max: 2 }));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let mut reg = registry();
        let err = reg
            .register(
                "cache".to_string(),
                noop(),
                RegisterOptions::new().with_dependency("db"),
            )
            .expect_err("forward reference should be rejected");
        assert!(
            matches!(err, RegistryError::UnknownDependency { dependency, .. } if dependency == "db")
        );
    }

    #[test]
    fn test_dependency_on_cleaned_resource_accepted() {
        let mut reg = registry();
        reg.register("db".to_string(), noop(), RegisterOptions::default())
            .expect("registration should succeed");
        reg.mark_cleaned("db");

        reg.register(
            "late".to_string(),
            noop(),
            RegisterOptions::new().with_dependency("db"),
        )
        .expect("dependency on a cleaned id should be accepted");
        assert!(reg.get("late").is_some());
    }

    #[test]
    fn test_unregister_blocked_by_live_dependents() {
        let mut reg = registry();
        reg.register("db".to_string(), noop(), RegisterOptions::default())
            .expect("registration should succeed");
        reg.register(
            "cache".to_string(),
            noop(),
            RegisterOptions::new().with_dependency("db"),
        )
        .expect("registration should succeed");

        let err = reg.unregister("db").expect_err("db has a live dependent");
        assert!(
            matches!(err, RegistryError::LiveDependents { dependents, .. } if dependents == vec!["cache".to_string()])
        );

        reg.unregister("cache").expect("cache has no dependents");
        let removed = reg.unregister("db").expect("db is now free");
        assert!(removed.is_some());
    }

    #[test]
    fn test_unregister_missing_returns_none() {
        let mut reg = registry();
        assert!(reg
            .unregister("ghost")
            .expect("missing id is not an error")
            .is_none());
    }

    #[test]
    fn test_mark_cleaned_updates_counter_and_gate() {
        let mut reg = registry();
        reg.register("db".to_string(), noop(), RegisterOptions::default())
            .expect("registration should succeed");

        assert!(!reg.dependency_cleaned("db"));
        assert_eq!(reg.mark_cleaned("db"), Some(ResourceCategory::Event));
        assert!(reg.dependency_cleaned("db"));
        assert_eq!(reg.cleaned_count(), 1);
        assert_eq!(reg.len(), 0);

        // Terminal: a second transition is a no-op.
        assert_eq!(reg.mark_cleaned("db"), None);
        assert_eq!(reg.cleaned_count(), 1);
    }

    #[test]
    fn test_vanished_dependency_counts_as_not_cleaned() {
        let mut reg = registry();
        // "never-there" was neither registered nor cleaned; the gate must
        // treat it conservatively.
        assert!(!reg.dependency_cleaned("never-there"));

        reg.register("solo".to_string(), noop(), RegisterOptions::default())
            .expect("registration should succeed");
        reg.unregister("solo").expect("no dependents");
        // Explicit unregistration does not count as reaching the cleaned
        // state.
        assert!(!reg.dependency_cleaned("solo"));
    }

    #[test]
    fn test_reregistering_cleaned_id_starts_fresh_lifecycle() {
        let mut reg = registry();
        reg.register("db".to_string(), noop(), RegisterOptions::default())
            .expect("registration should succeed");
        reg.mark_cleaned("db");

        reg.register("db".to_string(), noop(), RegisterOptions::default())
            .expect("cleaned id should be reusable");
        assert!(!reg.dependency_cleaned("db"));
        assert!(reg.contains("db"));
    }
}
