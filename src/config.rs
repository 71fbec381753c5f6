//! Configuration for a resource manager instance
//!
//! Category defaults live here so that priority and timeout derivation is
//! driven by data rather than scattered match arms.

use crate::resource::{CleanupPriority, ResourceCategory};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Configuration for a [`ResourceManager`](crate::manager::ResourceManager)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Maximum number of simultaneously registered resources
    pub max_resources: usize,

    /// Fallback cleanup timeout when neither the resource nor its category
    /// carries one
    #[serde(with = "humantime_serde")]
    pub default_timeout: Duration,

    /// Age past which an uncleaned resource is reported by leak detection
    #[serde(with = "humantime_serde")]
    pub leak_threshold: Duration,

    /// Per-category cleanup timeouts; a category absent from this table
    /// falls back to `default_timeout`
    #[serde(skip, default = "default_category_timeouts")]
    pub category_timeouts: HashMap<ResourceCategory, Duration>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_resources: 1000,
            default_timeout: Duration::from_secs(5),
            leak_threshold: Duration::from_secs(60),
            category_timeouts: default_category_timeouts(),
        }
    }
}

impl ManagerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_resources(mut self, max: usize) -> Self {
        self.max_resources = max;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_leak_threshold(mut self, threshold: Duration) -> Self {
        self.leak_threshold = threshold;
        self
    }

    pub fn with_category_timeout(mut self, category: ResourceCategory, timeout: Duration) -> Self {
        self.category_timeouts.insert(category, timeout);
        self
    }

    /// Resolve the cleanup timeout for a category: the category table first,
    /// then the manager-wide default.
    pub fn timeout_for(&self, category: ResourceCategory) -> Duration {
        self.category_timeouts
            .get(&category)
            .copied()
            .unwrap_or(self.default_timeout)
    }
}

/// Default priority assigned to a category when the registration does not
/// override it. Lower values are cleaned earlier.
pub fn default_priority_for(category: ResourceCategory) -> CleanupPriority {
    match category {
        ResourceCategory::Critical => CleanupPriority::Critical,
        ResourceCategory::Database | ResourceCategory::Network | ResourceCategory::Process => {
            CleanupPriority::High
        }
        ResourceCategory::File | ResourceCategory::Timer => CleanupPriority::Normal,
        ResourceCategory::Event => CleanupPriority::Low,
    }
}

fn default_category_timeouts() -> HashMap<ResourceCategory, Duration> {
    HashMap::from([
        (ResourceCategory::Critical, Duration::from_secs(15)),
        (ResourceCategory::Database, Duration::from_secs(10)),
        (ResourceCategory::Network, Duration::from_secs(5)),
        (ResourceCategory::Process, Duration::from_secs(5)),
        (ResourceCategory::File, Duration::from_secs(2)),
        (ResourceCategory::Timer, Duration::from_secs(1)),
        (ResourceCategory::Event, Duration::from_secs(1)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_cleans_before_files() {
        assert!(
            default_priority_for(ResourceCategory::Database)
                < default_priority_for(ResourceCategory::File)
        );
    }

    #[test]
    fn test_timeout_resolution_falls_back_to_default() {
        let config = ManagerConfig::default().with_default_timeout(Duration::from_secs(7));
        assert_eq!(
            config.timeout_for(ResourceCategory::Database),
            Duration::from_secs(10)
        );

        let mut config = config;
        config.category_timeouts.clear();
        assert_eq!(
            config.timeout_for(ResourceCategory::Database),
            Duration::from_secs(7)
        );
    }

    #[test]
    fn test_config_deserializes_human_durations() {
        let config: ManagerConfig =
            serde_json::from_str(r#"{"max_resources": 5, "default_timeout": "2s"}"#)
                .expect("config should parse");
        assert_eq!(config.max_resources, 5);
        assert_eq!(config.default_timeout, Duration::from_secs(2));
        assert_eq!(config.leak_threshold, Duration::from_secs(60));
    }
}
