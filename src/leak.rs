//! Age-based advisory leak scan
//!
//! The scan is read-only: it never cleans, removes, or otherwise mutates
//! registry state.

use crate::registry::Registry;
use crate::resource::ResourceCategory;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// One uncleaned resource older than the configured threshold
#[derive(Debug, Clone, Serialize)]
pub struct LeakFinding {
    pub resource_id: String,
    pub category: ResourceCategory,
    pub age_ms: u64,
    pub registered_at: DateTime<Utc>,
    /// Set once the age exceeds twice the threshold
    pub potential_leak: bool,
}

/// Scan active definitions for entries older than `threshold`
pub(crate) fn scan(registry: &Registry, threshold: Duration) -> Vec<LeakFinding> {
    let mut findings: Vec<LeakFinding> = registry
        .entries()
        .filter_map(|def| {
            let age = def.age();
            if age <= threshold {
                return None;
            }
            Some(LeakFinding {
                resource_id: def.id.clone(),
                category: def.category,
                age_ms: age.as_millis() as u64,
                registered_at: def.registered_at,
                potential_leak: age > threshold * 2,
            })
        })
        .collect();

    findings.sort_by(|a, b| b.age_ms.cmp(&a.age_ms));
    findings
}
