//! Aggregate result of one cleanup pass

use crate::resource::ResourceCategory;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// Structured record of one resource's failed cleanup
#[derive(Debug, Clone, Serialize)]
pub struct CleanupFailure {
    pub resource_id: String,
    pub category: ResourceCategory,
    /// Rendered underlying error
    pub error: String,
    /// Set when the timeout race was won by the timer
    pub timed_out: bool,
    pub timestamp: DateTime<Utc>,
}

/// Per-category outcome breakdown
#[derive(Debug, Clone, Default, Serialize)]
pub struct CategoryOutcome {
    pub succeeded: usize,
    pub failed: usize,
    #[serde(with = "humantime_serde")]
    pub total_duration: Duration,
}

/// Aggregate result returned by a cleanup pass
///
/// `success` is false only when a failure occurred and the caller had
/// requested `continue_on_error = false`; per-resource failures are always
/// listed in `failures` either way.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    pub pass_id: Uuid,
    pub success: bool,
    /// Candidates the pass reached (selected, ordered, and examined)
    pub considered: usize,
    /// Candidates successfully cleaned
    pub cleaned: usize,
    pub failures: Vec<CleanupFailure>,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    /// Candidates withheld by the dependency gate
    pub skipped: Vec<String>,
    pub by_category: HashMap<ResourceCategory, CategoryOutcome>,
}

impl CleanupReport {
    pub(crate) fn empty(pass_id: Uuid) -> Self {
        Self {
            pass_id,
            success: true,
            considered: 0,
            cleaned: 0,
            failures: Vec::new(),
            duration: Duration::ZERO,
            skipped: Vec::new(),
            by_category: HashMap::new(),
        }
    }

    /// Whether the pass recorded any failures
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_report_is_successful() {
        let report = CleanupReport::empty(Uuid::new_v4());
        assert!(report.success);
        assert!(!report.has_failures());
        assert_eq!(report.considered, 0);
        assert_eq!(report.cleaned, 0);
    }

    #[test]
    fn test_report_serializes() {
        let mut report = CleanupReport::empty(Uuid::new_v4());
        report.by_category.insert(
            ResourceCategory::Database,
            CategoryOutcome {
                succeeded: 1,
                failed: 0,
                total_duration: Duration::from_millis(12),
            },
        );
        let json = serde_json::to_value(&report).expect("report should serialize");
        assert_eq!(json["by_category"]["database"]["succeeded"], 1);
    }
}
