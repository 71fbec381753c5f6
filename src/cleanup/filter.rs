//! Candidate selection and deterministic ordering for cleanup passes

use crate::registry::Registry;
use crate::resource::{CleanupFn, CleanupPriority, ResourceCategory};
use std::time::Duration;

/// Options controlling one cleanup pass
///
/// Allow-lists are intersected, then the exclude-lists are subtracted.
#[derive(Debug, Clone)]
pub struct CleanupOptions {
    /// Explicit id allow-list
    pub ids: Option<Vec<String>>,
    /// Category allow-list
    pub categories: Option<Vec<ResourceCategory>>,
    /// Tag any-match allow-list
    pub tags: Option<Vec<String>>,
    pub exclude_ids: Vec<String>,
    pub exclude_categories: Vec<ResourceCategory>,
    /// Skip the dependency gate entirely
    pub force: bool,
    /// Per-call timeout override, taking precedence over per-resource and
    /// category timeouts
    pub timeout: Option<Duration>,
    /// Keep processing after a resource fails (default true)
    pub continue_on_error: bool,
    /// Run mutually independent candidates concurrently
    pub parallel: bool,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            ids: None,
            categories: None,
            tags: None,
            exclude_ids: Vec::new(),
            exclude_categories: Vec::new(),
            force: false,
            timeout: None,
            continue_on_error: true,
            parallel: false,
        }
    }
}

impl CleanupOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_categories<I>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = ResourceCategory>,
    {
        self.categories = Some(categories.into_iter().collect());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn without_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_ids.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn without_categories<I>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = ResourceCategory>,
    {
        self.exclude_categories.extend(categories);
        self
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// Snapshot of one selected resource, taken at pass start
///
/// Registrations made while the pass is running do not affect this set.
pub(crate) struct Candidate {
    pub id: String,
    pub category: ResourceCategory,
    pub priority: CleanupPriority,
    pub seq: u64,
    pub dependencies: Vec<String>,
    pub timeout: Option<Duration>,
    pub cleanup: CleanupFn,
}

/// Select and order the candidate set for one pass
///
/// Order is ascending by priority, tie-broken by registration sequence,
/// which makes execution order repeatable across runs.
pub(crate) fn select(registry: &Registry, options: &CleanupOptions) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = registry
        .entries()
        .filter(|def| {
            if let Some(ids) = &options.ids {
                if !ids.iter().any(|id| *id == def.id) {
                    return false;
                }
            }
            if let Some(categories) = &options.categories {
                if !categories.contains(&def.category) {
                    return false;
                }
            }
            if let Some(tags) = &options.tags {
                if !tags.iter().any(|tag| def.tags.contains(tag)) {
                    return false;
                }
            }
            if options.exclude_ids.iter().any(|id| *id == def.id) {
                return false;
            }
            if options.exclude_categories.contains(&def.category) {
                return false;
            }
            true
        })
        .map(|def| Candidate {
            id: def.id.clone(),
            category: def.category,
            priority: def.priority,
            seq: def.seq,
            dependencies: def.dependencies.clone(),
            timeout: def.timeout,
            cleanup: def.cleanup.clone(),
        })
        .collect();

    candidates.sort_by_key(|candidate| (candidate.priority, candidate.seq));
    candidates
}
