//! Resource model: the data shape describing one trackable resource
//!
//! Every externally-held handle (connection, descriptor, timer, socket,
//! subscription) registered with a manager is represented by a
//! [`ResourceDefinition`]. Teardown callbacks are stored uniformly as
//! deferred operations; immediate callbacks are wrapped trivially so the
//! executor never has to distinguish the two.

use crate::config::default_priority_for;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[cfg(unix)]
use std::os::fd::{FromRawFd, OwnedFd, RawFd};
#[cfg(unix)]
use std::path::PathBuf;

/// Coarse classification of a resource; supplies default priority and
/// default timeout when the registration does not override them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCategory {
    Database,
    File,
    Process,
    Timer,
    Network,
    Event,
    Critical,
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Database => "database",
            Self::File => "file",
            Self::Process => "process",
            Self::Timer => "timer",
            Self::Network => "network",
            Self::Event => "event",
            Self::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// Priority levels for cleanup scheduling; lower values run earlier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupPriority {
    /// Critical cleanup that must happen first
    Critical = 0,
    /// High priority cleanup
    High = 1,
    /// Normal priority cleanup
    Normal = 2,
    /// Low priority cleanup that can be deferred
    Low = 3,
}

/// Stored form of a teardown callback: always deferred, always shareable
pub(crate) type CleanupFn = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Trait for teardown operations carried by a dedicated type
#[async_trait]
pub trait Teardown: Send + Sync {
    /// Execute the teardown operation
    async fn run(&self) -> Result<()>;
}

/// A caller-supplied teardown action, tagged at construction as immediate or
/// deferred and stored uniformly as a deferred operation.
pub struct ResourceCleanup {
    func: CleanupFn,
}

impl ResourceCleanup {
    /// Wrap an immediate (synchronous) teardown callback
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(move || futures::future::ready(f()).boxed()),
        }
    }

    /// Wrap a deferred (asynchronous) teardown callback
    pub fn asynchronous<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            func: Arc::new(move || f().boxed()),
        }
    }

    /// Wrap a [`Teardown`] implementation
    pub fn from_task(task: Arc<dyn Teardown>) -> Self {
        Self {
            func: Arc::new(move || {
                let task = Arc::clone(&task);
                async move { task.run().await }.boxed()
            }),
        }
    }

    pub(crate) fn into_fn(self) -> CleanupFn {
        self.func
    }
}

impl fmt::Debug for ResourceCleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCleanup").finish_non_exhaustive()
    }
}

/// Optional registration parameters; unset fields derive from the category
#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
    pub category: Option<ResourceCategory>,
    pub priority: Option<CleanupPriority>,
    pub description: Option<String>,
    pub tags: HashSet<String>,
    pub timeout: Option<Duration>,
    pub dependencies: Vec<String>,
    pub metadata: HashMap<String, Value>,
}

impl RegisterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(mut self, category: ResourceCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_priority(mut self, priority: CleanupPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_dependency(mut self, id: impl Into<String>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    pub fn with_dependencies<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// One entry per registered resource
pub struct ResourceDefinition {
    pub id: String,
    pub(crate) cleanup: CleanupFn,
    pub category: ResourceCategory,
    pub priority: CleanupPriority,
    pub description: Option<String>,
    pub tags: HashSet<String>,
    pub metadata: HashMap<String, Value>,
    /// Per-resource cleanup timeout; `None` falls back to the category
    /// default, then the manager default
    pub timeout: Option<Duration>,
    pub dependencies: Vec<String>,
    pub registered_at: DateTime<Utc>,
    pub(crate) registered_instant: Instant,
    /// Registration sequence number; tie-breaks equal priorities
    pub(crate) seq: u64,
    /// Terminal flag, set exactly once just before removal
    pub(crate) cleaned: bool,
}

impl ResourceDefinition {
    pub(crate) fn new(
        id: String,
        cleanup: ResourceCleanup,
        options: RegisterOptions,
        seq: u64,
    ) -> Self {
        let category = options.category.unwrap_or(ResourceCategory::Event);
        let priority = options
            .priority
            .unwrap_or_else(|| default_priority_for(category));

        Self {
            id,
            cleanup: cleanup.into_fn(),
            category,
            priority,
            description: options.description,
            tags: options.tags,
            metadata: options.metadata,
            timeout: options.timeout,
            dependencies: options.dependencies,
            registered_at: Utc::now(),
            registered_instant: Instant::now(),
            seq,
            cleaned: false,
        }
    }

    /// Monotonic age since registration
    pub fn age(&self) -> Duration {
        self.registered_instant.elapsed()
    }
}

impl fmt::Debug for ResourceDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDefinition")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("priority", &self.priority)
            .field("tags", &self.tags)
            .field("timeout", &self.timeout)
            .field("dependencies", &self.dependencies)
            .field("registered_at", &self.registered_at)
            .field("cleaned", &self.cleaned)
            .finish_non_exhaustive()
    }
}

/// Teardown for a raw OS file descriptor
///
/// Closing happens by adopting the descriptor into an [`OwnedFd`] and
/// dropping it; close failures (already closed, EBADF) are swallowed.
#[cfg(unix)]
pub struct FdClose {
    fd: RawFd,
    path: Option<PathBuf>,
}

#[cfg(unix)]
impl FdClose {
    pub fn new(fd: RawFd, path: Option<PathBuf>) -> Self {
        Self { fd, path }
    }
}

#[cfg(unix)]
#[async_trait]
impl Teardown for FdClose {
    async fn run(&self) -> Result<()> {
        // Safety: the registration contract hands ownership of the
        // descriptor to the manager; the terminal cleaned state guarantees
        // this runs at most once.
        let _ = unsafe { OwnedFd::from_raw_fd(self.fd) };
        tracing::debug!("closed file descriptor {} ({:?})", self.fd, self.path);
        Ok(())
    }
}
