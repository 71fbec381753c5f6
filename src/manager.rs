//! Manager facade: composes registry, scheduler, executor, event bus, and
//! leak detection behind the public API
//!
//! One manager owns one private registry; distinct instances are fully
//! independent. The manager also owns the single-in-flight-pass invariant:
//! overlapping cleanup calls share one outcome instead of starting
//! independent passes.

use crate::cleanup::{executor, CleanupOptions, CleanupReport};
use crate::config::ManagerConfig;
use crate::error::Result;
use crate::events::{EventBus, EventKind, ResourceEvent, SubscriptionId};
use crate::leak::{self, LeakFinding};
use crate::registry::Registry;
use crate::resource::{CleanupPriority, RegisterOptions, ResourceCategory, ResourceCleanup};
use chrono::Utc;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

#[cfg(unix)]
use crate::resource::FdClose;
#[cfg(unix)]
use std::os::fd::RawFd;
#[cfg(unix)]
use std::path::PathBuf;

type PassFuture = Shared<BoxFuture<'static, CleanupReport>>;

/// Aggregate statistics over one manager's registry
#[derive(Debug, Clone, Serialize)]
pub struct ResourceStats {
    /// Currently registered (live) resources
    pub total: usize,
    pub by_category: HashMap<ResourceCategory, usize>,
    pub by_priority: HashMap<CleanupPriority, usize>,
    /// Monotonic count of resources cleaned over the manager's lifetime
    pub cleaned: u64,
    pub average_age_ms: u64,
    pub oldest_age_ms: u64,
    /// Live resources currently older than the leak threshold
    pub potential_leaks: usize,
}

pub(crate) struct ManagerInner {
    pub(crate) config: ManagerConfig,
    pub(crate) registry: RwLock<Registry>,
    pub(crate) bus: EventBus,
    pub(crate) in_flight: Mutex<Option<PassFuture>>,
    exit_hook: AtomicBool,
}

/// Resource lifecycle coordinator
#[derive(Clone)]
pub struct ResourceManager {
    inner: Arc<ManagerInner>,
}

impl Default for ResourceManager {
    fn default() -> Self {
        Self::new(ManagerConfig::default())
    }
}

impl ResourceManager {
    pub fn new(config: ManagerConfig) -> Self {
        let registry = Registry::new(config.max_resources);
        Self {
            inner: Arc::new(ManagerInner {
                config,
                registry: RwLock::new(registry),
                bus: EventBus::new(),
                in_flight: Mutex::new(None),
                exit_hook: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    /// Register one resource for tracked teardown
    pub async fn register(
        &self,
        id: impl Into<String>,
        cleanup: ResourceCleanup,
        options: RegisterOptions,
    ) -> Result<()> {
        let id = id.into();
        let category = {
            let mut registry = self.inner.registry.write().await;
            registry.register(id.clone(), cleanup, options)?
        };

        debug!("registered resource '{}' ({})", id, category);
        self.inner.bus.emit(ResourceEvent::Registered {
            id,
            category,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Register several resources sequentially
    ///
    /// Not transactional: a failure partway through leaves the prior
    /// successes registered and returns the first error.
    pub async fn register_batch(
        &self,
        entries: Vec<(String, ResourceCleanup, RegisterOptions)>,
    ) -> Result<usize> {
        let mut registered = 0;
        for (id, cleanup, options) in entries {
            self.register(id, cleanup, options).await?;
            registered += 1;
        }
        Ok(registered)
    }

    /// Track a raw OS file descriptor for closing at teardown
    ///
    /// Already-closed failures are swallowed. Defaults to category `file`,
    /// priority `high`.
    #[cfg(unix)]
    pub async fn register_file_descriptor(
        &self,
        id: impl Into<String>,
        fd: RawFd,
        path: Option<PathBuf>,
    ) -> Result<()> {
        let mut options = RegisterOptions::new()
            .with_category(ResourceCategory::File)
            .with_priority(CleanupPriority::High)
            .with_tag("fd");
        if let Some(path) = &path {
            options = options.with_metadata("path", serde_json::json!(path));
        }
        self.register(
            id,
            ResourceCleanup::from_task(Arc::new(FdClose::new(fd, path))),
            options,
        )
        .await
    }

    /// Remove a resource without running its cleanup
    ///
    /// Returns whether the id was found. Fails while other active
    /// definitions depend on it.
    pub async fn unregister(&self, id: &str) -> Result<bool> {
        let removed = {
            let mut registry = self.inner.registry.write().await;
            registry.unregister(id)?
        };

        match removed {
            Some(category) => {
                debug!("unregistered resource '{}'", id);
                self.inner.bus.emit(ResourceEvent::Unregistered {
                    id: id.to_string(),
                    category,
                    timestamp: Utc::now(),
                });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Run a cleanup pass over the selected candidates
    ///
    /// Only one pass runs at a time: a caller arriving while a pass is
    /// already in flight awaits that pass and receives its report; the
    /// second caller's options are not applied.
    pub async fn cleanup(&self, options: CleanupOptions) -> CleanupReport {
        let pass = {
            let mut in_flight = self.inner.in_flight.lock().await;
            match in_flight.as_ref() {
                Some(pass) => pass.clone(),
                None => {
                    let pass: PassFuture =
                        executor::run_pass(Arc::clone(&self.inner), options)
                            .boxed()
                            .shared();
                    *in_flight = Some(pass.clone());
                    pass
                }
            }
        };
        pass.await
    }

    /// Cleanup every resource in one category
    pub async fn cleanup_by_category(&self, category: ResourceCategory) -> CleanupReport {
        self.cleanup(CleanupOptions::new().with_categories([category]))
            .await
    }

    /// Cleanup an explicit list of resource ids
    pub async fn cleanup_batch<I, S>(&self, ids: I) -> CleanupReport
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cleanup(CleanupOptions::new().with_ids(ids)).await
    }

    /// Bounded forced pass for a process-exit hook to call
    pub async fn cleanup_on_exit(&self, timeout: Duration) -> CleanupReport {
        self.cleanup(
            CleanupOptions::new()
                .forced()
                .with_timeout(timeout)
                .with_continue_on_error(true),
        )
        .await
    }

    /// Advisory scan for resources that have outlived the leak threshold
    ///
    /// Read-only: findings are reported and emitted as events, never acted
    /// upon.
    pub async fn detect_leaks(&self) -> Vec<LeakFinding> {
        let findings = {
            let registry = self.inner.registry.read().await;
            leak::scan(&registry, self.inner.config.leak_threshold)
        };

        for finding in &findings {
            warn!(
                "possible resource leak: '{}' ({}) alive for {}ms",
                finding.resource_id, finding.category, finding.age_ms
            );
            self.inner.bus.emit(ResourceEvent::LeakDetected {
                id: finding.resource_id.clone(),
                category: finding.category,
                age_ms: finding.age_ms,
                potential_leak: finding.potential_leak,
                timestamp: Utc::now(),
            });
        }

        findings
    }

    /// Aggregate statistics over the live registry
    pub async fn stats(&self) -> ResourceStats {
        let registry = self.inner.registry.read().await;

        let mut by_category: HashMap<ResourceCategory, usize> = HashMap::new();
        let mut by_priority: HashMap<CleanupPriority, usize> = HashMap::new();
        let mut total_age = Duration::ZERO;
        let mut oldest_age = Duration::ZERO;
        let mut potential_leaks = 0;

        for def in registry.entries() {
            *by_category.entry(def.category).or_default() += 1;
            *by_priority.entry(def.priority).or_default() += 1;

            let age = def.age();
            total_age += age;
            oldest_age = oldest_age.max(age);
            if age > self.inner.config.leak_threshold {
                potential_leaks += 1;
            }
        }

        let total = registry.len();
        let average_age = if total > 0 {
            total_age / total as u32
        } else {
            Duration::ZERO
        };

        ResourceStats {
            total,
            by_category,
            by_priority,
            cleaned: registry.cleaned_count(),
            average_age_ms: average_age.as_millis() as u64,
            oldest_age_ms: oldest_age.as_millis() as u64,
            potential_leaks,
        }
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.inner.registry.read().await.contains(id)
    }

    pub async fn len(&self) -> usize {
        self.inner.registry.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.registry.read().await.is_empty()
    }

    /// Subscribe an observer to one event kind
    pub fn on<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&ResourceEvent) + Send + Sync + 'static,
    {
        self.inner.bus.on(kind, handler)
    }

    /// Unsubscribe an observer
    pub fn off(&self, kind: EventKind, id: SubscriptionId) -> bool {
        self.inner.bus.off(kind, id)
    }

    /// Remove every listener for one kind, or all listeners
    pub fn remove_all_listeners(&self, kind: Option<EventKind>) {
        self.inner.bus.remove_all(kind)
    }

    /// Record that a process-exit collaborator attached its hook
    ///
    /// Installing OS-level termination hooks is the collaborator's
    /// responsibility; the manager only tracks the attachment and offers
    /// [`cleanup_on_exit`](Self::cleanup_on_exit) for the hook to call.
    pub fn attach_exit_hook(&self) -> bool {
        self.inner
            .exit_hook
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn detach_exit_hook(&self) -> bool {
        self.inner
            .exit_hook
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn exit_hook_attached(&self) -> bool {
        self.inner.exit_hook.load(Ordering::SeqCst)
    }
}
