//! Process-wide default manager and free-function wrappers
//!
//! Collaborators that do not want to manage their own instance (container
//! drivers, cache layers, provider clients) register their handles here for
//! guaranteed teardown at suite end. The instance is an explicit, separately
//! constructible object with init/reset hooks for tests rather than
//! implicit state that silently persists across unrelated test files.

use crate::cleanup::{CleanupOptions, CleanupReport};
use crate::config::ManagerConfig;
use crate::error::Result;
use crate::leak::LeakFinding;
use crate::manager::{ResourceManager, ResourceStats};
use crate::resource::{RegisterOptions, ResourceCleanup};
use once_cell::sync::Lazy;
use std::sync::RwLock;

static GLOBAL: Lazy<RwLock<Option<ResourceManager>>> = Lazy::new(|| RwLock::new(None));

/// Replace the process-wide default manager with one built from `config`
pub fn init_global(config: ManagerConfig) -> ResourceManager {
    let manager = ResourceManager::new(config);
    let mut slot = GLOBAL.write().unwrap_or_else(|e| e.into_inner());
    *slot = Some(manager.clone());
    manager
}

/// The process-wide default manager, created on first use
pub fn global_manager() -> ResourceManager {
    {
        let slot = GLOBAL.read().unwrap_or_else(|e| e.into_inner());
        if let Some(manager) = slot.as_ref() {
            return manager.clone();
        }
    }

    let mut slot = GLOBAL.write().unwrap_or_else(|e| e.into_inner());
    slot.get_or_insert_with(ResourceManager::default).clone()
}

/// Drop the process-wide default manager
///
/// Registered resources in the dropped instance are not cleaned; tests that
/// care should run [`cleanup_all_resources`] first.
pub fn reset_global() {
    let mut slot = GLOBAL.write().unwrap_or_else(|e| e.into_inner());
    *slot = None;
}

/// Register a resource with the process-wide default manager
pub async fn register_resource(
    id: impl Into<String>,
    cleanup: ResourceCleanup,
    options: RegisterOptions,
) -> Result<()> {
    global_manager().register(id, cleanup, options).await
}

/// Run an unfiltered cleanup pass on the process-wide default manager
pub async fn cleanup_all_resources() -> CleanupReport {
    global_manager().cleanup(CleanupOptions::default()).await
}

/// Statistics for the process-wide default manager
pub async fn get_resource_stats() -> ResourceStats {
    global_manager().stats().await
}

/// Leak scan on the process-wide default manager
pub async fn detect_resource_leaks() -> Vec<LeakFinding> {
    global_manager().detect_leaks().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    // One test exercises the whole global lifecycle; the default instance
    // is shared process state, so splitting these assertions across tests
    // would race under the parallel test runner.
    #[tokio::test]
    async fn test_global_lifecycle_register_cleanup_reset() {
        reset_global();

        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();
        register_resource(
            "global-db",
            ResourceCleanup::sync(move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
            RegisterOptions::default(),
        )
        .await
        .expect("registration should succeed");

        let stats = get_resource_stats().await;
        assert_eq!(stats.total, 1);
        assert!(detect_resource_leaks().await.is_empty());

        let report = cleanup_all_resources().await;
        assert!(report.success);
        assert_eq!(report.cleaned, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        // init_global swaps in a fresh instance; the old registration is
        // gone.
        let manager = init_global(ManagerConfig::default().with_max_resources(3));
        assert_eq!(manager.stats().await.total, 0);
        assert_eq!(get_resource_stats().await.total, 0);

        reset_global();
    }
}
