//! End-to-end lifecycle scenarios against the public API

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use teardown::{
    CleanupOptions, ManagerConfig, RegisterOptions, RegistryError, ResourceCategory,
    ResourceCleanup, ResourceManager,
};

fn recording(log: Arc<Mutex<Vec<String>>>, id: &str) -> ResourceCleanup {
    let id = id.to_string();
    ResourceCleanup::sync(move || {
        log.lock().expect("order log lock").push(id.clone());
        Ok(())
    })
}

#[tokio::test]
async fn test_database_then_dependent_cache_teardown() {
    let manager = ResourceManager::default();
    let log = Arc::new(Mutex::new(Vec::new()));

    manager
        .register(
            "db",
            recording(log.clone(), "db"),
            RegisterOptions::new().with_category(ResourceCategory::Database),
        )
        .await
        .expect("db registration should succeed");
    manager
        .register(
            "cache",
            recording(log.clone(), "cache"),
            RegisterOptions::new()
                .with_category(ResourceCategory::File)
                .with_dependency("db"),
        )
        .await
        .expect("cache registration should succeed");

    let report = manager.cleanup(CleanupOptions::default()).await;

    assert!(report.success);
    assert_eq!(report.cleaned, 2);
    assert_eq!(
        *log.lock().expect("order log lock"),
        vec!["db", "cache"],
        "database priority orders db first; cache's dependency is then satisfied"
    );

    let stats = manager.stats().await;
    assert_eq!(stats.total, 0);
    assert_eq!(stats.cleaned, 2);
}

#[tokio::test]
async fn test_capacity_limit_keeps_registry_size() {
    let manager = ResourceManager::new(ManagerConfig::default().with_max_resources(2));

    for id in ["a", "b"] {
        manager
            .register(id, ResourceCleanup::sync(|| Ok(())), RegisterOptions::default())
            .await
            .expect("registration within capacity should succeed");
    }

    let err = manager
        .register("c", ResourceCleanup::sync(|| Ok(())), RegisterOptions::default())
        .await
        .expect_err("third registration should exceed capacity");
    assert!(matches!(err, RegistryError::CapacityExceeded { max: 2 }));
    assert_eq!(manager.len().await, 2);
}

#[tokio::test]
async fn test_dependent_protection_until_dependent_removed() {
    let manager = ResourceManager::default();

    manager
        .register(
            "db",
            ResourceCleanup::sync(|| Ok(())),
            RegisterOptions::new().with_category(ResourceCategory::Database),
        )
        .await
        .expect("db registration should succeed");
    manager
        .register(
            "cache",
            ResourceCleanup::sync(|| Ok(())),
            RegisterOptions::new().with_dependency("db"),
        )
        .await
        .expect("cache registration should succeed");

    let err = manager
        .unregister("db")
        .await
        .expect_err("db still has a live dependent");
    assert!(matches!(err, RegistryError::LiveDependents { .. }));
    assert!(manager.contains("db").await);

    assert!(manager
        .unregister("cache")
        .await
        .expect("cache has no dependents"));
    assert!(manager.unregister("db").await.expect("db is now free"));
    assert!(!manager.unregister("db").await.expect("absent id is not an error"));
}

#[tokio::test]
async fn test_category_scoped_cleanup_leaves_others_alone() {
    let manager = ResourceManager::default();
    let log = Arc::new(Mutex::new(Vec::new()));

    manager
        .register(
            "db",
            recording(log.clone(), "db"),
            RegisterOptions::new().with_category(ResourceCategory::Database),
        )
        .await
        .expect("registration should succeed");
    manager
        .register(
            "tmp-file",
            recording(log.clone(), "tmp-file"),
            RegisterOptions::new().with_category(ResourceCategory::File),
        )
        .await
        .expect("registration should succeed");

    let report = manager.cleanup_by_category(ResourceCategory::File).await;
    assert_eq!(report.cleaned, 1);
    assert_eq!(*log.lock().expect("order log lock"), vec!["tmp-file"]);
    assert!(manager.contains("db").await);

    let report = manager.cleanup_batch(["db"]).await;
    assert_eq!(report.cleaned, 1);
    assert!(manager.is_empty().await);
}

#[tokio::test]
async fn test_tag_filter_with_exclusions() {
    let manager = ResourceManager::default();
    let cleaned = Arc::new(AtomicUsize::new(0));

    for (id, tag) in [("one", "scratch"), ("two", "scratch"), ("three", "keep")] {
        let cleaned = cleaned.clone();
        manager
            .register(
                id,
                ResourceCleanup::sync(move || {
                    cleaned.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
                RegisterOptions::new().with_tag(tag),
            )
            .await
            .expect("registration should succeed");
    }

    let report = manager
        .cleanup(
            CleanupOptions::new()
                .with_tags(["scratch"])
                .without_ids(["two"]),
        )
        .await;

    assert_eq!(report.cleaned, 1);
    assert_eq!(cleaned.load(Ordering::SeqCst), 1);
    assert!(manager.contains("two").await);
    assert!(manager.contains("three").await);
}

#[tokio::test]
async fn test_leak_detection_thresholds_end_to_end() {
    let manager = ResourceManager::new(
        ManagerConfig::default().with_leak_threshold(Duration::from_millis(100)),
    );

    manager
        .register(
            "lingering",
            ResourceCleanup::sync(|| Ok(())),
            RegisterOptions::default(),
        )
        .await
        .expect("registration should succeed");
    manager
        .register(
            "short-lived",
            ResourceCleanup::sync(|| Ok(())),
            RegisterOptions::default(),
        )
        .await
        .expect("registration should succeed");

    assert!(manager.detect_leaks().await.is_empty());

    manager.cleanup_batch(["short-lived"]).await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    let findings = manager.detect_leaks().await;
    assert_eq!(findings.len(), 1, "cleaned resources are never reported");
    assert_eq!(findings[0].resource_id, "lingering");
    assert!(!findings[0].potential_leak);

    tokio::time::sleep(Duration::from_millis(150)).await;
    let findings = manager.detect_leaks().await;
    assert!(
        findings[0].potential_leak,
        "age beyond twice the threshold flags a potential leak"
    );

    // Detection is advisory only.
    assert!(manager.contains("lingering").await);
}

#[cfg(unix)]
#[tokio::test]
async fn test_file_descriptor_helper_closes_on_cleanup() {
    use std::os::fd::IntoRawFd;

    let manager = ResourceManager::default();

    let file = tempfile::tempfile().expect("tempfile should open");
    let fd = file.into_raw_fd();
    assert!(unsafe { libc::fcntl(fd, libc::F_GETFD) } >= 0);

    manager
        .register_file_descriptor("scratch-fd", fd, None)
        .await
        .expect("fd registration should succeed");

    let report = manager.cleanup(CleanupOptions::default()).await;
    assert!(report.success);
    assert_eq!(report.cleaned, 1);
    assert!(
        unsafe { libc::fcntl(fd, libc::F_GETFD) } < 0,
        "descriptor should be closed after cleanup"
    );
}
