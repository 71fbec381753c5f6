//! # Teardown
//!
//! Resource lifecycle coordination for test suites: track externally-held
//! handles (database connections, file descriptors, timers, sockets,
//! subscriptions) registered during setup and guarantee bounded,
//! failure-tolerant teardown at suite end.
//!
//! ## Usage
//!
//! ```no_run
//! use teardown::{CleanupOptions, RegisterOptions, ResourceCategory, ResourceCleanup, ResourceManager};
//!
//! # async fn example() -> teardown::Result<()> {
//! let manager = ResourceManager::default();
//!
//! manager
//!     .register(
//!         "db-main",
//!         ResourceCleanup::asynchronous(|| async { /* close the pool */ Ok(()) }),
//!         RegisterOptions::new().with_category(ResourceCategory::Database),
//!     )
//!     .await?;
//!
//! let report = manager.cleanup(CleanupOptions::default()).await;
//! assert!(report.success);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - `resource` - Resource model: definitions, categories, priorities, teardown callbacks
//! - `registry` - Id uniqueness, dependency validation, and the dependents guard
//! - `cleanup` - Candidate selection, ordered execution under timeout racing, reporting
//! - `events` - Closed set of lifecycle notifications with observer isolation
//! - `leak` - Age-based advisory leak scan
//! - `manager` - Facade composing the above; single in-flight pass; statistics
//! - `global` - Process-wide default instance and free-function wrappers
//! - `config` - Manager configuration and category default tables

pub mod cleanup;
pub mod config;
pub mod error;
pub mod events;
pub mod global;
pub mod leak;
pub mod manager;
pub mod registry;
pub mod resource;

pub use cleanup::{CategoryOutcome, CleanupFailure, CleanupOptions, CleanupReport};
pub use config::ManagerConfig;
pub use error::{RegistryError, Result};
pub use events::{EventKind, ResourceEvent, SubscriptionId};
pub use global::{
    cleanup_all_resources, detect_resource_leaks, get_resource_stats, global_manager, init_global,
    register_resource, reset_global,
};
pub use leak::LeakFinding;
pub use manager::{ResourceManager, ResourceStats};
pub use resource::{
    CleanupPriority, RegisterOptions, ResourceCategory, ResourceCleanup, Teardown,
};

#[cfg(unix)]
pub use resource::FdClose;
