//! Pass execution: timeout racing, failure capture, dependency gating
//!
//! Each candidate's callback runs inside its own task. A timed-out operation
//! is not cancelled: the pass stops waiting for it and records a timeout
//! failure while the operation keeps running unobserved. A panicking
//! callback is contained by the task boundary and recorded as that
//! resource's failure.

use super::filter::{self, Candidate, CleanupOptions};
use super::report::{CleanupFailure, CleanupReport};
use crate::events::ResourceEvent;
use crate::manager::ManagerInner;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};
use uuid::Uuid;

struct ExecOutcome {
    result: Result<(), (String, bool)>,
    elapsed: Duration,
}

/// Run one full cleanup pass and release the manager's in-flight slot
pub(crate) async fn run_pass(inner: Arc<ManagerInner>, options: CleanupOptions) -> CleanupReport {
    let pass_id = Uuid::new_v4();
    let started = Instant::now();

    let candidates = {
        let registry = inner.registry.read().await;
        filter::select(&registry, &options)
    };

    debug!(
        "cleanup pass {} selected {} candidate(s) (force: {}, parallel: {})",
        pass_id,
        candidates.len(),
        options.force,
        options.parallel
    );
    inner.bus.emit(ResourceEvent::CleanupStarted {
        pass_id,
        candidates: candidates.len(),
        forced: options.force,
        timestamp: Utc::now(),
    });

    let mut report = CleanupReport::empty(pass_id);

    if options.parallel {
        run_parallel(&inner, &options, candidates, &mut report).await;
    } else {
        run_sequential(&inner, &options, candidates, &mut report).await;
    }

    report.success = report.failures.is_empty() || options.continue_on_error;
    report.duration = started.elapsed();

    info!(
        "cleanup pass {} finished: {} cleaned, {} failed, {} skipped in {:?}",
        pass_id,
        report.cleaned,
        report.failures.len(),
        report.skipped.len(),
        report.duration
    );
    inner.bus.emit(ResourceEvent::CleanupCompleted {
        pass_id,
        cleaned: report.cleaned,
        failed: report.failures.len(),
        skipped: report.skipped.len(),
        duration_ms: report.duration.as_millis() as u64,
        timestamp: Utc::now(),
    });

    // Release the in-flight slot; the next cleanup call starts a new pass.
    *inner.in_flight.lock().await = None;

    report
}

async fn run_sequential(
    inner: &Arc<ManagerInner>,
    options: &CleanupOptions,
    candidates: Vec<Candidate>,
    report: &mut CleanupReport,
) {
    for candidate in candidates {
        report.considered += 1;

        if !gate(inner, options, &candidate, report).await {
            continue;
        }

        let outcome = execute(inner, options, &candidate).await;
        let failed = apply(inner, report, &candidate, outcome).await;
        if failed && !options.continue_on_error {
            // Candidates not yet reached stay neither cleaned nor skipped.
            break;
        }
    }
}

async fn run_parallel(
    inner: &Arc<ManagerInner>,
    options: &CleanupOptions,
    candidates: Vec<Candidate>,
    report: &mut CleanupReport,
) {
    let mut remaining = candidates;

    while !remaining.is_empty() {
        let remaining_ids: HashSet<String> =
            remaining.iter().map(|candidate| candidate.id.clone()).collect();

        // A wave holds candidates with no dependency on a not-yet-processed
        // candidate; members of one wave are mutually independent.
        let (wave, rest): (Vec<Candidate>, Vec<Candidate>) =
            remaining.into_iter().partition(|candidate| {
                candidate
                    .dependencies
                    .iter()
                    .all(|dep| !remaining_ids.contains(dep))
            });

        if wave.is_empty() {
            // Unreachable with acyclic dependencies; bail rather than spin.
            break;
        }

        let mut runnable = Vec::new();
        for candidate in wave {
            report.considered += 1;
            if gate(inner, options, &candidate, report).await {
                runnable.push(candidate);
            }
        }

        let outcomes = futures::future::join_all(
            runnable
                .iter()
                .map(|candidate| execute(inner, options, candidate)),
        )
        .await;

        let mut any_failed = false;
        for (candidate, outcome) in runnable.iter().zip(outcomes) {
            any_failed |= apply(inner, report, candidate, outcome).await;
        }
        if any_failed && !options.continue_on_error {
            return;
        }

        remaining = rest;
    }
}

/// Decide whether a candidate actually runs: silently skip definitions that
/// are no longer active, and withhold candidates with uncleaned
/// dependencies unless the pass is forced.
///
/// A dependency id that resolves to neither an active nor a cleaned
/// definition counts as not cleaned.
async fn gate(
    inner: &Arc<ManagerInner>,
    options: &CleanupOptions,
    candidate: &Candidate,
    report: &mut CleanupReport,
) -> bool {
    let registry = inner.registry.read().await;

    if !registry.contains(&candidate.id) {
        debug!("skipping '{}': no longer active", candidate.id);
        return false;
    }

    if !options.force {
        if let Some(unmet) = candidate
            .dependencies
            .iter()
            .find(|dep| !registry.dependency_cleaned(dep))
        {
            debug!(
                "withholding '{}': dependency '{}' has not been cleaned",
                candidate.id, unmet
            );
            report.skipped.push(candidate.id.clone());
            return false;
        }
    }

    true
}

async fn execute(
    inner: &Arc<ManagerInner>,
    options: &CleanupOptions,
    candidate: &Candidate,
) -> ExecOutcome {
    let effective = options
        .timeout
        .or(candidate.timeout)
        .unwrap_or_else(|| inner.config.timeout_for(candidate.category));

    debug!(
        "cleaning '{}' ({}) with timeout {:?}",
        candidate.id, candidate.category, effective
    );

    let started = Instant::now();
    let cleanup = candidate.cleanup.clone();
    let handle = tokio::spawn(async move { (*cleanup)().await });

    let result = match tokio::time::timeout(effective, handle).await {
        Err(_) => Err((
            format!("cleanup timed out after {}ms", effective.as_millis()),
            true,
        )),
        Ok(Err(join_error)) => {
            if join_error.is_panic() {
                let payload = join_error.into_panic();
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err((format!("cleanup panicked: {message}"), false))
            } else {
                Err(("cleanup task was cancelled".to_string(), false))
            }
        }
        Ok(Ok(Err(error))) => Err((format!("{error:#}"), false)),
        Ok(Ok(Ok(()))) => Ok(()),
    };

    ExecOutcome {
        result,
        elapsed: started.elapsed(),
    }
}

/// Fold one execution outcome into registry state, events, and the report.
/// Returns whether the candidate failed.
async fn apply(
    inner: &Arc<ManagerInner>,
    report: &mut CleanupReport,
    candidate: &Candidate,
    outcome: ExecOutcome,
) -> bool {
    match outcome.result {
        Ok(()) => {
            {
                let mut registry = inner.registry.write().await;
                registry.mark_cleaned(&candidate.id);
            }
            debug!("cleaned '{}' in {:?}", candidate.id, outcome.elapsed);
            inner.bus.emit(ResourceEvent::Cleaned {
                id: candidate.id.clone(),
                category: candidate.category,
                duration_ms: outcome.elapsed.as_millis() as u64,
                timestamp: Utc::now(),
            });
            let entry = report.by_category.entry(candidate.category).or_default();
            entry.succeeded += 1;
            entry.total_duration += outcome.elapsed;
            report.cleaned += 1;
            false
        }
        Err((message, timed_out)) => {
            error!("cleanup of '{}' failed: {}", candidate.id, message);
            inner.bus.emit(ResourceEvent::CleanupFailed {
                id: candidate.id.clone(),
                category: candidate.category,
                error: message.clone(),
                timed_out,
                timestamp: Utc::now(),
            });
            let entry = report.by_category.entry(candidate.category).or_default();
            entry.failed += 1;
            entry.total_duration += outcome.elapsed;
            report.failures.push(CleanupFailure {
                resource_id: candidate.id.clone(),
                category: candidate.category,
                error: message,
                timed_out,
                timestamp: Utc::now(),
            });
            true
        }
    }
}
