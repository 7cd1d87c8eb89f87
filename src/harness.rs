//! Suite runner
//!
//! Each (page, viewport) case is an independent async task:
//! open an isolated session, navigate, probe until the required elements
//! exist, evaluate predicates. Cases run with bounded parallelism and share
//! nothing but the append-only `ResultCollector`. A per-case error becomes
//! an infrastructure error for that case's assertions; it never aborts
//! sibling cases.

use crate::async_api::{Session, Workers};
use crate::geometry::GeometryFact;
use crate::probe::ProbePlan;
use crate::report::{AssertionResult, RunReport, Status};
use crate::suite::{Case, Filter, Suite};
use crate::{Check, Error, HarnessConfig, Launcher, Result};
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Cooperative cancellation shared by every case of a run
///
/// Cancelling stops cases that have not started and aborts in-flight cases
/// at their next suspension point. Results already collected are kept.
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        CancelHandle { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only ends on cancel
        let _ = rx.wait_for(|c| *c).await;
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Append-only result sink, safe under concurrent appends
#[derive(Clone, Default)]
pub struct ResultCollector {
    inner: Arc<Mutex<Vec<AssertionResult>>>,
}

impl ResultCollector {
    pub fn extend<I: IntoIterator<Item = AssertionResult>>(&self, results: I) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.extend(results);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of everything collected so far
    pub fn snapshot(&self) -> Vec<AssertionResult> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

enum CaseOutcome {
    Completed,
    Cancelled,
}

/// Check that something answers HTTP at the base URL before any case runs.
pub async fn preflight(base: &url::Url, timeout_ms: u64) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .build()
        .map_err(|e| Error::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
    client
        .get(base.clone())
        .send()
        .await
        .map_err(|e| Error::ConfigError(format!("base URL {} is unreachable: {}", base, e)))?;
    Ok(())
}

/// Validate the suite and configuration, then run every selected case.
///
/// Configuration problems return `Err` before any case starts; everything
/// that goes wrong inside a case is reported in the returned `RunReport`.
pub async fn run_suite<L: Launcher>(
    suite: &Suite,
    filter: &Filter,
    config: &HarnessConfig,
    launcher: L,
    cancel: CancelHandle,
) -> Result<RunReport> {
    suite.validate()?;
    let base = config.validate()?;
    let cases = suite.cases(&base, filter)?;
    info!(
        "running {} cases against {} ({} in parallel)",
        cases.len(),
        base,
        config.concurrency
    );
    Ok(run_cases(cases, config, launcher, cancel).await)
}

/// Run already-expanded cases. Results are sorted by identity, not by
/// completion order.
pub async fn run_cases<L: Launcher>(
    cases: Vec<Case>,
    config: &HarnessConfig,
    launcher: L,
    cancel: CancelHandle,
) -> RunReport {
    let launcher = Arc::new(launcher);
    let collector = ResultCollector::default();
    let workers = Workers::new();
    let total_cases = cases.len();

    let outcomes: Vec<CaseOutcome> = stream::iter(cases)
        .map(|case| {
            run_case(
                case,
                launcher.clone(),
                config.clone(),
                cancel.clone(),
                collector.clone(),
                workers.clone(),
            )
        })
        .buffer_unordered(config.concurrency.max(1))
        .collect()
        .await;

    // Aborted cases can leave a worker blocked in a driver call; give each
    // at most one navigation plus one action to release its browser.
    let grace = Duration::from_millis(config.navigation_timeout_ms + config.action_timeout_ms);
    let stragglers = workers.settle(grace).await;
    if stragglers > 0 {
        warn!("{} browser workers still busy after {:?}", stragglers, grace);
    }

    let cancelled_cases = outcomes
        .iter()
        .filter(|o| matches!(o, CaseOutcome::Cancelled))
        .count();

    let mut report = RunReport {
        total_cases,
        cancelled_cases,
        results: collector.snapshot(),
    };
    report.sort();
    report
}

async fn run_case<L: Launcher>(
    case: Case,
    launcher: Arc<L>,
    config: HarnessConfig,
    cancel: CancelHandle,
    collector: ResultCollector,
    workers: Workers,
) -> CaseOutcome {
    if cancel.is_cancelled() {
        return CaseOutcome::Cancelled;
    }
    debug!("case {} starting", case.label());
    let started = Instant::now();

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("case {} cancelled", case.label());
            return CaseOutcome::Cancelled;
        }
        r = execute(&case, launcher, &config, &workers) => r,
    };

    match outcome {
        Ok(results) => {
            debug!(
                "case {} finished in {:?}: {}/{} passed",
                case.label(),
                started.elapsed(),
                results.iter().filter(|r| r.is_passed()).count(),
                results.len()
            );
            collector.extend(results);
        }
        Err(err) => {
            warn!("case {}: {}", case.label(), err);
            let message = err.to_string();
            collector.extend(case.checks.iter().map(|p| AssertionResult {
                page: case.page.label(),
                viewport: case.viewport.name.clone(),
                predicate: p.name(),
                status: Status::InfrastructureError {
                    message: message.clone(),
                },
                fact_digest: None,
            }));
        }
    }
    CaseOutcome::Completed
}

async fn within<T>(ms: u64, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(Duration::from_millis(ms), fut)
        .await
        .map_err(|_| Error::Timeout(ms))?
}

async fn execute<L: Launcher>(
    case: &Case,
    launcher: Arc<L>,
    config: &HarnessConfig,
    workers: &Workers,
) -> Result<Vec<AssertionResult>> {
    let nav_ms = config.navigation_timeout_ms;

    let session = within(
        nav_ms,
        Session::open(launcher, case.viewport.clone(), config.clone(), workers),
    )
    .await?;
    within(nav_ms, session.navigate(case.url.as_str())).await?;

    let fact = wait_for_fact(&session, &case.plan(), config).await?;
    if fact.is_error_page() {
        return Err(Error::NavigationError(format!(
            "{} answered HTTP {}",
            case.url,
            fact.http_status.unwrap_or_default()
        )));
    }

    let digest = fact.digest();
    let results: Vec<AssertionResult> = case
        .checks
        .iter()
        .map(|p| AssertionResult {
            page: case.page.label(),
            viewport: case.viewport.name.clone(),
            predicate: p.name(),
            status: Status::from_verdict(p.evaluate(&fact)),
            fact_digest: Some(digest.clone()),
        })
        .collect();

    if let Some(dir) = &config.artifacts_dir {
        if results.iter().any(|r| !r.is_passed()) {
            if let Err(e) = save_screenshot(&session, dir, case, config.action_timeout_ms).await {
                warn!("case {}: could not save screenshot: {}", case.label(), e);
            }
        }
    }

    if let Err(e) = session.close().await {
        debug!("case {}: close failed: {}", case.label(), e);
    }
    Ok(results)
}

/// Probe until every required selector matched or the action budget ran out.
/// The last fact is returned either way; predicates report what is missing.
async fn wait_for_fact(
    session: &Session,
    plan: &ProbePlan,
    config: &HarnessConfig,
) -> Result<GeometryFact> {
    let action_ms = config.action_timeout_ms;
    let deadline = Instant::now() + Duration::from_millis(action_ms);
    let script = plan.script();

    loop {
        let raw = within(action_ms, session.evaluate(&script)).await?;
        let fact = ProbePlan::parse(&raw)?;
        let missing = plan.missing(&fact);
        if missing.is_empty() || fact.is_error_page() || Instant::now() >= deadline {
            if !missing.is_empty() {
                debug!("gave up waiting for {:?} on {}", missing, fact.url);
            }
            return Ok(fact);
        }
        tokio::time::sleep(Duration::from_millis(config.poll_interval_ms)).await;
    }
}

fn artifact_name(case: &Case) -> String {
    let page: String = case
        .page
        .label()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '_' { c } else { '_' })
        .collect();
    format!("{}__{}.png", page, case.viewport.name)
}

async fn save_screenshot(
    session: &Session,
    dir: &Path,
    case: &Case,
    action_ms: u64,
) -> Result<()> {
    let png = within(action_ms, session.screenshot()).await?;
    std::fs::create_dir_all(dir)?;
    let path = dir.join(artifact_name(case));
    std::fs::write(&path, png)?;
    info!("saved failure screenshot {}", path.display());
    Ok(())
}
