//! Results, summaries and exit codes

use crate::predicate::{Measurements, Verdict};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use std::path::Path;

/// Outcome of one assertion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Status {
    Passed,
    /// The predicate rejected successfully measured geometry
    Failed {
        message: String,
        measurements: Measurements,
    },
    /// The environment, not the layout, broke: navigation failure, timeout,
    /// missing expected element
    InfrastructureError { message: String },
}

impl Status {
    pub fn from_verdict(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Pass => Status::Passed,
            Verdict::Fail {
                message,
                measurements,
            } => Status::Failed {
                message,
                measurements,
            },
            Verdict::Missing { selector } => Status::InfrastructureError {
                message: format!("expected element `{}` not found within the wait budget", selector),
            },
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, Status::Passed)
    }
}

/// One predicate evaluated on one (page, viewport) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionResult {
    pub page: String,
    pub viewport: String,
    pub predicate: String,
    #[serde(flatten)]
    pub status: Status,
    /// Digest of the fact the predicate saw; absent when no fact was captured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fact_digest: Option<String>,
}

impl AssertionResult {
    pub fn is_passed(&self) -> bool {
        self.status.is_passed()
    }
}

impl fmt::Display for AssertionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            Status::Passed => write!(f, "PASS  {} @ {} :: {}", self.page, self.viewport, self.predicate),
            Status::Failed {
                message,
                measurements,
            } => {
                write!(
                    f,
                    "FAIL  {} @ {} :: {}: {}",
                    self.page, self.viewport, self.predicate, message
                )?;
                for (k, v) in measurements {
                    write!(f, "\n        {} = {}", k, v)?;
                }
                Ok(())
            }
            Status::InfrastructureError { message } => write!(
                f,
                "ERROR {} @ {} :: {}: {}",
                self.page, self.viewport, self.predicate, message
            ),
        }
    }
}

/// Counts over a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Summary {
    pub total_cases: usize,
    pub cancelled_cases: usize,
    pub assertions: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
}

impl Summary {
    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.errors == 0 && self.cancelled_cases == 0 && self.assertions > 0
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cases, {} assertions: {} passed, {} failed, {} errors",
            self.total_cases, self.assertions, self.passed, self.failed, self.errors
        )?;
        if self.cancelled_cases > 0 {
            write!(f, ", {} cases cancelled", self.cancelled_cases)?;
        }
        Ok(())
    }
}

/// Everything a run produced
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub total_cases: usize,
    pub cancelled_cases: usize,
    pub results: Vec<AssertionResult>,
}

impl RunReport {
    pub fn summary(&self) -> Summary {
        let mut s = Summary {
            total_cases: self.total_cases,
            cancelled_cases: self.cancelled_cases,
            assertions: self.results.len(),
            ..Summary::default()
        };
        for r in &self.results {
            match r.status {
                Status::Passed => s.passed += 1,
                Status::Failed { .. } => s.failed += 1,
                Status::InfrastructureError { .. } => s.errors += 1,
            }
        }
        s
    }

    /// Results in a stable (page, viewport, predicate) order, whatever order
    /// the cases finished in.
    pub fn sort(&mut self) {
        self.results.sort_by(|a, b| {
            (&a.page, &a.viewport, &a.predicate).cmp(&(&b.page, &b.viewport, &b.predicate))
        });
    }

    pub fn failures(&self) -> impl Iterator<Item = &AssertionResult> {
        self.results.iter().filter(|r| !r.is_passed())
    }

    /// 0 iff every assertion of every case passed and nothing was cancelled
    pub fn exit_code(&self) -> i32 {
        if self.summary().all_passed() {
            0
        } else {
            1
        }
    }

    /// Human-readable report: every non-passing assertion in full, then the summary
    pub fn render_text(&self, verbose: bool) -> String {
        let mut out = String::new();
        for r in &self.results {
            if verbose || !r.is_passed() {
                let _ = writeln!(out, "{}", r);
            }
        }
        let _ = writeln!(out, "{}", self.summary());
        out
    }

    pub fn write_json(&self, path: &Path) -> crate::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
