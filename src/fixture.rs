//! Scripted in-memory backend
//!
//! `FixtureLauncher` answers navigation and probes from a table of canned
//! `GeometryFact`s instead of a real browser. It lets the whole harness
//! (scheduling, timeouts, cancellation, reporting) run in unit tests and
//! benches without Chrome installed.

use crate::geometry::GeometryFact;
use crate::{Driver, Error, HarnessConfig, Launcher, Result, ViewportProfile};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How a fixture page behaves when navigated to
#[derive(Debug, Clone)]
pub enum FixturePage {
    /// Loads and probes as the given fact
    Loaded(GeometryFact),
    /// Navigation blocks for the given time, then succeeds with an empty page
    Hang(Duration),
    /// Navigation fails immediately (e.g. connection refused)
    Refuse(String),
}

/// Canned pages keyed by `path[#fragment]`, optionally per viewport name
#[derive(Debug, Clone, Default)]
pub struct FixtureLauncher {
    pages: HashMap<String, FixturePage>,
    per_viewport: HashMap<(String, String), FixturePage>,
    launch_error: Option<String>,
    launches: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl FixtureLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `fact` for `key` on every viewport.
    pub fn page(mut self, key: &str, fact: GeometryFact) -> Self {
        self.pages.insert(key.to_string(), FixturePage::Loaded(fact));
        self
    }

    /// Serve `fact` for `key` on one viewport only; takes precedence over `page`.
    pub fn page_on(mut self, key: &str, viewport: &str, fact: GeometryFact) -> Self {
        self.per_viewport.insert(
            (key.to_string(), viewport.to_string()),
            FixturePage::Loaded(fact),
        );
        self
    }

    pub fn hang(mut self, key: &str, duration: Duration) -> Self {
        self.pages.insert(key.to_string(), FixturePage::Hang(duration));
        self
    }

    pub fn refuse(mut self, key: &str, reason: &str) -> Self {
        self.pages
            .insert(key.to_string(), FixturePage::Refuse(reason.to_string()));
        self
    }

    /// Make every launch fail with `reason`.
    pub fn fail_launch(mut self, reason: &str) -> Self {
        self.launch_error = Some(reason.to_string());
        self
    }

    /// Number of browser contexts launched so far (one per case).
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Number of drivers closed so far, explicitly or by a dropped session.
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn lookup(&self, key: &str, viewport: &str) -> Option<FixturePage> {
        self.per_viewport
            .get(&(key.to_string(), viewport.to_string()))
            .or_else(|| self.pages.get(key))
            .cloned()
    }
}

/// Turn a URL into the fixture key: path without the leading slash, plus
/// `#fragment` when present.
fn page_key(url: &str) -> Result<String> {
    let parsed = url::Url::parse(url).map_err(|e| Error::NavigationError(format!("{}: {}", url, e)))?;
    let path = parsed.path().trim_start_matches('/');
    Ok(match parsed.fragment() {
        Some(f) => format!("{}#{}", path, f),
        None => path.to_string(),
    })
}

impl Launcher for FixtureLauncher {
    type Driver = FixtureDriver;

    fn launch(&self, viewport: &ViewportProfile, _config: &HarnessConfig) -> Result<FixtureDriver> {
        if let Some(reason) = &self.launch_error {
            return Err(Error::LaunchError(reason.clone()));
        }
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(FixtureDriver {
            launcher: self.clone(),
            viewport: viewport.name.clone(),
            current: None,
        })
    }
}

/// Driver over a `FixtureLauncher` table
pub struct FixtureDriver {
    launcher: FixtureLauncher,
    viewport: String,
    current: Option<GeometryFact>,
}

impl Driver for FixtureDriver {
    fn navigate(&mut self, url: &str) -> Result<()> {
        let key = page_key(url)?;
        match self.launcher.lookup(&key, &self.viewport) {
            Some(FixturePage::Loaded(mut fact)) => {
                fact.url = url.to_string();
                self.current = Some(fact);
                Ok(())
            }
            Some(FixturePage::Hang(d)) => {
                std::thread::sleep(d);
                self.current = Some(GeometryFact::default());
                Ok(())
            }
            Some(FixturePage::Refuse(reason)) => {
                Err(Error::NavigationError(format!("{}: {}", url, reason)))
            }
            None => {
                // Behave like a static server: the page loads, with a 404
                let mut fact = GeometryFact::new(0.0, 0.0);
                fact.url = url.to_string();
                fact.http_status = Some(404);
                self.current = Some(fact);
                Ok(())
            }
        }
    }

    fn evaluate(&mut self, _script: &str) -> Result<String> {
        let fact = self
            .current
            .as_ref()
            .ok_or_else(|| Error::ProbeError("no page loaded".into()))?;
        Ok(serde_json::to_string(fact)?)
    }

    fn screenshot(&mut self) -> Result<Vec<u8>> {
        // PNG signature only; enough for artifact plumbing
        Ok(b"\x89PNG\r\n\x1a\n".to_vec())
    }

    fn close(self) -> Result<()> {
        self.launcher.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
