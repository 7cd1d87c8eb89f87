//! layoutprobe: a layout assertion harness
//!
//! Drives a headless browser over a matrix of pages x viewport profiles,
//! extracts CSS box geometry from each loaded page and checks a fixed set of
//! declarative layout predicates against it (no horizontal overflow, hero
//! visibility and padding, image aspect ratios, card symmetry, stacking order
//! on narrow viewports).
//!
//! # Features
//!
//! - **CDP Backend** (default): measures pages in headless Chrome via the
//!   Chrome DevTools Protocol
//! - **Pure predicates**: every check is a synchronous function over a
//!   `GeometryFact`, testable without a browser
//! - **Case isolation**: each (page, viewport) pair runs in its own browser
//!   context; one failing case never aborts its siblings
//!
//! # Example
//!
//! ```no_run
//! use layoutprobe::{harness, HarnessConfig, suite::{Filter, Suite}};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HarnessConfig {
//!     base_url: "http://localhost:4173".to_string(),
//!     ..Default::default()
//! };
//! let launcher = layoutprobe::cdp::CdpLauncher::default();
//! let report = harness::run_suite(
//!     &Suite::builtin(),
//!     &Filter::default(),
//!     &config,
//!     launcher,
//!     harness::CancelHandle::new(),
//! )
//! .await?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod error;
pub use error::{Error, Result};

pub mod geometry;
pub mod predicate;
pub mod probe;
pub mod suite;
pub mod viewport;

#[cfg(feature = "cdp")]
pub mod cdp;

// Async session facade over a driver owned by a worker thread
pub mod async_api;

pub mod fixture;
pub mod harness;
pub mod report;
pub mod serve;

pub use geometry::GeometryFact;
pub use predicate::{Check, Predicate, Verdict};
pub use report::{AssertionResult, RunReport, Status};
pub use suite::{PageSpec, Suite};
pub use viewport::ViewportProfile;

/// Harness configuration
///
/// The defaults mirror the site's dev setup: a static server on port 4173,
/// 20s to navigate, 15s for any other browser action.
///
/// # Examples
///
/// ```
/// let cfg = layoutprobe::HarnessConfig::default();
/// assert_eq!(cfg.navigation_timeout_ms, 20_000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Base URL every page path is resolved against
    pub base_url: String,
    /// Budget for navigation + load completion, in milliseconds
    pub navigation_timeout_ms: u64,
    /// Budget for any other browser action, including waiting for
    /// required elements to appear
    pub action_timeout_ms: u64,
    /// Delay between probe attempts while waiting for required elements
    pub poll_interval_ms: u64,
    /// Cases run in parallel
    pub concurrency: usize,
    /// Directory for failure screenshots; none are taken when unset
    pub artifacts_dir: Option<PathBuf>,
    /// Chrome/Chromium executable; auto-detected when unset
    pub chrome_path: Option<PathBuf>,
    /// Run the browser without a window
    pub headless: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4173".to_string(),
            navigation_timeout_ms: 20_000,
            action_timeout_ms: 15_000,
            poll_interval_ms: 100,
            concurrency: num_cpus::get().max(1),
            artifacts_dir: None,
            chrome_path: None,
            headless: true,
        }
    }
}

impl HarnessConfig {
    /// Parse and check the base URL and the numeric budgets.
    pub fn validate(&self) -> Result<url::Url> {
        let mut base = url::Url::parse(&self.base_url)
            .map_err(|e| Error::ConfigError(format!("base URL `{}`: {}", self.base_url, e)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(Error::ConfigError(format!(
                "base URL `{}` must use http or https",
                self.base_url
            )));
        }
        if self.navigation_timeout_ms == 0 || self.action_timeout_ms == 0 {
            return Err(Error::ConfigError("timeouts must be non-zero".into()));
        }
        if self.concurrency == 0 {
            return Err(Error::ConfigError("concurrency must be at least 1".into()));
        }
        // Resolve page paths under the base path, not beside it
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(base)
    }
}

/// A single isolated browser context, driven from one thread
///
/// Implementations only need to be usable from the thread that created
/// them; `async_api::Session` moves all calls onto that thread.
pub trait Driver {
    /// Navigate to `url` and wait for the load event, bounded by the
    /// navigation timeout the driver was launched with.
    fn navigate(&mut self, url: &str) -> Result<()>;

    /// Evaluate a script in the page and return its result as JSON text.
    fn evaluate(&mut self, script: &str) -> Result<String>;

    /// Capture the current viewport as PNG bytes.
    fn screenshot(&mut self) -> Result<Vec<u8>>;

    /// Close the context and release the browser process.
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// Creates one `Driver` per case, sized to the case's viewport
pub trait Launcher: Send + Sync + 'static {
    type Driver: Driver + 'static;

    fn launch(&self, viewport: &ViewportProfile, config: &HarnessConfig) -> Result<Self::Driver>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HarnessConfig::default();
        assert_eq!(config.base_url, "http://localhost:4173");
        assert_eq!(config.action_timeout_ms, 15_000);
        assert!(config.concurrency >= 1);
        assert!(config.headless);
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let cfg = HarnessConfig {
            base_url: "http://127.0.0.1:4173/site".into(),
            ..Default::default()
        };
        assert_eq!(cfg.validate().unwrap().as_str(), "http://127.0.0.1:4173/site/");
    }

    #[test]
    fn malformed_base_url_is_rejected() {
        for bad in ["not a url", "ftp://localhost/", "file:///tmp/site"] {
            let cfg = HarnessConfig {
                base_url: bad.into(),
                ..Default::default()
            };
            assert!(cfg.validate().unwrap_err().is_configuration(), "{}", bad);
        }
    }

    #[test]
    fn harness_table_parses_from_toml() {
        let cfg: HarnessConfig =
            toml::from_str("base_url = \"http://127.0.0.1:8080\"\nnavigation_timeout_ms = 500\n").unwrap();
        assert_eq!(cfg.navigation_timeout_ms, 500);
        assert_eq!(cfg.action_timeout_ms, 15_000);
    }
}
