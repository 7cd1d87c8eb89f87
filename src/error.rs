//! Error types for the layout harness

use thiserror::Error;

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or running a suite
///
/// `ConfigError` is fatal to a run and is raised before any case starts.
/// Every other variant is scoped to a single (page, viewport) case and is
/// reported as an infrastructure error without touching sibling cases.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration (malformed suite, bad base URL, bad viewport)
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Failed to start an isolated browser context
    #[error("Browser launch failed: {0}")]
    LaunchError(String),

    /// Navigation failed (connection refused, HTTP error status, ...)
    #[error("Navigation failed: {0}")]
    NavigationError(String),

    /// Operation timed out
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// The geometry probe did not return a usable fact
    #[error("Geometry probe failed: {0}")]
    ProbeError(String),

    /// The run was cancelled before the operation completed
    #[error("Run cancelled")]
    Cancelled,

    /// Filesystem error (suite files, artifacts, static server root)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error must abort the whole run instead of a single case.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::ConfigError(_))
    }
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::CdpError(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigError(format!("suite file: {}", err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ProbeError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_config_errors_are_fatal() {
        assert!(Error::ConfigError("x".into()).is_configuration());
        assert!(!Error::Timeout(20_000).is_configuration());
        assert!(!Error::NavigationError("refused".into()).is_configuration());
        assert!(!Error::Cancelled.is_configuration());
    }

    #[test]
    fn timeout_message_names_the_budget() {
        assert_eq!(
            Error::Timeout(250).to_string(),
            "Operation timed out after 250ms"
        );
    }
}
