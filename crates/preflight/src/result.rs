//! Result and error types for Preflight.

use thiserror::Error;

/// Result type for Preflight operations
pub type PreflightResult<T> = Result<T, PreflightError>;

/// Errors that can occur in Preflight
#[derive(Debug, Error)]
pub enum PreflightError {
    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunchError {
        /// Error message
        message: String,
    },

    /// Page error
    #[error("Page error: {message}")]
    PageError {
        /// Error message
        message: String,
    },

    /// No page is open on the driver
    #[error("No page open: call new_page first")]
    NoPage,

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    NavigationError {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Element lookup or interaction failed
    #[error("Element {selector} unavailable: {message}")]
    ElementError {
        /// Selector that failed
        selector: String,
        /// Error message
        message: String,
    },

    /// Operation timed out
    #[error("Operation timed out after {ms}ms")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Script evaluation error
    #[error("Script evaluation failed: {message}")]
    ScriptError {
        /// Error message
        message: String,
    },

    /// Script returned a value of an unexpected shape
    #[error("Unexpected script result for {what}: {message}")]
    UnexpectedScriptResult {
        /// What was being measured
        what: String,
        /// Error message
        message: String,
    },

    /// Screenshot error
    #[error("Screenshot failed: {message}")]
    ScreenshotError {
        /// Error message
        message: String,
    },

    /// Image comparison error
    #[error("Image comparison failed: {message}")]
    ImageComparisonError {
        /// Error message
        message: String,
    },

    /// Accessibility audit engine error
    #[error("Accessibility audit failed: {message}")]
    AuditError {
        /// Error message
        message: String,
    },

    /// Target server never became reachable
    #[error("Server at {url} unreachable after {attempts} attempts")]
    ServerUnavailable {
        /// Health check URL
        url: String,
        /// Number of polls performed
        attempts: u32,
    },

    /// Server process could not be spawned
    #[error("Failed to start server: {message}")]
    ServerLaunchError {
        /// Error message
        message: String,
    },

    /// External E2E tool failed to produce a summary
    #[error("E2E run failed: {message}")]
    E2eError {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Invalid configuration: {message}")]
    ConfigError {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl PreflightError {
    /// Create a script error
    #[must_use]
    pub fn script(message: impl Into<String>) -> Self {
        Self::ScriptError {
            message: message.into(),
        }
    }

    /// Create an unexpected-script-result error
    #[must_use]
    pub fn unexpected(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnexpectedScriptResult {
            what: what.into(),
            message: message.into(),
        }
    }

    /// Create an element error
    #[must_use]
    pub fn element(selector: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ElementError {
            selector: selector.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_unavailable_message() {
        let err = PreflightError::ServerUnavailable {
            url: "http://localhost:8081".to_string(),
            attempts: 30,
        };
        let msg = err.to_string();
        assert!(msg.contains("http://localhost:8081"));
        assert!(msg.contains("30 attempts"));
    }

    #[test]
    fn test_element_error_helper() {
        let err = PreflightError::element("#root", "not found");
        assert!(err.to_string().contains("#root"));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: PreflightError = io_err.into();
        assert!(err.to_string().contains("I/O"));
    }
}
