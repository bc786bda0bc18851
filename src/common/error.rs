//! Error types for the flow runner
//!
//! Errors below the step boundary (a single candidate query failing) are
//! recovered inside the resolver. Errors at the step boundary become a
//! `StepOutcome`. Only session acquisition errors abort a flow outright.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the flow runner
#[derive(Error, Debug)]
pub enum Error {
    // === Session Errors ===
    #[error("Failed to acquire automation session: {0}")]
    SessionAcquisition(String),

    #[error("Automation session is closed")]
    SessionClosed,

    #[error("{failed} of {total} flow(s) failed")]
    FlowsFailed { failed: usize, total: usize },

    #[error("Interrupted")]
    Interrupted,

    // === Resolution Errors ===
    #[error("No element matches '{query}'")]
    ElementNotFound { query: String },

    #[error("Invalid locator '{query}': {message}")]
    InvalidSelector { query: String, message: String },

    #[error("Step '{step}': no candidate matched within its timeout (tried: {tried})")]
    StepResolutionExhausted { step: String, tried: String },

    // === Action Errors ===
    #[error("Step '{step}': {action} failed: {message}")]
    ActionProtocol {
        step: String,
        action: String,
        message: String,
    },

    // === Diagnostics ===
    #[error("Diagnostic capture '{label}' failed: {message}")]
    DiagnosticCapture { label: String, message: String },

    // === Protocol Errors ===
    #[error("WebDriver error '{error}': {message}")]
    WebDriver { error: String, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Operation timed out after {0} ms")]
    Timeout(u64),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Invalid flow definition '{path}': {message}")]
    FlowDefinition { path: String, message: String },

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a resolution exhausted error listing every query that was tried
    pub fn resolution_exhausted<S: AsRef<str>>(step: &str, queries: &[S]) -> Self {
        Self::StepResolutionExhausted {
            step: step.to_string(),
            tried: queries
                .iter()
                .map(|q| q.as_ref())
                .collect::<Vec<_>>()
                .join(" | "),
        }
    }

    /// Create an action protocol error
    pub fn action_failed(step: &str, action: &str, message: &str) -> Self {
        Self::ActionProtocol {
            step: step.to_string(),
            action: action.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a diagnostic capture error
    pub fn capture_failed(label: &str, message: &str) -> Self {
        Self::DiagnosticCapture {
            label: label.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a flow definition error
    pub fn flow_definition(path: &str, message: impl Into<String>) -> Self {
        Self::FlowDefinition {
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// Map a W3C WebDriver error body onto an error variant
    ///
    /// `query` is the locator being evaluated, if the failing command was a
    /// find request.
    pub fn from_webdriver(error: &str, message: &str, query: Option<&str>) -> Self {
        match (error, query) {
            ("no such element", Some(q)) => Self::ElementNotFound {
                query: q.to_string(),
            },
            ("invalid selector", Some(q)) => Self::InvalidSelector {
                query: q.to_string(),
                message: message.to_string(),
            },
            ("invalid session id", _) => Self::SessionClosed,
            _ => Self::WebDriver {
                error: error.to_string(),
                message: message.to_string(),
            },
        }
    }

    /// True when the remote end reports that the element could not be found
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ElementNotFound { .. })
    }
}
