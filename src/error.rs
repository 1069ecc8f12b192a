//! Error types for the content studio workflow.

use thiserror::Error;

/// Result type alias for studio operations.
pub type StudioResult<T> = Result<T, StudioError>;

/// Errors that can occur while talking to the backend or driving the workflow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StudioError {
    /// Backend unreachable, connection dropped, or request timed out.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Backend executed the request but reported a failure.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Payload could not be decoded into the expected structure.
    #[error("Invalid response format: {0}")]
    InvalidResponseFormat(String),

    /// Backend succeeded but produced no usable artifact.
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// Required input is missing (e.g. video requested without image data).
    #[error("Missing precondition: {0}")]
    MissingPrecondition(String),

    /// Intent is not valid in the current workflow phase.
    #[error("Invalid phase: expected {expected}, current phase is {actual}")]
    InvalidPhase { expected: String, actual: String },

    /// Item is not in a status that accepts the requested transition.
    #[error("Invalid transition for {id}: status is {status}")]
    InvalidTransition { id: String, status: String },

    /// Entity not found in the session stores.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A guarded operation is already running.
    #[error("Busy: {0}")]
    Busy(String),

    /// Configuration could not be read or written.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StudioError {
    /// Creates a Transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Creates a Backend error.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Creates an InvalidResponseFormat error.
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponseFormat(msg.into())
    }

    /// Creates a GenerationFailed error.
    pub fn generation_failed(msg: impl Into<String>) -> Self {
        Self::GenerationFailed(msg.into())
    }

    /// Creates a MissingPrecondition error.
    pub fn missing_precondition(msg: impl Into<String>) -> Self {
        Self::MissingPrecondition(msg.into())
    }

    /// Creates an InvalidPhase error.
    pub fn invalid_phase(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::InvalidPhase {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates an InvalidTransition error.
    pub fn invalid_transition(id: impl Into<String>, status: impl Into<String>) -> Self {
        Self::InvalidTransition {
            id: id.into(),
            status: status.into(),
        }
    }

    /// Creates a NotFound error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Creates a Busy error.
    pub fn busy(what: impl Into<String>) -> Self {
        Self::Busy(what.into())
    }

    /// Creates a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Message suitable for display on an item or in the global error panel.
    ///
    /// Strips the variant prefix for backend-reported failures so the user
    /// sees what the backend said.
    pub fn user_message(&self) -> String {
        match self {
            Self::Backend(msg) | Self::GenerationFailed(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for StudioError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::InvalidResponseFormat(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StudioError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponseFormat(err.to_string())
    }
}

impl From<base64::DecodeError> for StudioError {
    fn from(err: base64::DecodeError) -> Self {
        Self::InvalidResponseFormat(format!("invalid base64 payload: {err}"))
    }
}
