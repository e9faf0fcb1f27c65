//! Error types and handling
//!
//! This module provides the error types used throughout the DeepResearch client.
//! All errors implement the `ClientErrorExt` trait which provides user-friendly
//! hints and indicates whether errors are recoverable.
//!
//! # Taxonomy
//!
//! - **Transport**: network failure, non-2xx response, malformed JSON. Shown to
//!   the user as a transient message; never corrupts local history.
//! - **Invalid state**: an operation was requested that the current session
//!   cannot accept (for example confirming with no active session).
//! - **Configuration**: invalid or unreadable configuration.
//!
//! A server-reported `error` research status is *not* an error value here; it
//! is ordinary snapshot data handled by the session state machine.

use thiserror::Error;

/// Trait for client error extensions
///
/// Provides additional context for errors, including user-friendly hints and
/// recoverability information.
pub trait ClientErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is a static string, safe to display to end users.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried by re-initiating the failed action.
    fn is_recoverable(&self) -> bool;
}

/// Failure talking to the research backend
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The request never produced an HTTP response
    #[error("Network error: {0}")]
    Network(String),

    /// The backend answered with a non-2xx status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not the JSON we expected
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Main client error type
///
/// # Examples
///
/// ```
/// use sdk::errors::{ClientError, ClientErrorExt, TransportError};
///
/// let error = ClientError::from(TransportError::Network("connection refused".into()));
/// assert!(error.is_transport());
/// assert!(error.is_recoverable());
///
/// let guard = ClientError::InvalidState("no active research session".into());
/// assert!(!guard.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum ClientError {
    // Transport errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    // State machine guard errors
    #[error("Invalid state: {0}")]
    InvalidState(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Whether this error came from the HTTP transport
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Whether this error is a rejected state transition
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState(_))
    }
}

impl ClientErrorExt for ClientError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Transport(TransportError::Network(_)) => {
                "Research backend unreachable. Check your connection and the configured base URL"
            }
            Self::Transport(TransportError::Status { .. }) => {
                "Research backend rejected the request. Try again"
            }
            Self::Transport(TransportError::MalformedResponse(_)) => {
                "Research backend sent an unexpected response"
            }
            Self::InvalidState(_) => "That action is not available right now",
            Self::Config(_) => "Check your config.toml file for errors",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Io(_) => true,
            Self::InvalidState(_) | Self::Config(_) => false,
        }
    }
}
