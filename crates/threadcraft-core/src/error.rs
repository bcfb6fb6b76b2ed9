//! Error types for the core library.
//!
//! Each layer gets its own enum so callers can match on exactly the failures
//! that layer can produce. Application plumbing (config files, the binary)
//! uses `anyhow` on top of these.

use thiserror::Error;

use crate::client::SessionId;
use crate::templates::StyleKey;

/// Failures from the generation client and its backends.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// No API key was available when the client was built.
    #[error("Gemini API client not initialized. Missing API key?")]
    ClientUnavailable,

    /// `send_message` was called before any session was started.
    #[error("Chat session not started. Start a session first.")]
    SessionNotStarted,

    /// The caller holds a handle to a session that has since been replaced.
    #[error("Session {expected} is no longer active (current session is {current})")]
    StaleSession { expected: SessionId, current: SessionId },

    /// Network-level failure talking to the upstream API.
    #[error("Request to Gemini failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The upstream API answered with a non-success status.
    #[error("Gemini API error {status}: {message}")]
    Upstream { status: u16, message: String },

    /// The upstream response body could not be understood.
    #[error("Failed to decode Gemini response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for GenerationError {
    /// Request URLs are dropped so credentials never reach logs or the UI.
    fn from(error: reqwest::Error) -> Self {
        GenerationError::Transport(error.without_url())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Style not found: {0}")]
    NotFound(StyleKey),
}

/// Rejections from the session controller.
///
/// Generation failures are not represented here: the controller turns those
/// into transcript entries and reports them through `TurnOutcome::Failed`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A turn is already in flight.
    #[error("A generation is already in progress")]
    Busy,

    /// A result arrived for a turn that is no longer the current one.
    #[error("Result for turn {0} arrived after the session moved on")]
    StaleTurn(uuid::Uuid),
}

/// Reasons a turn could not produce a reply.
#[derive(Error, Debug)]
pub enum TurnFailure {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// The task running the turn stopped before producing a result.
    #[error("Generation was interrupted before it finished")]
    Interrupted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_error_display() {
        let err = GenerationError::Upstream {
            status: 429,
            message: "RESOURCE_EXHAUSTED: quota".to_string(),
        };
        assert_eq!(err.to_string(), "Gemini API error 429: RESOURCE_EXHAUSTED: quota");
    }

    #[test]
    fn test_template_error_display() {
        let err = TemplateError::NotFound(StyleKey::new("STYLE_X"));
        assert_eq!(err.to_string(), "Style not found: STYLE_X");
    }

    #[test]
    fn test_turn_failure_is_transparent() {
        let failure: TurnFailure = GenerationError::SessionNotStarted.into();
        assert_eq!(
            failure.to_string(),
            "Chat session not started. Start a session first."
        );
    }
}
