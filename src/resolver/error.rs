//! Resolution error types.

use thiserror::Error;

/// Errors from one browser-driven session against the mirror service.
///
/// The two timeout variants carry the protocol step they name: the
/// pre-submission waits (landing page load, input control) expire as
/// `NavigationTimeout`, the post-submission success wait as
/// `SubmissionTimeout`.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The browser instance could not be started
    #[error("browser launch failed: {0}")]
    Launch(String),

    /// A pre-submission wait expired
    #[error("NavigationTimeout")]
    NavigationTimeout,

    /// The post-submission success wait expired
    #[error("SubmissionTimeout")]
    SubmissionTimeout,

    /// Any other CDP-level failure
    #[error("browser error: {0}")]
    Browser(String),
}

impl SessionError {
    /// Whether this failure is a wait-bound expiry (triggers diagnostics).
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::NavigationTimeout | Self::SubmissionTimeout)
    }

    /// Short reason string surfaced through [`ResolveError`].
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::NavigationTimeout => "NavigationTimeout".to_string(),
            Self::SubmissionTimeout => "SubmissionTimeout".to_string(),
            Self::Launch(detail) => format!("launch: {detail}"),
            Self::Browser(detail) => format!("browser: {detail}"),
        }
    }
}

impl From<chromiumoxide::error::CdpError> for SessionError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Self::Browser(err.to_string())
    }
}

/// A failed resolution attempt, carrying a short machine-readable reason.
#[derive(Debug, Error)]
#[error("resolution failed: {reason}")]
pub struct ResolveError {
    /// Step name or `"no-video-found"`
    pub reason: String,
}

impl ResolveError {
    /// Build an error from a reason string.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<SessionError> for ResolveError {
    fn from(err: SessionError) -> Self {
        Self::new(err.reason())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_reasons_are_step_names() {
        assert_eq!(SessionError::NavigationTimeout.reason(), "NavigationTimeout");
        assert_eq!(SessionError::SubmissionTimeout.reason(), "SubmissionTimeout");
        assert!(SessionError::NavigationTimeout.is_timeout());
        assert!(!SessionError::Launch("no chrome".into()).is_timeout());
    }

    #[test]
    fn test_resolve_error_from_session_failure() {
        let err = ResolveError::from(SessionError::SubmissionTimeout);
        assert_eq!(err.reason, "SubmissionTimeout");
        assert_eq!(err.to_string(), "resolution failed: SubmissionTimeout");
    }
}
