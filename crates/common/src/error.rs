//! Error types shared across Lessoncast crates.

use serde::{Deserialize, Serialize};

/// Top-level error type for compositor operations.
#[derive(Debug, thiserror::Error)]
pub enum CompositorError {
    /// Invalid configuration at `initialize`.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Operation not valid in the current lifecycle state.
    #[error("State error: {message}")]
    State { message: String },

    /// Source could not be registered or addressed.
    #[error("Source error: {message}")]
    Source { message: String },

    /// Requested layout failed validation.
    #[error("Layout validation failed: {}", errors.join("; "))]
    LayoutValidation { errors: Vec<String> },

    /// A single frame failed to draw.
    #[error("Render failure: {message}")]
    Render { message: String },

    /// Unrecoverable; the compositor must be re-initialized.
    #[error("Fatal compositor error: {message}")]
    Fatal { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using CompositorError.
pub type CompositorResult<T> = Result<T, CompositorError>;

/// Serializable error category, carried by `error` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Configuration,
    State,
    Source,
    LayoutValidation,
    Render,
    Fatal,
    Io,
}

impl CompositorError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Self::State {
            message: msg.into(),
        }
    }

    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source {
            message: msg.into(),
        }
    }

    pub fn layout(errors: Vec<String>) -> Self {
        Self::LayoutValidation { errors }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal {
            message: msg.into(),
        }
    }

    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::State { .. } => ErrorKind::State,
            Self::Source { .. } => ErrorKind::Source,
            Self::LayoutValidation { .. } => ErrorKind::LayoutValidation,
            Self::Render { .. } => ErrorKind::Render,
            Self::Fatal { .. } => ErrorKind::Fatal,
            Self::Io(_) | Self::Json(_) | Self::Other(_) => ErrorKind::Io,
        }
    }

    /// Whether the error ends the compositor session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_error_joins_messages() {
        let err = CompositorError::layout(vec!["missing camera".into(), "z clash".into()]);
        assert_eq!(
            err.to_string(),
            "Layout validation failed: missing camera; z clash"
        );
        assert_eq!(err.kind(), ErrorKind::LayoutValidation);
    }

    #[test]
    fn test_only_fatal_is_fatal() {
        assert!(CompositorError::fatal("context lost").is_fatal());
        assert!(!CompositorError::render("bad frame").is_fatal());
        assert!(!CompositorError::state("not running").is_fatal());
    }

    #[test]
    fn test_error_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&ErrorKind::LayoutValidation).unwrap();
        assert_eq!(json, "\"layout-validation\"");
    }
}
