//! Error types for ContentCurator.
//!
//! Library crates use [`CurationError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// Top-level error type for all ContentCurator operations.
#[derive(Debug, thiserror::Error)]
pub enum CurationError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Content store file could not be read, written or parsed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An operation referenced a path the store does not know about.
    #[error("no content entry for {path:?}")]
    EntryNotFound { path: PathBuf },

    /// The AI provider failed (transport, process, quota, auth...).
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The AI provider answered, but the answer cannot be trusted.
    #[error("content integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    /// Data validation error (bad arguments, empty model list, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Parse error for structured input other than AI responses.
    #[error("parse error: {message}")]
    Parse { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CurationError>;

impl CurationError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an entry-not-found error.
    pub fn entry_not_found(path: impl Into<PathBuf>) -> Self {
        Self::EntryNotFound { path: path.into() }
    }

    /// Create a storage error for a failed store file operation.
    pub fn storage_io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Storage(format!("{}: {source}", path.display()))
    }

    /// Whether this error means the persisted store itself is unusable.
    ///
    /// Batch operations stop on these; every other error, document I/O
    /// included, is reported per document and the batch moves on.
    pub fn is_store_fatal(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Whether another model in the fallback list may succeed where this failed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Provider(e) => e.kind.is_recoverable(),
            Self::Integrity(IntegrityError::ProviderErrorPassthrough { kind, .. }) => {
                kind.is_recoverable()
            }
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Provider errors
// ---------------------------------------------------------------------------

/// Classified cause of an AI provider failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Quota exhausted or rate limited. `resume_at` is set when the provider
    /// said when the limit resets.
    UsageCap { resume_at: Option<DateTime<Utc>> },
    /// Timeouts, connection failures, crashed processes, malformed replies.
    Server,
    /// Credentials rejected.
    Auth,
    /// Anything the classifier does not recognize.
    Unknown,
}

impl ProviderErrorKind {
    /// Usage-cap and server/runtime failures are retried on the next model.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::UsageCap { .. } | Self::Server)
    }

    /// Short label for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UsageCap { .. } => "usage_cap",
            Self::Server => "server",
            Self::Auth => "auth",
            Self::Unknown => "unknown",
        }
    }
}

/// A failed request to the AI provider.
#[derive(Debug, Clone, thiserror::Error)]
#[error("provider error ({label}) from {provider}/{model}: {message}", label = .kind.as_str())]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub provider: String,
    pub model: String,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Integrity errors
// ---------------------------------------------------------------------------

/// Reasons an AI response was rejected even though the request succeeded.
#[derive(Debug, Clone, thiserror::Error)]
pub enum IntegrityError {
    #[error("AI returned empty content")]
    EmptyResponse,

    #[error(
        "improved content is suspiciously short: {final_len} chars vs {original_len} original \
         (ratio {ratio:.2})"
    )]
    SuspiciouslyShort {
        original_len: usize,
        final_len: usize,
        ratio: f64,
    },

    #[error("AI response looks like a provider error ({label}): {excerpt}", label = .kind.as_str())]
    ProviderErrorPassthrough {
        kind: ProviderErrorKind,
        excerpt: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = CurationError::config("missing provider command");
        assert_eq!(err.to_string(), "config error: missing provider command");

        let err = CurationError::validation("model list is empty");
        assert!(err.to_string().contains("model list is empty"));
    }

    #[test]
    fn provider_error_display_includes_kind() {
        let err = ProviderError {
            kind: ProviderErrorKind::Auth,
            provider: "anthropic".into(),
            model: "claude-sonnet-4".into(),
            message: "invalid api key".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("auth"));
        assert!(msg.contains("anthropic/claude-sonnet-4"));
    }

    #[test]
    fn short_content_error_reports_ratio() {
        let err = IntegrityError::SuspiciouslyShort {
            original_len: 1000,
            final_len: 500,
            ratio: 0.5,
        };
        assert!(err.to_string().contains("ratio 0.50"));
    }

    #[test]
    fn recoverability() {
        let cap = CurationError::Provider(ProviderError {
            kind: ProviderErrorKind::UsageCap { resume_at: None },
            provider: "p".into(),
            model: "m".into(),
            message: "limit".into(),
        });
        assert!(cap.is_recoverable());
        assert!(!CurationError::Integrity(IntegrityError::EmptyResponse).is_recoverable());
        assert!(CurationError::Storage("bad json".into()).is_store_fatal());
        assert!(!CurationError::entry_not_found("/a.md").is_store_fatal());
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(!CurationError::io("/docs/a.md", missing).is_store_fatal());
    }
}
