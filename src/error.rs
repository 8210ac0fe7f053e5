//! Extraction error taxonomy.
//!
//! Every variant is recoverable: the orchestrator turns each one into
//! "no links for this server" and keeps going.

use thiserror::Error;

/// Why a single server reference produced no links.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// The fetch itself failed (network, timeout, non-2xx status).
    #[error("unreachable {url}: {reason}")]
    Unreachable { url: String, reason: String },

    /// The page was fetched but carried no recognizable source pattern.
    #[error("no recognizable source in {0}")]
    NotFound(String),

    /// No extractor claims the URL and the generic attempt found nothing.
    #[error("no extractor for {0}")]
    Unsupported(String),

    /// Deobfuscation produced structurally invalid output.
    #[error("malformed input: {0}")]
    Malformed(String),
}

impl ExtractError {
    pub(crate) fn unreachable(url: &str, reason: impl ToString) -> Self {
        Self::Unreachable {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Coarse kind, used for reporting.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unreachable { .. } => ErrorKind::Unreachable,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::Malformed(_) => ErrorKind::Malformed,
        }
    }
}

/// Discriminant of [`ExtractError`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unreachable,
    NotFound,
    Unsupported,
    Malformed,
}

pub type Result<T> = std::result::Result<T, ExtractError>;
