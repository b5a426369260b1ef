//! Workspace-wide error carried to callers outside the ledger.
//!
//! Domain crates keep their own error enums and convert into [`AppError`],
//! which pairs a coarse [`ErrorClass`] with the domain's own error code.

use thiserror::Error;

/// How a failure should be treated by whoever receives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request itself is malformed.
    Invalid,
    /// The caller may not touch the referenced site.
    Forbidden,
    /// A referenced record does not exist.
    NotFound,
    /// The request clashes with the current state of a record.
    Conflict,
    /// Well-formed, but the ledger's stock rules refuse it.
    Rejected,
    /// Transient failure; the same request may succeed later.
    Unavailable,
    /// Storage or invariant failure on our side.
    Failed,
}

impl ErrorClass {
    /// HTTP status an outer surface should answer with.
    #[must_use]
    pub const fn status_code(self) -> u16 {
        match self {
            Self::Invalid => 400,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::Rejected => 422,
            Self::Unavailable => 503,
            Self::Failed => 500,
        }
    }
}

/// A classified failure with a stable machine-readable code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AppError {
    class: ErrorClass,
    code: &'static str,
    message: String,
}

impl AppError {
    pub fn new(class: ErrorClass, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            class,
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        self.class
    }

    /// Error code for API responses, e.g. `INSUFFICIENT_STOCK`.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        self.code
    }

    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.class.status_code()
    }

    /// Returns true if the caller may retry the failed operation unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.class, ErrorClass::Unavailable)
    }
}
