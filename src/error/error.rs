//! Main error type for the graph engine.

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;

use super::ErrorKind;

/// The primary error type for engine operations.
///
/// ```text
/// Error
/// ├── kind: ErrorKind          (category for matching)
/// ├── message: Cow<str>        (human-readable description)
/// └── source: Option           (underlying cause)
/// ```
///
/// ## Example
///
/// ```rust
/// use inferadb_graph::{Error, ErrorKind};
///
/// fn handle_error(err: Error) {
///     match err.kind() {
///         ErrorKind::SchemaViolation => println!("bad query: {}", err),
///         ErrorKind::RevisionTooOld => println!("retry with a fresher token"),
///         kind if kind.is_retriable() => println!("transient, retry"),
///         _ => println!("permanent error: {}", err),
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Cow<'static, str>,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl Error {
    /// Creates a new error with the given kind and message.
    ///
    /// # Example
    ///
    /// ```rust
    /// use inferadb_graph::{Error, ErrorKind};
    ///
    /// let err = Error::new(ErrorKind::SchemaViolation, "relation `viewer` not found");
    /// assert_eq!(err.kind(), ErrorKind::SchemaViolation);
    /// ```
    pub fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error from a kind with a default message.
    pub fn from_kind(kind: ErrorKind) -> Self {
        let message = match kind {
            ErrorKind::SchemaViolation => "schema violation",
            ErrorKind::NotFound => "not found",
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::RevisionTooOld => "revision is older than the garbage collection window",
            ErrorKind::MaxDepthExceeded => "max dispatch depth exceeded",
            ErrorKind::Unavailable => "datastore unavailable",
            ErrorKind::Timeout => "deadline exceeded",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Cancelled => "operation cancelled",
            ErrorKind::Internal => "internal error",
        };
        Self::new(kind, message)
    }

    /// Returns the error kind for categorization.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the human-readable message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns `true` if this error is generally safe to retry.
    ///
    /// Equivalent to `self.kind().is_retriable()`.
    #[inline]
    pub fn is_retriable(&self) -> bool {
        self.kind.is_retriable()
    }

    /// Sets the source error for this error.
    #[must_use]
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    // Convenience constructors for common error types

    /// Creates a schema violation error.
    pub fn schema_violation(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::SchemaViolation, message)
    }

    /// Creates a not found error.
    pub fn not_found(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    /// Creates a revision-too-old error.
    pub fn revision_too_old(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::RevisionTooOld, message)
    }

    /// Creates a max-depth-exceeded error.
    pub fn max_depth_exceeded() -> Self {
        Self::from_kind(ErrorKind::MaxDepthExceeded)
    }

    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }

    /// Creates a timeout error.
    pub fn timeout(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Creates a conflict error.
    pub fn conflict(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Creates a cancelled error.
    pub fn cancelled() -> Self {
        Self::from_kind(ErrorKind::Cancelled)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::from_kind(kind)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::invalid_argument(format!("malformed token payload: {}", err)).with_source(err)
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::invalid_argument(format!("malformed token encoding: {}", err)).with_source(err)
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            Error::cancelled()
        } else {
            Error::internal(format!("dispatch task failed: {}", err)).with_source(err)
        }
    }
}
