//! Error kind enumeration for categorizing engine errors.

/// Categorization of engine errors.
///
/// This enum provides a stable interface for matching on error types, enabling
/// the service layer to map failures onto transport status codes.
///
/// ## Retriable vs Non-Retriable
///
/// | ErrorKind          | Retriable | Action                                 |
/// |--------------------|-----------|----------------------------------------|
/// | `Unavailable`      | Yes       | Retry with backoff                     |
/// | `Timeout`          | Yes       | Retry with backoff                     |
/// | `SchemaViolation`  | No        | Fix schema/query                       |
/// | `NotFound`         | No        | The named namespace doesn't exist      |
/// | `InvalidArgument`  | No        | Fix input                              |
/// | `RevisionTooOld`   | No*       | Retry with a newer revision            |
/// | `MaxDepthExceeded` | No        | Fix the schema cycle                   |
/// | `Conflict`         | No        | Resolve conflict first                 |
/// | `Cancelled`        | No        | The caller went away                   |
/// | `Internal`         | No        | Bug                                    |
///
/// *`RevisionTooOld` succeeds when retried at a fresher revision, never when
/// retried as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Request violates the schema (unknown type, relation, permission or
    /// subject relation), or a rewrite references something undefined.
    ///
    /// gRPC: FAILED_PRECONDITION
    #[error("schema violation")]
    SchemaViolation,

    /// A namespace that had to exist was not found at the requested revision.
    ///
    /// gRPC: NOT_FOUND
    #[error("not found")]
    NotFound,

    /// Invalid request argument (malformed token, tuple text, future revision).
    ///
    /// gRPC: INVALID_ARGUMENT
    #[error("invalid argument")]
    InvalidArgument,

    /// The requested revision predates the datastore's garbage collection
    /// window.
    ///
    /// gRPC: OUT_OF_RANGE
    #[error("revision too old")]
    RevisionTooOld,

    /// Dispatch ran out of recursion depth.
    ///
    /// A schema cycle or pathological nesting; this is a configuration defect,
    /// not an absence of permission.
    ///
    /// gRPC: RESOURCE_EXHAUSTED
    #[error("max depth exceeded")]
    MaxDepthExceeded,

    /// Datastore temporarily unavailable.
    ///
    /// gRPC: UNAVAILABLE
    ///
    /// **Retriable.** Retry policy belongs to the caller.
    #[error("datastore unavailable")]
    Unavailable,

    /// A service deadline elapsed before the query completed.
    ///
    /// gRPC: DEADLINE_EXCEEDED
    #[error("timeout")]
    Timeout,

    /// Write conflicts with existing datastore state.
    ///
    /// gRPC: ALREADY_EXISTS
    #[error("conflict")]
    Conflict,

    /// The operation was cancelled.
    ///
    /// gRPC: CANCELLED
    #[error("cancelled")]
    Cancelled,

    /// Internal engine error.
    ///
    /// gRPC: INTERNAL
    #[error("internal error")]
    Internal,
}

impl ErrorKind {
    /// Returns `true` if this error kind is generally safe to retry unchanged.
    ///
    /// # Example
    ///
    /// ```rust
    /// use inferadb_graph::ErrorKind;
    ///
    /// assert!(ErrorKind::Unavailable.is_retriable());
    /// assert!(!ErrorKind::MaxDepthExceeded.is_retriable());
    /// ```
    #[inline]
    pub fn is_retriable(&self) -> bool {
        matches!(self, ErrorKind::Unavailable | ErrorKind::Timeout)
    }

    /// Returns the gRPC status code name this kind is surfaced as.
    pub fn grpc_code_name(&self) -> &'static str {
        match self {
            ErrorKind::SchemaViolation => "FAILED_PRECONDITION",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::InvalidArgument => "INVALID_ARGUMENT",
            ErrorKind::RevisionTooOld => "OUT_OF_RANGE",
            ErrorKind::MaxDepthExceeded => "RESOURCE_EXHAUSTED",
            ErrorKind::Unavailable => "UNAVAILABLE",
            ErrorKind::Timeout => "DEADLINE_EXCEEDED",
            ErrorKind::Conflict => "ALREADY_EXISTS",
            ErrorKind::Cancelled => "CANCELLED",
            ErrorKind::Internal => "INTERNAL",
        }
    }

    /// Returns the default HTTP status code for this error kind.
    #[inline]
    pub fn http_status_code(&self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::InvalidArgument | ErrorKind::SchemaViolation => 400,
            ErrorKind::RevisionTooOld => 400,
            ErrorKind::Conflict => 409,
            ErrorKind::MaxDepthExceeded => 422,
            ErrorKind::Timeout => 504,
            ErrorKind::Unavailable => 503,
            ErrorKind::Cancelled => 499, // Client Closed Request
            ErrorKind::Internal => 500,
        }
    }
}
