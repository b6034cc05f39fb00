use thiserror::Error;

/// Errors surfaced by gateway operations.
///
/// Every variant carries a human-readable reason that is safe to show to the
/// client in an `error` event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("persistence failed: {0}")]
    PersistenceFailed(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("transport failed: {0}")]
    TransportFailed(String),

    #[error("timed out: {0}")]
    Timeout(String),
}

impl GatewayError {
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized(reason.into())
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::ValidationFailed(reason.into())
    }
}

impl From<TransportError> for GatewayError {
    fn from(e: TransportError) -> Self {
        Self::TransportFailed(e.to_string())
    }
}

impl From<IdentityError> for GatewayError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::Lookup(_) => Self::PersistenceFailed(e.to_string()),
            _ => Self::Unauthorized(e.to_string()),
        }
    }
}

/// Errors from repository operations (used by trait definitions in parley-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from credential verification.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("missing credential")]
    MissingCredential,

    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("credential expired")]
    Expired,

    #[error("unknown identity '{0}'")]
    UnknownIdentity(String),

    #[error("identity lookup failed: {0}")]
    Lookup(String),
}

/// Errors from the per-connection transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection {0} is closed")]
    Closed(String),

    #[error("outbound queue full for connection {0}")]
    Full(String),

    #[error("encode error: {0}")]
    Encode(String),
}
