use thiserror::Error;

pub type KeelResult<T> = Result<T, KeelError>;

/// Every error produced by Keel.
///
/// Errors are cheap to clone so the same failure can be handed to a future
/// and to a completion callback unchanged. Use [`KeelError::code`] for a stable
/// identifier that does not depend on the message wording.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeelError {
    #[error("NotFound: key not found in database")]
    NotFound,
    #[error("{0}")]
    InvalidKey(Box<str>),
    #[error("{0}")]
    InvalidValue(Box<str>),
    #[error("Encoding error ({0})")]
    EncodingError(Box<str>),
    #[error("Encoding '{0}' is not found")]
    EncodingNotFound(Box<str>),
    #[error("Iterator is busy: cannot call next() or seek() until next() has completed")]
    IteratorBusy,
    #[error("Iterator is not open: cannot call next() after close()")]
    IteratorClosed,
    #[error("Database is not open")]
    DatabaseNotOpen,
    #[error("Cannot get lock or the lock is poisoned")]
    LockError,
    #[error("Backend error ({0})")]
    Backend(Box<str>),
}

impl KeelError {
    /// Stable, greppable identifier of the failure kind.
    pub fn code(&self) -> &'static str {
        match self {
            KeelError::NotFound => "LEVEL_NOT_FOUND",
            KeelError::InvalidKey(_) => "LEVEL_INVALID_KEY",
            KeelError::InvalidValue(_) => "LEVEL_INVALID_VALUE",
            KeelError::EncodingError(_) => "LEVEL_ENCODING_ERROR",
            KeelError::EncodingNotFound(_) => "LEVEL_ENCODING_NOT_FOUND",
            KeelError::IteratorBusy => "LEVEL_ITERATOR_BUSY",
            KeelError::IteratorClosed => "LEVEL_ITERATOR_NOT_OPEN",
            KeelError::DatabaseNotOpen => "LEVEL_DATABASE_NOT_OPEN",
            KeelError::LockError => "LEVEL_LOCK_ERROR",
            KeelError::Backend(_) => "LEVEL_BACKEND_ERROR",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, KeelError::NotFound)
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        KeelError::EncodingError(msg.into().into_boxed_str())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        KeelError::Backend(msg.into().into_boxed_str())
    }
}

impl From<serde_json::Error> for KeelError {
    fn from(e: serde_json::Error) -> Self {
        KeelError::encoding(format!("invalid json: {}", e))
    }
}

impl<T> From<std::sync::PoisonError<T>> for KeelError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        KeelError::LockError
    }
}
