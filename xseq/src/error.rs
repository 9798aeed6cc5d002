use std::any::Any;
use std::sync::Arc;

/// Coarse classification of an [`Error`], cheap to copy and match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Canceled,
    InvalidOperation,
    DuplicateKey,
    Faulted,
    Panicked,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The enumeration was canceled or its enumerator disposed.
    #[error("operation was canceled")]
    Canceled,

    /// The call is not valid in the enumerator's current state.
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),

    /// A key selector produced a key that is already present.
    #[error("an element with the key `{0}` already exists")]
    DuplicateKey(String),

    /// A generator or selector failed.
    #[error(transparent)]
    Faulted(Arc<anyhow::Error>),

    /// A producer running on a spawned task panicked.
    #[error("producer panicked: {0}")]
    Panicked(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Canceled => ErrorKind::Canceled,
            Error::InvalidOperation(_) => ErrorKind::InvalidOperation,
            Error::DuplicateKey(_) => ErrorKind::DuplicateKey,
            Error::Faulted(_) => ErrorKind::Faulted,
            Error::Panicked(_) => ErrorKind::Panicked,
        }
    }

    /// Wraps an arbitrary failure as a producer fault.
    pub fn fault<E>(err: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        Error::Faulted(Arc::new(err.into()))
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Error::Canceled)
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Faulted(Arc::new(err))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::fault(err)
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            return Error::Canceled;
        }
        match err.try_into_panic() {
            Ok(payload) => Error::Panicked(panic_message(payload.as_ref())),
            Err(err) => Error::Panicked(err.to_string()),
        }
    }
}

/// Text of a panic payload, or a placeholder for non-string payloads.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

pub type Result<T> = core::result::Result<T, Error>;
