use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::common::{atomic, Atomic};
use crate::lifecycle::{EntityState, LifecycleVerb};

/// Error kinds for Tessera operations.
///
/// Each kind names one category of failure so callers can tell apart an
/// entity in the wrong lifecycle state, a static misconfiguration and a
/// failing store.
///
/// # Examples
///
/// ```rust,ignore
/// use tessera::errors::{TesseraError, ErrorKind, TesseraResult};
///
/// fn example() -> TesseraResult<()> {
///     Err(TesseraError::new("batch size must be positive", ErrorKind::ConfigurationError))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// A lifecycle verb was invoked on a state that forbids it.
    /// Carries the current state and the attempted verb.
    IllegalEntityState(EntityState, LifecycleVerb),
    /// Invalid static configuration such as a zero batch size
    ConfigurationError,
    /// Any failure reported by the document store
    StoreOperationError,
    /// The operation is not implemented by the store binding
    UnsupportedOperation,
    /// Error mapping an entity to or from a document
    ObjectMappingError,
    /// The entity has no usable identifier
    InvalidId,
    /// No metadata has been registered for the entity
    MetadataNotFound,
    /// The operation is not valid in the current context
    InvalidOperation,
    /// Error dispatching an event
    EventError,
    /// Error encoding or decoding data
    EncodingError,
    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::IllegalEntityState(state, verb) => {
                write!(f, "Illegal entity state: cannot {} a {} entity", verb, state)
            }
            ErrorKind::ConfigurationError => write!(f, "Configuration error"),
            ErrorKind::StoreOperationError => write!(f, "Store operation error"),
            ErrorKind::UnsupportedOperation => write!(f, "Unsupported operation"),
            ErrorKind::ObjectMappingError => write!(f, "Object mapping error"),
            ErrorKind::InvalidId => write!(f, "Invalid ID"),
            ErrorKind::MetadataNotFound => write!(f, "Metadata not found"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::EventError => write!(f, "Event error"),
            ErrorKind::EncodingError => write!(f, "Encoding error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom Tessera error type.
///
/// `TesseraError` carries a message, a kind and an optional cause. A
/// backtrace is captured at construction for debugging.
///
/// # Examples
///
/// ```rust,ignore
/// use tessera::errors::{TesseraError, ErrorKind};
///
/// let cause = TesseraError::new("connection refused", ErrorKind::StoreOperationError);
/// let err = TesseraError::new_with_cause("Bulk insert failed", ErrorKind::StoreOperationError, cause);
/// ```
#[derive(Clone)]
pub struct TesseraError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<TesseraError>>,
    backtrace: Atomic<Backtrace>,
}

impl TesseraError {
    /// Creates a new `TesseraError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        TesseraError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new()),
        }
    }

    /// Creates a new `TesseraError` wrapping the error that caused it.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: TesseraError) -> Self {
        TesseraError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new()),
        }
    }

    /// Creates the error raised when `verb` is invoked on an entity in `state`.
    pub fn illegal_state(state: EntityState, verb: LifecycleVerb) -> Self {
        let kind = ErrorKind::IllegalEntityState(state, verb);
        TesseraError::new(&kind.to_string(), kind)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&TesseraError> {
        self.cause.as_deref()
    }

    /// Returns the (state, verb) pair if this is a lifecycle state error.
    pub fn illegal_transition(&self) -> Option<(EntityState, LifecycleVerb)> {
        match self.error_kind {
            ErrorKind::IllegalEntityState(state, verb) => Some((state, verb)),
            _ => None,
        }
    }
}

impl Display for TesseraError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for TesseraError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace.read()),
        }
    }
}

impl Error for TesseraError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for Tessera operations.
pub type TesseraResult<T> = Result<T, TesseraError>;

impl From<std::io::Error> for TesseraError {
    fn from(err: std::io::Error) -> Self {
        TesseraError::new(&format!("IO error: {}", err), ErrorKind::StoreOperationError)
    }
}

impl From<std::num::ParseIntError> for TesseraError {
    fn from(err: std::num::ParseIntError) -> Self {
        TesseraError::new(
            &format!("Integer parsing error: {}", err),
            ErrorKind::ConfigurationError,
        )
    }
}

impl From<regex::Error> for TesseraError {
    fn from(err: regex::Error) -> Self {
        TesseraError::new(
            &format!("Invalid pattern: {}", err),
            ErrorKind::InternalError,
        )
    }
}

impl From<String> for TesseraError {
    fn from(msg: String) -> Self {
        TesseraError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for TesseraError {
    fn from(msg: &str) -> Self {
        TesseraError::new(msg, ErrorKind::InternalError)
    }
}
