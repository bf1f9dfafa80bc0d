use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::common::{atomic, Atomic};

/// Error kinds for Sticky operations.
///
/// The first five variants are the migration taxonomy. They decide how far a
/// failure propagates: everything except [ErrorKind::MalformedTask] abandons
/// the migration file being processed.
///
/// # Examples
///
/// ```rust,ignore
/// use sticky::errors::{StickyError, ErrorKind, StickyResult};
///
/// fn example() -> StickyResult<()> {
///     Err(StickyError::new("No data for entity College", ErrorKind::MissingEntityData))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // Migration taxonomy
    /// Migration file is unreadable or is not a JSON object
    MalformedFile,
    /// Migration file names an action that is not supported
    UnknownAction,
    /// A single task carries a payload of the wrong shape
    MalformedTask,
    /// No staged or stored collection exists for a referenced entity
    MissingEntityData,
    /// A read, write or rename against storage failed
    IOFailure,

    // Ambient errors
    /// Invalid or conflicting configuration
    ConfigError,
    /// Error encoding data for storage
    EncodingError,
    /// An internal invariant does not hold
    InternalError,
}

impl ErrorKind {
    /// Returns `true` if an error of this kind abandons the whole migration file.
    pub fn is_file_fatal(&self) -> bool {
        !matches!(self, ErrorKind::MalformedTask)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::MalformedFile => write!(f, "Malformed file"),
            ErrorKind::UnknownAction => write!(f, "Unknown action"),
            ErrorKind::MalformedTask => write!(f, "Malformed task"),
            ErrorKind::MissingEntityData => write!(f, "Missing entity data"),
            ErrorKind::IOFailure => write!(f, "IO failure"),
            ErrorKind::ConfigError => write!(f, "Configuration error"),
            ErrorKind::EncodingError => write!(f, "Encoding error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom Sticky error type.
///
/// `StickyError` encapsulates the error message, its kind, and an optional cause.
/// It supports error chaining and captures a backtrace for debugging.
///
/// # Examples
///
/// ```rust,ignore
/// use sticky::errors::{StickyError, ErrorKind};
///
/// let cause = StickyError::new("disk full", ErrorKind::IOFailure);
/// let err = StickyError::new_with_cause("Failed to write College", ErrorKind::IOFailure, cause);
/// ```
#[derive(Clone)]
pub struct StickyError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<StickyError>>,
    backtrace: Atomic<Backtrace>,
}

impl StickyError {
    /// Creates a new `StickyError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        StickyError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new()),
        }
    }

    /// Creates a new `StickyError` that wraps the error which caused it.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: StickyError) -> Self {
        StickyError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&StickyError> {
        self.cause.as_deref()
    }
}

impl Display for StickyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for StickyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace.read()),
        }
    }
}

impl Error for StickyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn Error + 'static))
    }
}

/// A result type alias for Sticky operations.
pub type StickyResult<T> = Result<T, StickyError>;

impl From<std::io::Error> for StickyError {
    fn from(err: std::io::Error) -> Self {
        StickyError::new(&format!("IO error: {}", err), ErrorKind::IOFailure)
    }
}

impl From<serde_json::Error> for StickyError {
    fn from(err: serde_json::Error) -> Self {
        let error_kind = if err.is_io() {
            ErrorKind::IOFailure
        } else {
            ErrorKind::MalformedFile
        };
        StickyError::new(&format!("JSON error: {}", err), error_kind)
    }
}
