//! Error types for Vigil.

use crate::ids::ClassRef;
use std::fmt;

/// Result type alias for Vigil operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for live query and backing store operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Class is not known to the hierarchy.
    ClassNotFound {
        class: ClassRef,
    },
    /// Filter uses an operator the matcher does not understand.
    UnsupportedOperator {
        operator: String,
    },
    /// Filter operand has the wrong shape for its operator.
    InvalidFilter {
        message: String,
    },
    /// Transaction cannot be applied to the current document state.
    MalformedTx {
        message: String,
    },
    /// Backing store failure.
    Backend {
        message: String,
    },
    /// Engine was closed.
    Closed,
    /// Invalid operation.
    InvalidOperation {
        message: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ClassNotFound { class } => write!(f, "Class not found: {}", class),
            Error::UnsupportedOperator { operator } => {
                write!(f, "Unsupported filter operator: {}", operator)
            }
            Error::InvalidFilter { message } => write!(f, "Invalid filter: {}", message),
            Error::MalformedTx { message } => write!(f, "Malformed transaction: {}", message),
            Error::Backend { message } => write!(f, "Backend error: {}", message),
            Error::Closed => write!(f, "Live query engine is closed"),
            Error::InvalidOperation { message } => write!(f, "Invalid operation: {}", message),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Creates a class not found error.
    pub fn class_not_found(class: impl Into<ClassRef>) -> Self {
        Error::ClassNotFound {
            class: class.into(),
        }
    }

    /// Creates an unsupported operator error.
    pub fn unsupported_operator(operator: impl Into<String>) -> Self {
        Error::UnsupportedOperator {
            operator: operator.into(),
        }
    }

    /// Creates an invalid filter error.
    pub fn invalid_filter(message: impl Into<String>) -> Self {
        Error::InvalidFilter {
            message: message.into(),
        }
    }

    /// Creates a malformed transaction error.
    pub fn malformed_tx(message: impl Into<String>) -> Self {
        Error::MalformedTx {
            message: message.into(),
        }
    }

    /// Creates a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Error::Backend {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true for failures of the backing store, which are transient
    /// from the cache's point of view.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Backend { .. })
    }
}
