use crate::allocator::AllocError;
use std::fmt;

/// Errors produced while registering or dispatching commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Argument storage for a line could not be obtained; the line is dropped.
    Allocation(AllocError),
    /// The line holds no command name (empty or delimiters only).
    EmptyLine,
    /// No registered command carries this name.
    UnknownCommand(String),
    /// The command table could not be stored; the interpreter is left with no commands.
    Registration(AllocError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Allocation(e) => write!(f, "allocation failed: {}", e),
            Error::EmptyLine => write!(f, "line contains no command"),
            Error::UnknownCommand(name) => write!(f, "unknown command: {}", name),
            Error::Registration(e) => write!(f, "command registration failed: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Allocation(e) | Error::Registration(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AllocError> for Error {
    fn from(e: AllocError) -> Self {
        Error::Allocation(e)
    }
}
