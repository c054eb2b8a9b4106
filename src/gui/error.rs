use crate::session::SessionError;

use std::{error::Error, fmt::Display, sync::mpsc};

/// Errors from the terminal screens.
#[derive(Debug)]
pub enum ChartGuiError {
    /// The terminal failed.
    IOError(std::io::Error),
    /// A worker channel closed.
    MPSCSendError,
    /// A worker thread panicked.
    JoinError,
    /// The session failed.
    Session(SessionError),
}

impl Display for ChartGuiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Session(error) => write!(f, "{}", error),
            other => write!(f, "{:#?}", other),
        }
    }
}

impl Error for ChartGuiError {}

impl From<std::io::Error> for ChartGuiError {
    fn from(value: std::io::Error) -> Self {
        Self::IOError(value)
    }
}

impl<T> From<mpsc::SendError<T>> for ChartGuiError {
    fn from(_: mpsc::SendError<T>) -> Self {
        Self::MPSCSendError
    }
}

impl From<SessionError> for ChartGuiError {
    fn from(value: SessionError) -> Self {
        Self::Session(value)
    }
}
