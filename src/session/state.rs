//! Session termination states and errors.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::http::{ParseError, RequestError};
use crate::reader::ReadError;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Serving exchanges.
    Open,
    /// The peer closed the channel, or asked for close on its last request.
    ClosedByPeer,
    /// No byte arrived within the configured bound.
    ClosedByTimeout,
    /// The per-connection request cap was reached.
    ClosedByLimit,
    /// I/O failure or malformed request.
    ClosedByError,
    /// Server shutdown interrupted the session.
    ClosedByShutdown,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Open => "open",
            SessionState::ClosedByPeer => "closed_by_peer",
            SessionState::ClosedByTimeout => "closed_by_timeout",
            SessionState::ClosedByLimit => "closed_by_limit",
            SessionState::ClosedByError => "closed_by_error",
            SessionState::ClosedByShutdown => "closed_by_shutdown",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a session ended abnormally.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("timed out after {0:?} waiting for request data")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed request: {0}")]
    Protocol(#[from] ParseError),

    #[error("session interrupted by shutdown")]
    Interrupted,
}

impl SessionError {
    /// Termination state this error leads to.
    pub fn state(&self) -> SessionState {
        match self {
            SessionError::Timeout(_) => SessionState::ClosedByTimeout,
            SessionError::Io(_) | SessionError::Protocol(_) => SessionState::ClosedByError,
            SessionError::Interrupted => SessionState::ClosedByShutdown,
        }
    }
}

impl From<ReadError> for SessionError {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::Timeout(after) => SessionError::Timeout(after),
            ReadError::Io(e) => SessionError::Io(e),
            ReadError::Interrupted => SessionError::Interrupted,
        }
    }
}

impl From<RequestError> for SessionError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::Read(e) => e.into(),
            RequestError::Parse(e) => SessionError::Protocol(e),
        }
    }
}
