//! Error types for htail
//!
//! Status-driven failures (`TempFail`, `Protocol`, `Format`) are what the
//! scheduler reacts to. Low-level transport faults are reclassified here so
//! that callers never have to look at socket conditions.

use std::error::Error as StdError;
use std::io::ErrorKind;
use std::path::PathBuf;

use reqwest::StatusCode;

/// Main error type for htail operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Resource temporarily unavailable (404/423, a transient network fault, or a timeout)
    #[error("resource temporarily unavailable: {0}")]
    TempFail(String),

    /// Unexpected HTTP status
    #[error("unexpected HTTP status: {0}")]
    Protocol(StatusCode),

    /// Server response is missing something we need, or uses an unsupported shape
    #[error("unsupported server response: {0}")]
    Format(String),

    /// Malformed status line, or a kept-alive connection that could not carry
    /// another request
    #[error("connection not reusable: {0}")]
    StaleConnection(String),

    /// Any other transport failure
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("invalid URL '{url}': {reason}")]
    InvalidLocator { url: String, reason: String },

    #[error("unsupported URL scheme '{0}' (supported: http, https)")]
    UnsupportedScheme(String),

    #[error("{}:{line}: {message}", path.display())]
    Netrc {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("TLS configuration: {0}")]
    Tls(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error only concerns one resource, as opposed to the run
    pub fn is_resource_failure(&self) -> bool {
        matches!(
            self,
            Error::TempFail(_) | Error::Protocol(_) | Error::Format(_) | Error::StaleConnection(_)
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Error::TempFail(format!("timed out: {err}"));
        }
        classify_transport(&err).unwrap_or(Error::Http(err))
    }
}

/// Socket conditions we expect to clear up by themselves
fn is_transient_io(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::HostUnreachable
            | ErrorKind::NetworkUnreachable
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            // rustls reports a peer closing without close_notify this way
            | ErrorKind::UnexpectedEof
    )
}

/// Walk the source chain of a transport error looking for a condition that
/// is worth retrying. Returns `None` for failures that must stay fatal.
fn classify_transport(err: &(dyn StdError + 'static)) -> Option<Error> {
    let mut cause = Some(err);
    while let Some(current) = cause {
        if let Some(io) = current.downcast_ref::<std::io::Error>() {
            if is_transient_io(io.kind()) {
                return Some(Error::TempFail(io.to_string()));
            }
        }
        if let Some(hyper_err) = current.downcast_ref::<hyper::Error>() {
            if hyper_err.is_parse()
                || hyper_err.is_incomplete_message()
                || hyper_err.is_canceled()
            {
                return Some(Error::StaleConnection(hyper_err.to_string()));
            }
        }
        cause = current.source();
    }
    None
}

/// Convenience result type for htail operations
pub type Result<T> = std::result::Result<T, Error>;
