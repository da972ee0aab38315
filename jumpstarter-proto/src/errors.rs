//  ERRORS.rs
//
//  Description:
//!   Defines the fabric-wide error taxonomy (§7) and its mapping onto
//!   gRPC status codes.

use std::error;
use std::fmt::{Display, Formatter, Result as FResult};

use tonic::{Code, Status};

/// Defines the errors occuring in any of the hand-rolled service clients.
#[derive(Debug)]
pub enum ServiceError {
    EndpointError { address: String, err: tonic::transport::Error },
    ConnectError { address: String, err: tonic::transport::Error },
}
impl Display for ServiceError {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use ServiceError::*;
        match self {
            EndpointError { address, err } => write!(f, "Failed to create a new Endpoint from '{address}': {err}"),
            ConnectError { address, err } => write!(f, "Failed to connect to gRPC endpoint '{address}': {err}"),
        }
    }
}
impl error::Error for ServiceError {}

/// The fabric's error taxonomy (§7). Every fallible fabric operation
/// surfaces one of these kinds; the gRPC layer maps it onto a `Status`.
#[derive(Debug)]
pub enum ErrorKind {
    /// Argument decoding failed, streaming/non-streaming mismatch, or an
    /// unknown tagged-variant discriminator.
    InvalidArgument(String),
    /// Unknown driver UUID, unknown method, or unknown resource UUID.
    NotFound(String),
    /// Client-class not in the allow-list, or an invalid/expired token.
    PermissionDenied(String),
    /// Transport closed, router disconnected, exporter not yet serving.
    Unavailable(String),
    /// Per-call or driver-internal timeout.
    DeadlineExceeded(String),
    /// Uncategorised driver failure; message preserved verbatim.
    Internal(String),
    /// Caller cancelled, or the session is shutting down.
    Cancelled(String),
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        match self {
            ErrorKind::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            ErrorKind::NotFound(msg) => write!(f, "not found: {msg}"),
            ErrorKind::PermissionDenied(msg) => write!(f, "permission denied: {msg}"),
            ErrorKind::Unavailable(msg) => write!(f, "unavailable: {msg}"),
            ErrorKind::DeadlineExceeded(msg) => write!(f, "deadline exceeded: {msg}"),
            ErrorKind::Internal(msg) => write!(f, "internal error: {msg}"),
            ErrorKind::Cancelled(msg) => write!(f, "cancelled: {msg}"),
        }
    }
}
impl error::Error for ErrorKind {}

impl From<ErrorKind> for Status {
    fn from(kind: ErrorKind) -> Self {
        let (code, msg) = match kind {
            ErrorKind::InvalidArgument(msg) => (Code::InvalidArgument, msg),
            ErrorKind::NotFound(msg) => (Code::NotFound, msg),
            ErrorKind::PermissionDenied(msg) => (Code::PermissionDenied, msg),
            ErrorKind::Unavailable(msg) => (Code::Unavailable, msg),
            ErrorKind::DeadlineExceeded(msg) => (Code::DeadlineExceeded, msg),
            ErrorKind::Internal(msg) => (Code::Internal, msg),
            ErrorKind::Cancelled(msg) => (Code::Cancelled, msg),
        };
        Status::new(code, msg)
    }
}

/// The reverse direction: a client inspecting a returned [`Status`]. Used
/// by the client's re-authentication hook (§7: "a connection error whose
/// message contains `expired`...").
pub fn status_is_expired_token(status: &Status) -> bool { status.code() == Code::Unauthenticated || status.message().contains("expired") }
