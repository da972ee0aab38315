//  ERRORS.rs
//
//  Description:
//!   Errors for the router-tunnel listener (exporter side) and the
//!   router dial (client side), in the donor's manual `Display`+`Error`
//!   enum style (`brane-prx/src/errors.rs`).

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};

/// Errors from the exporter-side `Listener` (§4.8).
#[derive(Debug)]
pub enum ListenerError {
    /// Failed to connect to the router's control endpoint.
    ConnectError { address: String, err: jumpstarter_proto::router::Error },
    /// `Register` was rejected by the router.
    RegisterFailed { err: tonic::Status },
    /// `Listen` could not be opened, or broke mid-stream.
    ListenStreamError { err: tonic::Status },
    /// Couldn't dial the router endpoint handed out for one assignment.
    DialFailed { address: String, err: jumpstarter_proto::router::Error },
    /// Couldn't reach the local Exporter server to relay an assignment to.
    LocalConnectError { address: String, err: std::io::Error },
    /// The router-issued token was not a valid HTTP header value.
    InvalidToken,
}
impl Display for ListenerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use ListenerError::*;
        match self {
            ConnectError { address, err } => write!(f, "Failed to connect to router control endpoint '{address}': {err}"),
            RegisterFailed { err } => write!(f, "Router rejected Register: {err}"),
            ListenStreamError { err } => write!(f, "Listen stream failed: {err}"),
            DialFailed { address, err } => write!(f, "Failed to dial router endpoint '{address}': {err}"),
            LocalConnectError { address, err } => write!(f, "Failed to connect to local exporter server '{address}': {err}"),
            InvalidToken => write!(f, "Router-issued token is not a valid header value"),
        }
    }
}
impl Error for ListenerError {}

/// Errors from the client-side router dial.
#[derive(Debug)]
pub enum DialError {
    /// Failed to connect to the router endpoint.
    ConnectError { address: String, err: jumpstarter_proto::router::Error },
    /// The router rejected the `Dial` call (e.g. expired/unknown lease).
    DialFailed { lease_name: String, err: tonic::Status },
    /// Failed to bind the local listener a caller will connect to.
    LocalListenError { address: String, err: std::io::Error },
}
impl Display for DialError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use DialError::*;
        match self {
            ConnectError { address, err } => write!(f, "Failed to connect to router endpoint '{address}': {err}"),
            DialFailed { lease_name, err } => write!(f, "Router rejected Dial for lease '{lease_name}': {err}"),
            LocalListenError { address, err } => write!(f, "Failed to bind local listener on '{address}': {err}"),
        }
    }
}
impl Error for DialError {}
