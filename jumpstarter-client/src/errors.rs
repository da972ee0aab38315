//  ERRORS.rs
//
//  Description:
//!   Errors for the lease client and CLI entrypoint, in the donor's
//!   manual `Display`+`Error` enum style (`brane-prx/src/errors.rs`).

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};
use std::path::PathBuf;

/// Errors from [`crate::lease::LeaseClient`] (§4.9).
#[derive(Debug)]
pub enum LeaseError {
    RequestFailed { selector: String, err: tonic::Status },
    WatchFailed { name: String, err: tonic::Status },
    WatchClosedEarly { name: String },
    ReadyWithoutEndpoint { name: String },
    ReleaseFailed { name: String, err: tonic::Status },
}
impl Display for LeaseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use LeaseError::*;
        match self {
            RequestFailed { selector, err } => write!(f, "RequestLease for selector '{selector}' failed: {err}"),
            WatchFailed { name, err } => write!(f, "WatchLease for '{name}' failed: {err}"),
            WatchClosedEarly { name } => write!(f, "WatchLease stream for '{name}' closed before a ready condition arrived"),
            ReadyWithoutEndpoint { name } => write!(f, "lease '{name}' reported ready without a router endpoint/token"),
            ReleaseFailed { name, err } => write!(f, "ReleaseLease for '{name}' failed: {err}"),
        }
    }
}
impl Error for LeaseError {}

/// Top-level errors surfaced by the `jumpstarter-client` binary.
#[derive(Debug)]
pub enum CliError {
    ConfigLoadError { path: Option<PathBuf>, err: jumpstarter_cfg::info::YamlError },
    InvalidSelector { raw: String, err: jumpstarter_shr::selector::SelectorParseError },
    InvalidAllowListPattern { err: jumpstarter_proto::errors::ErrorKind },
    ControllerConnectError { address: String, err: jumpstarter_proto::errors::ServiceError },
    ExporterConnectError { address: String, err: jumpstarter_proto::errors::ServiceError },
    LeaseError { err: LeaseError },
    DialError { err: jumpstarter_proxy::DialError },
    ReportFailed { err: tonic::Status },
    ProxyBuildError { err: jumpstarter_proto::errors::ErrorKind },
}
impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use CliError::*;
        match self {
            ConfigLoadError { path, .. } => write!(f, "Failed to load client config{}", path.as_ref().map(|p| format!(" '{}'", p.display())).unwrap_or_default()),
            InvalidSelector { raw, err } => write!(f, "Invalid selector '{raw}': {err}"),
            InvalidAllowListPattern { err } => write!(f, "Invalid allow-list configuration: {err}"),
            ControllerConnectError { address, .. } => write!(f, "Failed to connect to controller '{address}'"),
            ExporterConnectError { address, .. } => write!(f, "Failed to connect to exporter '{address}'"),
            LeaseError { err } => write!(f, "{err}"),
            DialError { err } => write!(f, "{err}"),
            ReportFailed { err } => write!(f, "GetReport failed: {err}"),
            ProxyBuildError { err } => write!(f, "Failed to build driver proxy tree: {err}"),
        }
    }
}
impl Error for CliError {}
