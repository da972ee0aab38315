//  ERRORS.rs
//
//  Description:
//!   Startup-time errors for the exporter binary, in the donor's manual
//!   `Display`+`Error` enum style (`brane-job/src/errors.rs`).

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};
use std::path::PathBuf;

use jumpstarter_cfg::info::YamlError;

#[derive(Debug)]
pub enum ExporterError {
    /// Couldn't load `ExporterConfig` from the given path.
    ConfigLoadError { path: PathBuf, err: YamlError },
    /// A `DriverInstance.type` named no client-class this exporter knows
    /// how to build (§6: "Unknown next steps... reject at startup").
    UnknownDriverType { path: String, r#type: String },
    /// Failed to bind the local gRPC listener.
    BindError { address: String, err: std::io::Error },
}
impl Display for ExporterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use ExporterError::*;
        match self {
            ConfigLoadError { path, err } => write!(f, "Failed to load exporter config '{}': {err}", path.display()),
            UnknownDriverType { path, r#type } => write!(f, "Driver instance '{path}' names unknown type '{type}'"),
            BindError { address, err } => write!(f, "Failed to bind gRPC listener on '{address}': {err}"),
        }
    }
}
impl Error for ExporterError {}
