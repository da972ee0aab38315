//  CONFIG.rs
//
//  Description:
//!   Thin binary-local wrapper around `jumpstarter_cfg::client`: resolves
//!   and loads the `ClientConfig` this CLI invocation should use, then
//!   turns its `drivers` section into a [`crate::proxy::AllowList`].

use jumpstarter_cfg::client::{load_with_env_overrides, ClientConfig};
use jumpstarter_proto::errors::ErrorKind;

use crate::errors::CliError;
use crate::proxy::AllowList;

/// Loads the effective `ClientConfig` for `context`, applying the
/// environment-variable overrides §6 documents.
pub fn load(context: Option<&str>) -> Result<ClientConfig, CliError> {
    load_with_env_overrides(context).map_err(|err| CliError::ConfigLoadError { path: None, err })
}

/// Builds the allow-list §4.7 governs proxy construction with from a
/// loaded config's `drivers` section.
pub fn allow_list(config: &ClientConfig) -> Result<AllowList, CliError> {
    AllowList::new(config.drivers.allow.clone(), config.drivers.r#unsafe).map_err(|err: ErrorKind| CliError::InvalidAllowListPattern { err })
}
