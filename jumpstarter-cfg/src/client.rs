//  CLIENT.rs
//
//  Description:
//!   Defines `ClientConfig` (§6), the YAML document a client loads to
//!   learn which controller/exporter endpoint to talk to, which token
//!   to present, and which client-classes it is willing to instantiate.

use std::env;
use std::path::PathBuf;

use enum_debug::EnumDebug;
use jumpstarter_proto::transport::Endpoint;
use serde::Deserialize;

use crate::info::{Info, YamlInfo};

/// TLS settings for the client's gRPC channel (§6 `ClientConfig.tls`).
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TlsConfig {
    #[serde(default)]
    pub ca: Option<PathBuf>,
    #[serde(default)]
    pub insecure: bool,
}

/// The allow-list governing which client-class identifiers the client
/// will build a proxy for (§4.7).
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DriversConfig {
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub r#unsafe: bool,
}

/// The `ClientConfig` YAML document (§6). `endpoint` is the address the
/// client attaches to (§6 `JUMPSTARTER_HOST`): a `unix://` path when
/// attached to a same-host exporter/controller, otherwise TCP.
#[derive(Clone, Debug, Deserialize)]
pub struct ClientConfig {
    #[serde(rename = "apiVersion", default = "default_api_version")]
    pub api_version: String,
    pub endpoint: Endpoint,
    #[serde(default)]
    pub tls: TlsConfig,
    pub token: String,
    #[serde(default)]
    pub drivers: DriversConfig,
}
impl YamlInfo for ClientConfig {}

fn default_api_version() -> String { "jumpstarter.dev/v1alpha1".to_string() }

/// Lets an `EndpointError` parsing `JUMPSTARTER_ENDPOINT`/`JUMPSTARTER_HOST`
/// piggyback on `ClientConfig`'s `YamlError` rather than inventing a
/// second env-specific error type for two call sites.
fn env_endpoint_error(err: jumpstarter_proto::transport::EndpointError) -> serde_yaml::Error {
    <serde_yaml::Error as serde::de::Error>::custom(err)
}

/// Resolves which config file a client should read, mirroring the
/// original implementation's environment-then-file precedence
/// (SPEC_FULL.md §4): `$JUMPSTARTER_CONFIG` wins outright, otherwise a
/// context-qualified or plain file under `~/.config/jumpstarter`.
#[derive(Clone, Copy, Debug, EnumDebug, Eq, PartialEq)]
pub enum ConfigSource {
    /// An explicit path, e.g. from `$JUMPSTARTER_CONFIG`.
    Explicit,
    /// `~/.config/jumpstarter/config_{context}.yaml`.
    Context,
    /// `~/.config/jumpstarter/config.yaml`.
    Default,
}

/// Computes the config file path a client should load, given an optional
/// context name (`$JUMPSTARTER_CONTEXT` or an explicit `--context` flag).
pub fn resolve_config_path(context: Option<&str>) -> (PathBuf, ConfigSource) {
    if let Ok(explicit) = env::var("JUMPSTARTER_CONFIG") {
        return (PathBuf::from(explicit), ConfigSource::Explicit);
    }
    let base = dirs::home_dir().unwrap_or_default().join(".config").join("jumpstarter");
    match context {
        Some(ctx) => (base.join(format!("config_{ctx}.yaml")), ConfigSource::Context),
        None => (base.join("config.yaml"), ConfigSource::Default),
    }
}

/// Applies the environment-variable overrides documented in §6
/// (`JUMPSTARTER_HOST`, `JMP_DRIVERS_ALLOW`, `JUMPSTARTER_GRPC_INSECURE`)
/// on top of a config resolved from file or from
/// `JUMPSTARTER_ENDPOINT`/`JUMPSTARTER_TOKEN` directly.
pub fn load_with_env_overrides(context: Option<&str>) -> Result<ClientConfig, crate::info::YamlError> {
    let mut config = if let (Ok(endpoint), Ok(token)) = (env::var("JUMPSTARTER_ENDPOINT"), env::var("JUMPSTARTER_TOKEN")) {
        let endpoint = endpoint.parse().map_err(|err| crate::info::InfoError::StringDeserializeError { err: env_endpoint_error(err) })?;
        ClientConfig {
            api_version: default_api_version(),
            endpoint,
            tls: TlsConfig::default(),
            token,
            drivers: DriversConfig::default(),
        }
    } else {
        let (path, _source) = resolve_config_path(context);
        ClientConfig::from_path(path)?
    };

    if let Ok(host) = env::var("JUMPSTARTER_HOST") {
        config.endpoint = host.parse().map_err(|err| crate::info::InfoError::StringDeserializeError { err: env_endpoint_error(err) })?;
    }
    if let Ok(allow) = env::var("JMP_DRIVERS_ALLOW") {
        if allow == "UNSAFE" {
            config.drivers.r#unsafe = true;
        } else {
            config.drivers.allow = allow.split(',').map(|s| s.trim().to_string()).collect();
        }
    }
    if env::var("JUMPSTARTER_GRPC_INSECURE").as_deref() == Ok("1") {
        config.tls.insecure = true;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_yaml() {
        let raw = "apiVersion: jumpstarter.dev/v1alpha1\nendpoint: example.com:443\ntoken: abc\n";
        let config = ClientConfig::from_string(raw).unwrap();
        assert_eq!(config.endpoint, Endpoint::tcp("example.com", 443));
        assert!(config.drivers.allow.is_empty());
        assert!(!config.drivers.r#unsafe);
    }

    #[test]
    fn context_qualifies_the_default_filename() {
        let (path, source) = resolve_config_path(Some("staging"));
        assert_eq!(source, ConfigSource::Context);
        assert!(path.ends_with("config_staging.yaml"));
    }
}
