//  EXPORTER.rs
//
//  Description:
//!   Defines `ExporterConfig` and `DriverInstance` (§6), the YAML
//!   document an exporter loads to learn which driver tree to build and
//!   which controller/listener endpoint to serve it on.

use std::collections::HashMap;

use jumpstarter_proto::transport::Endpoint;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::info::YamlInfo;

/// A scalar config value for a driver instance (§6: `config: map<string, scalar>`).
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}
impl Scalar {
    pub fn to_json(&self) -> JsonValue {
        match self {
            Scalar::Bool(b) => JsonValue::Bool(*b),
            Scalar::Int(i) => JsonValue::Number((*i).into()),
            Scalar::Float(f) => serde_json::Number::from_f64(*f).map(JsonValue::Number).unwrap_or(JsonValue::Null),
            Scalar::String(s) => JsonValue::String(s.clone()),
        }
    }
}

/// A recursive description of one driver node to instantiate (§6:
/// `DriverInstance = {type, children, config}`). Missing `type` defaults
/// to the composite driver; missing `children`/`config` default to empty,
/// mirroring `NodeSpecificConfig`'s recursive composability.
#[derive(Clone, Debug, Deserialize)]
pub struct DriverInstance {
    #[serde(rename = "type", default = "default_driver_type")]
    pub r#type: String,
    #[serde(default)]
    pub children: HashMap<String, DriverInstance>,
    #[serde(default)]
    pub config: HashMap<String, Scalar>,
}

fn default_driver_type() -> String { "jumpstarter.composite".to_string() }

/// The `ExporterConfig` YAML document (§6). `endpoint` is the
/// router-control address this exporter registers against (§4.8) — a
/// `unix://` path when the router runs on the same host, otherwise TCP.
#[derive(Clone, Debug, Deserialize)]
pub struct ExporterConfig {
    #[serde(rename = "apiVersion", default = "default_api_version")]
    pub api_version: String,
    pub endpoint: Endpoint,
    pub token: String,
    pub export: DriverInstance,
}
impl YamlInfo for ExporterConfig {}

fn default_api_version() -> String { "jumpstarter.dev/v1alpha1".to_string() }

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::Info;

    #[test]
    fn missing_type_defaults_to_composite() {
        let raw = "apiVersion: jumpstarter.dev/v1alpha1\nendpoint: unix:///tmp/jmp.sock\ntoken: tok\nexport: {}\n";
        let config = ExporterConfig::from_string(raw).unwrap();
        assert_eq!(config.endpoint, Endpoint::unix("/tmp/jmp.sock"));
        assert_eq!(config.export.r#type, "jumpstarter.composite");
        assert!(config.export.children.is_empty());
    }

    #[test]
    fn tcp_endpoint_parses_too() {
        let raw = "apiVersion: jumpstarter.dev/v1alpha1\nendpoint: controller.example.com:8082\ntoken: tok\nexport: {}\n";
        let config = ExporterConfig::from_string(raw).unwrap();
        assert_eq!(config.endpoint, Endpoint::tcp("controller.example.com", 8082));
    }

    #[test]
    fn nested_children_parse() {
        let raw = "apiVersion: jumpstarter.dev/v1alpha1\n\
                    endpoint: unix:///tmp/jmp.sock\n\
                    token: tok\n\
                    export:\n\
                    \x20\x20children:\n\
                    \x20\x20\x20\x20power0:\n\
                    \x20\x20\x20\x20\x20\x20type: jumpstarter.power.Mock\n";
        let config = ExporterConfig::from_string(raw).unwrap();
        assert_eq!(config.export.children.get("power0").unwrap().r#type, "jumpstarter.power.Mock");
    }
}
