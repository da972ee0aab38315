//  TREE_BUILDER.rs
//
//  Description:
//!   Turns a `DriverInstance` config tree (§6) into a runtime
//!   `jumpstarter_driver::tree::TreeNode`, instantiating one of the
//!   built-in mock drivers (§8) per `type` string. A real deployment
//!   would load third-party driver crates here instead; the fabric
//!   itself is agnostic to how a `client_class` maps to a `Driver` impl.

use std::sync::Arc;

use indexmap::IndexMap;
use jumpstarter_cfg::exporter::DriverInstance;
use jumpstarter_driver::driver::Driver;
use jumpstarter_driver::mocks::{composite::CompositeDriver, echo_network::EchoNetworkDriver, mock_power::MockPowerDriver, mock_storage_mux::MockStorageMuxDriver};
use jumpstarter_driver::tree::TreeNode;
use uuid::Uuid;

use crate::errors::ExporterError;

/// Recursively builds a [`TreeNode`] from `instance`, erroring out with
/// the dotted path to the offending node if its `type` is unknown.
pub fn build(instance: &DriverInstance) -> Result<TreeNode, ExporterError> {
    build_at("root", instance)
}

fn build_at(path: &str, instance: &DriverInstance) -> Result<TreeNode, ExporterError> {
    let driver: Arc<dyn Driver> = instantiate(path, &instance.r#type)?;
    let uuid = Uuid::new_v4();
    let labels = [("name".to_string(), path.rsplit('/').next().unwrap_or(path).to_string())].into_iter().collect();

    let mut children = IndexMap::new();
    for (name, child) in &instance.children {
        let child_path = format!("{path}/{name}");
        children.insert(name.clone(), build_at(&child_path, child)?);
    }

    Ok(TreeNode::Leaf { uuid, labels, driver, children })
}

fn instantiate(path: &str, r#type: &str) -> Result<Arc<dyn Driver>, ExporterError> {
    match r#type {
        "jumpstarter.composite" => Ok(Arc::new(CompositeDriver)),
        "jumpstarter.power.Mock" => Ok(Arc::new(MockPowerDriver::default())),
        "jumpstarter.network.Echo" => Ok(Arc::new(EchoNetworkDriver::default())),
        "jumpstarter.storage.MockMux" => Ok(Arc::new(MockStorageMuxDriver::new())),
        other => Err(ExporterError::UnknownDriverType { path: path.to_string(), r#type: other.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn unknown_type_is_rejected_with_its_path() {
        let mut children = HashMap::new();
        children.insert("power0".to_string(), DriverInstance { r#type: "jumpstarter.nonexistent".to_string(), children: HashMap::new(), config: HashMap::new() });
        let root = DriverInstance { r#type: "jumpstarter.composite".to_string(), children, config: HashMap::new() };

        let err = build(&root).unwrap_err();
        match err {
            ExporterError::UnknownDriverType { path, r#type } => {
                assert_eq!(path, "root/power0");
                assert_eq!(r#type, "jumpstarter.nonexistent");
            },
            other => panic!("expected UnknownDriverType, got {other:?}"),
        }
    }

    #[test]
    fn known_types_build_and_nest() {
        let mut children = HashMap::new();
        children.insert("power0".to_string(), DriverInstance { r#type: "jumpstarter.power.Mock".to_string(), children: HashMap::new(), config: HashMap::new() });
        let root = DriverInstance { r#type: "jumpstarter.composite".to_string(), children, config: HashMap::new() };

        let tree = build(&root).unwrap();
        assert_eq!(tree.client_class(), "jumpstarter.composite");
        assert_eq!(tree.children().unwrap().get("power0").unwrap().client_class(), "jumpstarter.power.Mock");
    }
}
