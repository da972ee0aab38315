//  DISPATCH.rs
//
//  Description:
//!   Routes `(driver_uuid, method_name, args)` calls to the bound method
//!   on the correct driver instance (§4.3). Grounded on
//!   `brane-drv/src/handler.rs`'s `execute()` shape (session lookup →
//!   resolve target → invoke → reply), with the BraneScript VM/workflow
//!   lookup replaced by UUID/method-name resolution against the tree.
//

use jumpstarter_proto::driver::MethodKind;
use jumpstarter_proto::errors::ErrorKind;
use jumpstarter_proto::value::Value;
use uuid::Uuid;

use crate::driver::{ResourceSource, ValueStream};
use crate::tree::DriverTree;

/// Resolves `uuid`/`method` against `tree` and invokes the unary call
/// (§4.3 `DriverCall`).
pub async fn driver_call(tree: &DriverTree, uuid: Uuid, method: &str, args: Value, resources: &dyn ResourceSource) -> Result<Value, ErrorKind> {
    let driver = tree.resolve(uuid)?;
    let descriptor = driver
        .methods()
        .iter()
        .find(|m| m.name == method)
        .ok_or_else(|| ErrorKind::NotFound(format!("driver '{uuid}' exports no method '{method}'")))?;
    if descriptor.kind != MethodKind::Unary {
        return Err(ErrorKind::InvalidArgument(format!("method '{method}' is not unary (tagged {:?})", descriptor.kind)));
    }
    driver.call(method, args, resources).await
}

/// Resolves `uuid`/`method` against `tree` and opens the server-stream
/// call (§4.3 `StreamingDriverCall`). The returned stream ends when the
/// driver's own stream completes or aborts with `Internal` (per §4.3,
/// errors surfacing mid-stream are the driver's responsibility: each
/// yielded item is independently `Result<Value, ErrorKind>`).
pub async fn streaming_driver_call(tree: &DriverTree, uuid: Uuid, method: &str, args: Value) -> Result<ValueStream, ErrorKind> {
    let driver = tree.resolve(uuid)?;
    let descriptor = driver
        .methods()
        .iter()
        .find(|m| m.name == method)
        .ok_or_else(|| ErrorKind::NotFound(format!("driver '{uuid}' exports no method '{method}'")))?;
    if descriptor.kind != MethodKind::Streaming {
        return Err(ErrorKind::InvalidArgument(format!("method '{method}' is not streaming (tagged {:?})", descriptor.kind)));
    }
    driver.call_streaming(method, args).await
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use indexmap::IndexMap;
    use jumpstarter_proto::value::Value;
    use std::sync::Arc;
    use uuid::Uuid;

    use super::*;
    use crate::driver::{Driver, MethodDescriptor};
    use crate::tree::TreeNode;

    struct OnOffDriver {
        methods: Vec<MethodDescriptor>,
    }
    #[async_trait]
    impl Driver for OnOffDriver {
        fn client_class(&self) -> &str { "jumpstarter.power.Mock" }

        fn methods(&self) -> &[MethodDescriptor] { &self.methods }

        async fn call(&self, method: &str, _args: Value, _resources: &dyn ResourceSource) -> Result<Value, ErrorKind> {
            match method {
                "on" | "off" => Ok(Value::from_json(&serde_json::json!("ok"))),
                _ => Err(ErrorKind::NotFound(method.to_string())),
            }
        }
    }

    struct NullResources;
    #[async_trait]
    impl ResourceSource for NullResources {
        async fn take(&self, uuid: Uuid) -> Result<crate::driver::ResourceReader, ErrorKind> { Err(ErrorKind::NotFound(uuid.to_string())) }
    }

    fn build_tree() -> DriverTree {
        let root = TreeNode::Leaf {
            uuid: Uuid::new_v4(),
            labels: [("name".to_string(), "power0".to_string())].into_iter().collect(),
            driver: Arc::new(OnOffDriver { methods: vec![MethodDescriptor::unary("on"), MethodDescriptor::unary("off")] }),
            children: IndexMap::new(),
        };
        DriverTree::new(root)
    }

    #[tokio::test]
    async fn dispatches_unary_call() {
        let tree = build_tree();
        let uuid = tree.root().uuid();
        let resources = NullResources;
        let value = driver_call(&tree, uuid, "on", Value::null(), &resources).await.unwrap();
        assert_eq!(value.into_json().unwrap(), serde_json::json!("ok"));
    }

    #[tokio::test]
    async fn unknown_method_is_not_found() {
        let tree = build_tree();
        let uuid = tree.root().uuid();
        let resources = NullResources;
        let err = driver_call(&tree, uuid, "reboot", Value::null(), &resources).await.unwrap_err();
        assert!(matches!(err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn streaming_call_against_unary_method_is_invalid_argument() {
        let tree = build_tree();
        let uuid = tree.root().uuid();
        let err = streaming_driver_call(&tree, uuid, "on", Value::null()).await.unwrap_err();
        assert!(matches!(err, ErrorKind::InvalidArgument(_)));
    }
}
