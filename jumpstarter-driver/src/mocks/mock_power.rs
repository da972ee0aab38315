//  MOCK_POWER.rs
//
//  Description:
//!   A driver exporting `on`/`off` (unary) and `read` (streaming),
//!   standing in for a real power-switch driver (§3 "Power reading",
//!   §8 scenario (b)).
//

use async_trait::async_trait;
use futures::stream;
use jumpstarter_proto::errors::ErrorKind;
use jumpstarter_proto::value::Value;
use serde_json::json;

use crate::driver::{Driver, MethodDescriptor, ResourceSource, ValueStream};

pub struct MockPowerDriver {
    methods: Vec<MethodDescriptor>,
}
impl Default for MockPowerDriver {
    fn default() -> Self { Self { methods: vec![MethodDescriptor::unary("on"), MethodDescriptor::unary("off"), MethodDescriptor::streaming("read")] } }
}

#[async_trait]
impl Driver for MockPowerDriver {
    fn client_class(&self) -> &str { "jumpstarter.power.Mock" }

    fn methods(&self) -> &[MethodDescriptor] { &self.methods }

    async fn call(&self, method: &str, _args: Value, _resources: &dyn ResourceSource) -> Result<Value, ErrorKind> {
        match method {
            "on" | "off" => Ok(Value::from_json(&json!("ok"))),
            _ => Err(ErrorKind::NotFound(format!("mock power driver exports no unary method '{method}'"))),
        }
    }

    async fn call_streaming(&self, method: &str, _args: Value) -> Result<ValueStream, ErrorKind> {
        if method != "read" {
            return Err(ErrorKind::NotFound(format!("mock power driver exports no streaming method '{method}'")));
        }
        let readings = vec![
            Ok(Value::from_json(&json!({"voltage": 0.0, "current": 0.0}))),
            Ok(Value::from_json(&json!({"voltage": 5.0, "current": 2.0}))),
        ];
        Ok(Box::pin(stream::iter(readings)))
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    #[tokio::test]
    async fn on_off_return_ok() {
        let driver = MockPowerDriver::default();
        let resources = crate::registry::ResourceRegistry::new();
        assert_eq!(driver.call("on", Value::null(), &resources).await.unwrap().into_json().unwrap(), json!("ok"));
        assert_eq!(driver.call("off", Value::null(), &resources).await.unwrap().into_json().unwrap(), json!("ok"));
    }

    #[tokio::test]
    async fn read_yields_two_readings_in_order() {
        let driver = MockPowerDriver::default();
        let mut stream = driver.call_streaming("read", Value::null()).await.unwrap();
        let first = stream.next().await.unwrap().unwrap().into_json().unwrap();
        let second = stream.next().await.unwrap().unwrap().into_json().unwrap();
        assert_eq!(first, json!({"voltage": 0.0, "current": 0.0}));
        assert_eq!(second, json!({"voltage": 5.0, "current": 2.0}));
        assert!(stream.next().await.is_none());
    }
}
