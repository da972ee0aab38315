//  COMPOSITE.rs
//
//  Description:
//!   The `jumpstarter.composite` driver: a pure container node with no
//!   exported methods of its own, used for `DriverInstance`s that carry
//!   only `children` (§6 "missing `type` defaults to the composite
//!   driver").
//

use async_trait::async_trait;
use jumpstarter_proto::errors::ErrorKind;
use jumpstarter_proto::value::Value;

use crate::driver::{Driver, MethodDescriptor, ResourceSource};

pub struct CompositeDriver;

#[async_trait]
impl Driver for CompositeDriver {
    fn client_class(&self) -> &str { "jumpstarter.composite" }

    fn methods(&self) -> &[MethodDescriptor] { &[] }

    async fn call(&self, method: &str, _args: Value, _resources: &dyn ResourceSource) -> Result<Value, ErrorKind> {
        Err(ErrorKind::NotFound(format!("the composite driver exports no method '{method}'")))
    }
}
