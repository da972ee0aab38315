//  DRIVER.rs
//
//  Description:
//!   Defines the `Driver` trait that every exported device implementation
//!   satisfies (§3, §4.2, §4.3, §9 "`@export`/`@exportstream` method
//!   tagging"), plus the resource-source seam drivers use to consume
//!   client-uploaded byte streams (§4.6).
//

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use jumpstarter_proto::driver::MethodKind;
use jumpstarter_proto::errors::ErrorKind;
use jumpstarter_proto::value::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use uuid::Uuid;

/// One entry of a driver type's method table, built once at driver
/// construction (§9: "explicit descriptor table per driver type").
#[derive(Clone, Debug)]
pub struct MethodDescriptor {
    pub name: String,
    pub kind: MethodKind,
}
impl MethodDescriptor {
    pub fn unary(name: impl Into<String>) -> Self { Self { name: name.into(), kind: MethodKind::Unary } }

    pub fn streaming(name: impl Into<String>) -> Self { Self { name: name.into(), kind: MethodKind::Streaming } }

    pub fn export_stream(name: impl Into<String>) -> Self { Self { name: name.into(), kind: MethodKind::ExportStream } }
}

/// A byte stream read from the client's side of a `Stream(resource{uuid})`
/// upload (§4.6 variant 1).
pub type ResourceReader = Pin<Box<dyn AsyncRead + Send + Unpin>>;

/// One half of a driver-opened byte stream (§4.4 "exportstream"): what the
/// multiplexer copies bytes to/from. Closing it (dropping both halves)
/// triggers the paired teardown.
pub type DriverStreamEndpoint = Pin<Box<dyn AsyncReadWrite + Send>>;

/// Convenience bound combining `AsyncRead` + `AsyncWrite`, since driver
/// stream endpoints are full-duplex (§4.4).
pub trait AsyncReadWrite: AsyncRead + AsyncWrite {}
impl<T: AsyncRead + AsyncWrite> AsyncReadWrite for T {}

/// Lets a driver claim a client-uploaded resource stream by UUID (§4.6
/// variant 1). Implemented by the session's resource registry; passed
/// into `Driver::call` as context so drivers never reach into session
/// internals directly.
#[async_trait]
pub trait ResourceSource: Send + Sync {
    /// Claims the resource registered under `uuid`. Fails with
    /// [`ErrorKind::NotFound`] if no such UUID is open, or if it has
    /// already been consumed (§3 "a handle is consumed exactly once",
    /// §8 property 4).
    async fn take(&self, uuid: Uuid) -> Result<ResourceReader, ErrorKind>;
}

/// A boxed stream of call results, as yielded by a server-streaming
/// method (§4.3 `StreamingDriverCall`).
pub type ValueStream = Pin<Box<dyn Stream<Item = Result<Value, ErrorKind>> + Send>>;

/// A server-side device implementation (§3 "Driver node").
///
/// Every driver declares its client-class identifier and its method
/// table once; `call`/`call_streaming`/`open_stream` dispatch by method
/// name against that table. Dispatch-level checks (unknown method,
/// streaming/unary mismatch) live in [`crate::dispatch`]; a `Driver`
/// impl can assume it is only ever asked for a method it advertised,
/// via the kind it advertised it as.
#[async_trait]
pub trait Driver: Send + Sync {
    /// The opaque dotted string the client resolves to a concrete proxy
    /// class (§3, §4.7).
    fn client_class(&self) -> &str;

    /// This driver's exported-method table (§4.2, §9).
    fn methods(&self) -> &[MethodDescriptor];

    /// Invokes a unary method (§4.3 `DriverCall`).
    async fn call(&self, method: &str, args: Value, resources: &dyn ResourceSource) -> Result<Value, ErrorKind>;

    /// Invokes a server-streaming method (§4.3 `StreamingDriverCall`).
    /// Default implementation errors with `InvalidArgument`; drivers that
    /// advertise a `Streaming` method must override this.
    async fn call_streaming(&self, method: &str, _args: Value) -> Result<ValueStream, ErrorKind> {
        Err(ErrorKind::InvalidArgument(format!("driver does not implement a streaming override for '{method}'")))
    }

    /// Opens a byte-stream endpoint for an `exportstream` method (§4.4,
    /// §9 "scoped acquisition"). The returned endpoint is the driver's
    /// side of the conversation; the multiplexer owns copying bytes to
    /// and from it and guarantees it is dropped (hence torn down)
    /// exactly once, on every exit path.
    async fn open_stream(&self, method: &str) -> Result<DriverStreamEndpoint, ErrorKind> {
        Err(ErrorKind::InvalidArgument(format!("driver does not export a stream method '{method}'")))
    }

    /// Runs once, in reverse enumeration order, when the owning session
    /// shuts down (§4.5). Default no-op; drivers holding OS resources
    /// (subprocesses, file handles) override it.
    async fn teardown(&self) {}
}
