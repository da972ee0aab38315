//  REGISTRY.rs
//
//  Description:
//!   The session's resource registry (§3 "Session", §4.6): a map from
//!   resource UUID to the client-uploaded byte stream it names, mutated
//!   only under the registry's own lock (§5 "Shared resources") and
//!   consumed at most once (§8 property 4). Grounded on the donor's use
//!   of `dashmap` for its session/VM map in `brane-drv/src/handler.rs`.
//

use dashmap::DashMap;
use jumpstarter_proto::errors::ErrorKind;
use uuid::Uuid;

use crate::driver::{ResourceReader, ResourceSource};
use async_trait::async_trait;

/// Holds resource streams the client has opened via
/// `Stream(resource{uuid})` but that no driver call has consumed yet.
#[derive(Default)]
pub struct ResourceRegistry {
    open: DashMap<Uuid, ResourceReader>,
}
impl ResourceRegistry {
    pub fn new() -> Self { Self::default() }

    /// Registers a newly-opened resource stream under `uuid`. Overwrites
    /// silently if `uuid` was already registered and never consumed —
    /// the client is responsible for using fresh UUIDs per upload.
    pub fn register(&self, uuid: Uuid, reader: ResourceReader) { self.open.insert(uuid, reader); }

    /// Returns whether `uuid` is currently registered and unconsumed.
    pub fn contains(&self, uuid: Uuid) -> bool { self.open.contains_key(&uuid) }
}

#[async_trait]
impl ResourceSource for ResourceRegistry {
    async fn take(&self, uuid: Uuid) -> Result<ResourceReader, ErrorKind> {
        self.open.remove(&uuid).map(|(_, reader)| reader).ok_or_else(|| ErrorKind::NotFound(format!("no open resource stream '{uuid}'")))
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;

    #[tokio::test]
    async fn resource_is_consumed_exactly_once() {
        let registry = ResourceRegistry::new();
        let uuid = Uuid::new_v4();
        registry.register(uuid, Box::pin(std::io::Cursor::new(b"hello".to_vec())));

        let mut reader = registry.take(uuid).await.unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"hello");

        let err = registry.take(uuid).await.unwrap_err();
        assert!(matches!(err, ErrorKind::NotFound(_)));
    }
}
