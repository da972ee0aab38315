//  MOCK_STORAGE_MUX.rs
//
//  Description:
//!   A driver exporting `write`, accepting either resource-handle
//!   variant (§4.6) and persisting the bytes to a temporary file,
//!   fsync'd on completion. Stands in for a real storage-mux driver
//!   (§8 scenario (d)).
//

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use jumpstarter_proto::errors::ErrorKind;
use jumpstarter_proto::value::Value;
use serde::Deserialize;
use serde_json::json;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

use crate::driver::{Driver, MethodDescriptor, ResourceSource};

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum HandleArg {
    ClientStream { uuid: String },
    PresignedRequest { method: String, url: String, #[serde(default)] headers: HashMap<String, String> },
}

pub struct MockStorageMuxDriver {
    methods: Vec<MethodDescriptor>,
    destination: PathBuf,
}
impl MockStorageMuxDriver {
    pub fn new() -> Self {
        Self { methods: vec![MethodDescriptor::unary("write")], destination: std::env::temp_dir().join(format!("jumpstarter-storage-{}.bin", Uuid::new_v4())) }
    }

    /// Exposes where the mux last wrote its bytes, for tests and
    /// debugging; not part of the wire protocol.
    pub fn destination(&self) -> &PathBuf { &self.destination }
}
impl Default for MockStorageMuxDriver {
    fn default() -> Self { Self::new() }
}

#[async_trait]
impl Driver for MockStorageMuxDriver {
    fn client_class(&self) -> &str { "jumpstarter.storage.MockMux" }

    fn methods(&self) -> &[MethodDescriptor] { &self.methods }

    async fn call(&self, method: &str, args: Value, resources: &dyn ResourceSource) -> Result<Value, ErrorKind> {
        if method != "write" {
            return Err(ErrorKind::NotFound(format!("mock storage-mux driver exports no method '{method}'")));
        }

        let json = args.into_json().map_err(|err| ErrorKind::InvalidArgument(err.to_string()))?;
        let handle: HandleArg = serde_json::from_value(json).map_err(|err| ErrorKind::InvalidArgument(format!("malformed resource handle: {err}")))?;

        let mut file = File::create(&self.destination).await.map_err(|err| ErrorKind::Internal(err.to_string()))?;
        match handle {
            HandleArg::ClientStream { uuid } => {
                let uuid: Uuid = uuid.parse().map_err(|_| ErrorKind::InvalidArgument(format!("malformed resource uuid '{uuid}'")))?;
                let mut reader = resources.take(uuid).await?;
                tokio::io::copy(&mut reader, &mut file).await.map_err(|err| ErrorKind::Internal(err.to_string()))?;
            },
            HandleArg::PresignedRequest { method, url, headers } => {
                if method != "GET" {
                    return Err(ErrorKind::InvalidArgument(format!("storage write only accepts a GET presigned request, got '{method}'")));
                }
                let client = reqwest::Client::new();
                let mut request = client.get(&url);
                for (key, value) in headers {
                    request = request.header(key, value);
                }
                let response = request.send().await.map_err(|err| ErrorKind::Internal(err.to_string()))?;
                let bytes = response.bytes().await.map_err(|err| ErrorKind::Internal(err.to_string()))?;
                file.write_all(&bytes).await.map_err(|err| ErrorKind::Internal(err.to_string()))?;
            },
        }
        file.sync_all().await.map_err(|err| ErrorKind::Internal(err.to_string()))?;

        Ok(Value::from_json(&json!("ok")))
    }
}

#[cfg(test)]
mod tests {
    use crate::registry::ResourceRegistry;

    use super::*;

    #[tokio::test]
    async fn writes_client_stream_bytes_exactly_and_consumes_once() {
        let driver = MockStorageMuxDriver::new();
        let registry = ResourceRegistry::new();
        let uuid = Uuid::new_v4();
        let payload = vec![7u8; 1024];
        registry.register(uuid, Box::pin(std::io::Cursor::new(payload.clone())));

        let args = Value::from_json(&json!({"client_stream": {"uuid": uuid.to_string()}}));
        let result = driver.call("write", args.clone(), &registry).await.unwrap();
        assert_eq!(result.into_json().unwrap(), json!("ok"));

        let mut written = Vec::new();
        File::open(driver.destination()).await.unwrap().read_to_end(&mut written).await.unwrap();
        assert_eq!(written, payload);

        let err = driver.call("write", args, &registry).await.unwrap_err();
        assert!(matches!(err, ErrorKind::NotFound(_)));

        let _ = tokio::fs::remove_file(driver.destination()).await;
    }
}
