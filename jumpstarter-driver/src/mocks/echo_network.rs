//  ECHO_NETWORK.rs
//
//  Description:
//!   A driver exporting one `exportstream` method, `connect`, that
//!   echoes back whatever bytes it receives (§8 scenario (a), property
//!   5 "stream copy preserves bytes").
//

use async_trait::async_trait;
use jumpstarter_proto::errors::ErrorKind;
use jumpstarter_proto::value::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::driver::{Driver, DriverStreamEndpoint, MethodDescriptor, ResourceSource};

/// Buffer size for the internal echo loop; unrelated to the
/// multiplexer's own chunk size, just large enough not to matter.
const ECHO_BUF: usize = 8 * 1024;

pub struct EchoNetworkDriver {
    methods: Vec<MethodDescriptor>,
}
impl Default for EchoNetworkDriver {
    fn default() -> Self { Self { methods: vec![MethodDescriptor::export_stream("connect")] } }
}

#[async_trait]
impl Driver for EchoNetworkDriver {
    fn client_class(&self) -> &str { "jumpstarter.network.Echo" }

    fn methods(&self) -> &[MethodDescriptor] { &self.methods }

    async fn call(&self, method: &str, _args: Value, _resources: &dyn ResourceSource) -> Result<Value, ErrorKind> {
        Err(ErrorKind::NotFound(format!("echo-network driver exports no unary method '{method}'")))
    }

    async fn open_stream(&self, method: &str) -> Result<DriverStreamEndpoint, ErrorKind> {
        if method != "connect" {
            return Err(ErrorKind::NotFound(format!("echo-network driver exports no stream method '{method}'")));
        }
        let (our_half, their_half) = tokio::io::duplex(ECHO_BUF);
        tokio::spawn(async move {
            let (mut reader, mut writer) = tokio::io::split(our_half);
            let mut buf = vec![0u8; ECHO_BUF];
            loop {
                match reader.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if writer.write_all(&buf[..n]).await.is_err() {
                            break;
                        }
                    },
                }
            }
        });
        Ok(Box::pin(their_half))
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn echoes_bytes_back_in_order() {
        let driver = EchoNetworkDriver::default();
        let mut endpoint = driver.open_stream("connect").await.unwrap();

        endpoint.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        endpoint.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
    }
}
