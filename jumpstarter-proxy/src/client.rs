//  CLIENT.rs
//
//  Description:
//!   The client-side router dial (§4.8 "Client side: dials the
//!   router-as-service"). Grounded on `brane-prx/src/client.rs`'s
//!   `create_path()` for style — a small free function plus a dedicated
//!   error enum — applied to a `Dial(lease)` tonic call instead of an
//!   HTTP POST, since the fabric's router speaks gRPC end to end rather
//!   than a REST control plane.

use jumpstarter_proto::driver::StreamFrame;
use jumpstarter_proto::router::RouterServiceClient;
use log::info;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::errors::DialError;
use crate::forward::forward_stream;

const QUEUE_DEPTH: usize = 16;

/// Dials the router for `lease_name` and binds a local TCP listener that
/// forwards every accepted connection through that tunnel — i.e. a local
/// stand-in address a client can point its `ExporterServiceClient` at as
/// if the leased exporter were local.
pub async fn dial(router_endpoint: &str, lease_name: &str, local_bind_addr: &str) -> Result<String, DialError> {
    let listener = TcpListener::bind(local_bind_addr)
        .await
        .map_err(|err| DialError::LocalListenError { address: local_bind_addr.to_string(), err })?;
    let bound = listener.local_addr().map_err(|err| DialError::LocalListenError { address: local_bind_addr.to_string(), err })?.to_string();

    let router_endpoint = router_endpoint.to_string();
    let lease_name = lease_name.to_string();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let router_endpoint = router_endpoint.clone();
                    let lease_name = lease_name.clone();
                    tokio::spawn(async move {
                        if let Err(err) = service_connection(&router_endpoint, &lease_name, stream).await {
                            log::warn!("router tunnel for '{peer}' ended with an error: {err}");
                        }
                    });
                },
                Err(err) => {
                    log::error!("local tunnel listener accept failed: {err}");
                    return;
                },
            }
        }
    });

    Ok(bound)
}

async fn service_connection(router_endpoint: &str, lease_name: &str, local: TcpStream) -> Result<(), DialError> {
    let mut router = RouterServiceClient::connect(router_endpoint.to_string())
        .await
        .map_err(|err| DialError::ConnectError { address: router_endpoint.to_string(), err })?;

    let (tx, rx) = mpsc::channel::<StreamFrame>(QUEUE_DEPTH);
    let response = router
        .dial(lease_name, ReceiverStream::new(rx))
        .await
        .map_err(|err| DialError::DialFailed { lease_name: lease_name.to_string(), err })?;

    info!("dialled lease '{lease_name}' through router '{router_endpoint}'");
    forward_stream(local, tx, response.into_inner()).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dial_binds_and_returns_the_resolved_local_address() {
        let bound = dial("http://127.0.0.1:1", "lease-does-not-exist", "127.0.0.1:0").await.unwrap();
        assert!(bound.starts_with("127.0.0.1:"));
        assert_ne!(bound, "127.0.0.1:0");
    }
}
