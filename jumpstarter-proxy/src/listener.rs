//  LISTENER.rs
//
//  Description:
//!   The exporter-side router tunnel (§4.8). Direct reimplementation of
//!   `jumpstarter/exporter/listener.py`'s `Listener`: `Register` once
//!   against the router's control endpoint, then a long-lived `Listen()`
//!   loop, spawning one dial-and-forward task per assignment the router
//!   hands out. The bearer token travels as per-call metadata rather
//!   than Python's composite gRPC credentials, since the hand-rolled
//!   `RouterServiceClient` is monomorphic over a plain `Channel`.

use std::collections::HashMap;

use jumpstarter_proto::driver::{DriverReport, StreamFrame};
use jumpstarter_proto::router::{ListenRequest, RegisterRequest, RouterServiceClient};
use jumpstarter_proto::transport::Endpoint;
use log::{debug, info, warn};
use tokio::net::{TcpStream, UnixStream};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::Request;
use uuid::Uuid;

use crate::errors::ListenerError;
use crate::forward::forward_stream;

/// One bounded outbound queue's worth of in-flight frames per tunnel,
/// mirroring the multiplexer's own `QUEUE_DEPTH` (§4.4).
const QUEUE_DEPTH: usize = 16;

/// Registers an exporter with the router and services whatever
/// connections it assigns, until `Listen()` ends or errors.
pub struct Listener {
    uuid: Uuid,
    labels: HashMap<String, String>,
    router_control_addr: Endpoint,
    local_exporter_addr: Endpoint,
    device_report: DriverReport,
}

impl Listener {
    pub fn new(uuid: Uuid, labels: HashMap<String, String>, router_control_addr: Endpoint, local_exporter_addr: Endpoint, device_report: DriverReport) -> Self {
        Self { uuid, labels, router_control_addr, local_exporter_addr, device_report }
    }

    /// Runs until the router closes `Listen()` or a fatal error occurs.
    /// Individual assignment failures are logged and do not end the loop.
    pub async fn serve(&self) -> Result<(), ListenerError> {
        let mut client = RouterServiceClient::connect_endpoint(&self.router_control_addr)
            .await
            .map_err(|err| ListenerError::ConnectError { address: self.router_control_addr.to_string(), err })?;

        client
            .register(RegisterRequest { uuid: self.uuid.to_string(), labels: self.labels.clone(), device_report: self.device_report.clone() })
            .await
            .map_err(|err| ListenerError::RegisterFailed { err })?;
        info!("registered exporter {} with router at {}", self.uuid, self.router_control_addr);

        let mut assignments = client.listen(ListenRequest {}).await.map_err(|err| ListenerError::ListenStreamError { err })?.into_inner();

        loop {
            match assignments.message().await {
                Ok(Some(assignment)) => {
                    let local_addr = self.local_exporter_addr.clone();
                    tokio::spawn(async move {
                        if let Err(err) = handle(assignment.router_endpoint.clone(), assignment.router_token, local_addr).await {
                            warn!("router assignment to '{}' failed: {err}", assignment.router_endpoint);
                        }
                    });
                },
                Ok(None) => {
                    debug!("router closed Listen() for exporter {}", self.uuid);
                    return Ok(());
                },
                Err(err) => return Err(ListenerError::ListenStreamError { err }),
            }
        }
    }
}

/// Services one assignment: dials the router endpoint, opens its `Stream`
/// bidi call, opens a local connection to the exporter's own gRPC server,
/// and forwards bytes between the two until either side closes.
async fn handle(router_endpoint: String, router_token: String, local_exporter_addr: Endpoint) -> Result<(), ListenerError> {
    let mut router = RouterServiceClient::connect(router_endpoint.clone())
        .await
        .map_err(|err| ListenerError::DialFailed { address: router_endpoint.clone(), err })?;

    let (tx, rx) = mpsc::channel::<StreamFrame>(QUEUE_DEPTH);
    let mut request = Request::new(ReceiverStream::new(rx));
    let token = format!("Bearer {router_token}").parse().map_err(|_| ListenerError::InvalidToken)?;
    request.metadata_mut().insert("authorization", token);

    let response = router.stream(request).await.map_err(|err| ListenerError::ListenStreamError { err })?;

    match &local_exporter_addr {
        Endpoint::Tcp(host, port) => {
            let address = format!("{host}:{port}");
            let local = TcpStream::connect(&address).await.map_err(|err| ListenerError::LocalConnectError { address, err })?;
            forward_stream(local, tx, response.into_inner()).await;
        },
        Endpoint::Unix(path) => {
            let local = UnixStream::connect(path).await.map_err(|err| ListenerError::LocalConnectError { address: local_exporter_addr.to_string(), err })?;
            forward_stream(local, tx, response.into_inner()).await;
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_carries_its_identity() {
        let uuid = Uuid::new_v4();
        let listener = Listener::new(uuid, HashMap::new(), Endpoint::tcp("127.0.0.1", 9000), Endpoint::tcp("127.0.0.1", 9001), DriverReport::default());
        assert_eq!(listener.uuid, uuid);
    }
}
