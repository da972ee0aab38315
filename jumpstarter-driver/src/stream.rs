//  STREAM.rs
//
//  Description:
//!   The stream multiplexer (§4.4): turns a `Stream` bidi gRPC call's
//!   leading `StreamRequest` into either a driver byte-stream endpoint or
//!   a resource-registry attachment, then copies bytes both ways with
//!   backpressure until either side half-closes. Grounded on
//!   `jumpstarter/streams/common.py`'s `copy_stream`/`forward_stream`
//!   pair, reimplemented as two `tokio::spawn`ed copy loops joined with
//!   `tokio::select!`.
//

use jumpstarter_proto::driver::{StreamFrame, StreamRequest, StreamRequestKind};
use jumpstarter_proto::errors::ErrorKind;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::driver::DriverStreamEndpoint;
use crate::registry::ResourceRegistry;
use crate::tree::DriverTree;

/// One 16-64 KiB-ish chunk of a frame payload (§4.4: "≥16 KiB / ≤64 KiB
/// pieces per message").
const CHUNK_SIZE: usize = 32 * 1024;
/// Bounded queue depth per direction — one network MTU's worth of
/// messages in flight before backpressure kicks in (§4.4).
const QUEUE_DEPTH: usize = 16;

/// Parses the leading [`StreamFrame`] of a `Stream` call and opens the
/// corresponding endpoint, then drives both copy loops until completion.
///
/// `inbound` yields frames received from the gRPC peer (payload-only
/// after the first); `outbound` is where frames destined for the peer
/// are pushed. The caller (the `Exporter` service handler) is
/// responsible for turning `outbound` into gRPC response frames.
pub async fn run(
    tree: &DriverTree,
    registry: &ResourceRegistry,
    metadata: StreamRequest,
    mut inbound: mpsc::Receiver<Vec<u8>>,
    outbound: mpsc::Sender<Result<StreamFrame, ErrorKind>>,
) {
    let endpoint = match metadata.kind {
        Some(StreamRequestKind::Driver(target)) => {
            let Ok(driver_uuid) = target.uuid.parse::<Uuid>() else {
                let _ = outbound.send(Err(ErrorKind::InvalidArgument(format!("malformed driver uuid '{}'", target.uuid)))).await;
                return;
            };
            match open_driver_endpoint(tree, driver_uuid, &target.method).await {
                Ok(endpoint) => endpoint,
                Err(err) => {
                    let _ = outbound.send(Err(err)).await;
                    return;
                },
            }
        },
        Some(StreamRequestKind::Resource(target)) => {
            let Ok(resource_uuid) = target.uuid.parse::<Uuid>() else {
                let _ = outbound.send(Err(ErrorKind::InvalidArgument(format!("malformed resource uuid '{}'", target.uuid)))).await;
                return;
            };
            attach_resource_sink(registry, resource_uuid, inbound, outbound).await;
            return;
        },
        None => {
            let _ = outbound.send(Err(ErrorKind::InvalidArgument("Stream call sent no leading metadata".into()))).await;
            return;
        },
    };

    copy_both_ways(endpoint, inbound, outbound).await;
}

async fn open_driver_endpoint(tree: &DriverTree, uuid: Uuid, method: &str) -> Result<DriverStreamEndpoint, ErrorKind> {
    let driver = tree.resolve(uuid)?;
    driver.open_stream(method).await
}

/// The `resource { uuid }` variant (§4.4, §4.6 variant 1): the client is
/// *uploading* into the registry rather than conversing with a driver.
/// Bytes flow inbound→registry only; no outbound traffic is expected
/// until the stream half-closes, at which point we acknowledge closure.
async fn attach_resource_sink(
    registry: &ResourceRegistry,
    uuid: Uuid,
    mut inbound: mpsc::Receiver<Vec<u8>>,
    outbound: mpsc::Sender<Result<StreamFrame, ErrorKind>>,
) {
    // One half is registered for the driver to `take()` later; bytes
    // arriving from the client are written into the other half as they
    // come in, so the driver can read them as an ordinary `AsyncRead`
    // once it consumes the resource handle.
    let (server_half, client_half) = tokio::io::duplex(CHUNK_SIZE * QUEUE_DEPTH);
    registry.register(uuid, Box::pin(server_half));

    let mut client_half = client_half;
    while let Some(chunk) = inbound.recv().await {
        if client_half.write_all(&chunk).await.is_err() {
            break;
        }
    }
    let _ = client_half.shutdown().await;
    let _ = outbound.send(Ok(StreamFrame { metadata: None, payload: None })).await;
}

/// Runs the two concurrent copy loops for a `driver { ... }` stream open
/// (§4.4): client→driver and driver→client, until either side
/// half-closes or either copy fails — at which point the other
/// direction is closed too (dropping `endpoint` at function exit runs
/// the driver's teardown, §9 "guaranteed... on all paths").
async fn copy_both_ways(mut endpoint: DriverStreamEndpoint, mut inbound: mpsc::Receiver<Vec<u8>>, outbound: mpsc::Sender<Result<StreamFrame, ErrorKind>>) {
    let (mut read_half, mut write_half) = tokio::io::split(&mut endpoint);

    let client_to_driver = async {
        while let Some(chunk) = inbound.recv().await {
            if write_half.write_all(&chunk).await.is_err() {
                break;
            }
        }
        let _ = write_half.shutdown().await;
    };

    let driver_to_client = async {
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            match read_half.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if outbound.send(Ok(StreamFrame { metadata: None, payload: Some(buf[..n].to_vec()) })).await.is_err() {
                        break;
                    }
                },
                Err(_) => break,
            }
        }
    };

    tokio::select! {
        _ = client_to_driver => {},
        _ = driver_to_client => {},
    }
}
