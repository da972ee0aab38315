//  FORWARD.rs
//
//  Description:
//!   Bidirectional byte-stream forwarding between a local duplex
//!   transport (a TCP connection to a local gRPC server) and a router
//!   `Stream`/`Dial` bidi RPC. Direct reimplementation of
//!   `jumpstarter/streams/common.py`'s `copy_stream`/`forward_stream`
//!   pair, already reused once for the exporter's own stream
//!   multiplexer (`jumpstarter-driver::stream`) and applied here to the
//!   router tunnel instead of a driver endpoint.

use jumpstarter_proto::driver::StreamFrame;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tonic::Streaming;

/// Matches the multiplexer's own chunk size (§4.4); the router tunnel
/// carries the same `StreamFrame` wire shape end to end.
const CHUNK_SIZE: usize = 32 * 1024;

/// Copies bytes both ways between `io` and a `StreamFrame` bidi call
/// until either side closes or errors. `outbound` is drained by the
/// caller's streaming request; `inbound` is the response stream of that
/// same call.
pub async fn forward_stream<S>(io: S, outbound: mpsc::Sender<StreamFrame>, mut inbound: Streaming<StreamFrame>)
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (mut read_half, mut write_half) = tokio::io::split(io);

    let local_to_router = async {
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            match read_half.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let frame = StreamFrame { metadata: None, payload: Some(buf[..n].to_vec()) };
                    if outbound.send(frame).await.is_err() {
                        break;
                    }
                },
            }
        }
    };

    let router_to_local = async {
        loop {
            match inbound.message().await {
                Ok(Some(frame)) => {
                    if let Some(payload) = frame.payload {
                        if write_half.write_all(&payload).await.is_err() {
                            break;
                        }
                    }
                },
                _ => break,
            }
        }
        let _ = write_half.shutdown().await;
    };

    tokio::select! {
        _ = local_to_router => {},
        _ = router_to_local => {},
    }
}
