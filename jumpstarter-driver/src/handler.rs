//  HANDLER.rs
//
//  Description:
//!   Implements the wire-stable `Exporter` gRPC service (§4.5, §6) on
//!   top of a [`Session`]. Grounded on `brane-drv/src/handler.rs`'s
//!   `DriverHandler` and its `fatal_err!` macro for logging-then-failing
//!   a streaming RPC.
//

use std::sync::Arc;

use jumpstarter_proto::driver::{
    DriverCallReply, DriverCallRequest, DriverReport, GetReportRequest, LogEntry, LogStreamRequest, StreamFrame,
};
use jumpstarter_proto::errors::ErrorKind;
use jumpstarter_proto::exporter::ExporterService;
use log::error;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tonic::codec::Streaming;
use tonic::{Request, Response, Status};
use uuid::Uuid;

use crate::session::Session;
use crate::stream;

/// Sends an error back to the client on a streaming RPC's reply channel,
/// logging it first, then returns out of the calling function (mirrors
/// the donor's `fatal_err!`). The two arms match the two call sites: one
/// inside a spawned task (returns `()`), one inside the RPC method body
/// itself (must still return the `ReceiverStream` response so the
/// client sees the error on the stream rather than as a failed call).
macro_rules! fatal_err {
    ($tx:ident, $status:expr) => {{
        let status: Status = $status;
        error!("aborting streaming call: {status}");
        let _ = $tx.send(Err(status)).await;
        return;
    }};
    ($tx:ident, $rx:ident, $status:expr) => {{
        let status: Status = $status;
        error!("aborting streaming call: {status}");
        let _ = $tx.send(Err(status)).await;
        return Ok(Response::new(ReceiverStream::new($rx)));
    }};
}

/// Hosts the `Exporter` service for one [`Session`] (§4.5).
#[derive(Clone)]
pub struct ExporterHandler {
    session: Arc<Session>,
}
impl ExporterHandler {
    pub fn new(session: Arc<Session>) -> Self { Self { session } }
}

fn parse_uuid(raw: &str) -> Result<Uuid, Status> {
    raw.parse::<Uuid>().map_err(|_| Status::from(ErrorKind::InvalidArgument(format!("malformed uuid '{raw}'"))))
}

#[tonic::async_trait]
impl ExporterService for ExporterHandler {
    type LogStreamStream = ReceiverStream<Result<LogEntry, Status>>;
    type StreamStream = ReceiverStream<Result<StreamFrame, Status>>;
    type StreamingDriverCallStream = ReceiverStream<Result<DriverCallReply, Status>>;

    async fn get_report(&self, _request: Request<GetReportRequest>) -> Result<Response<DriverReport>, Status> {
        Ok(Response::new(self.session.report()))
    }

    async fn driver_call(&self, request: Request<DriverCallRequest>) -> Result<Response<DriverCallReply>, Status> {
        let request = request.into_inner();
        let uuid = parse_uuid(&request.uuid)?;
        let reply = self.session.driver_call(uuid, &request.method, request.args).await?;
        Ok(Response::new(reply))
    }

    async fn streaming_driver_call(&self, request: Request<DriverCallRequest>) -> Result<Response<Self::StreamingDriverCallStream>, Status> {
        let request = request.into_inner();
        let (tx, rx) = mpsc::channel::<Result<DriverCallReply, Status>>(16);

        let uuid = match parse_uuid(&request.uuid) {
            Ok(uuid) => uuid,
            Err(status) => fatal_err!(tx, rx, status),
        };

        let session = self.session.clone();
        tokio::spawn(async move {
            let mut values = match session.streaming_driver_call(uuid, &request.method, request.args).await {
                Ok(values) => values,
                Err(err) => fatal_err!(tx, err.into()),
            };
            use futures::StreamExt;
            while let Some(item) = values.next().await {
                let reply = match item {
                    Ok(value) => Ok(DriverCallReply { value }),
                    Err(err) => Err(err.into()),
                };
                if tx.send(reply).await.is_err() {
                    break;
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn stream(&self, request: Request<Streaming<StreamFrame>>) -> Result<Response<Self::StreamStream>, Status> {
        let mut incoming = request.into_inner();
        let (out_tx, out_rx) = mpsc::channel::<Result<StreamFrame, ErrorKind>>(16);

        // First frame carries the metadata that selects driver vs.
        // resource mode (§4.4, §6).
        let first = match incoming.message().await {
            Ok(Some(frame)) => frame,
            Ok(None) => return Err(Status::from(ErrorKind::InvalidArgument("Stream call closed before sending metadata".into()))),
            Err(status) => return Err(status),
        };
        let Some(metadata) = first.metadata else {
            return Err(Status::from(ErrorKind::InvalidArgument("Stream call's first frame carried no metadata".into())));
        };

        let (in_tx, in_rx) = mpsc::channel::<Vec<u8>>(16);
        tokio::spawn(async move {
            while let Ok(Some(frame)) = incoming.message().await {
                if let Some(payload) = frame.payload {
                    if in_tx.send(payload).await.is_err() {
                        break;
                    }
                }
            }
        });

        // `stream::run` borrows the tree/registry for the call's
        // duration; clone the session's `Arc` into the spawned task so
        // the borrow is backed by something `'static`.
        let session = self.session.clone();
        tokio::spawn(async move {
            stream::run(session.tree(), session.registry(), jumpstarter_proto::driver::StreamRequest { kind: metadata.kind }, in_rx, out_tx).await;
        });

        let out_rx = map_status_stream(out_rx);
        Ok(Response::new(ReceiverStream::new(out_rx)))
    }

    async fn log_stream(&self, _request: Request<LogStreamRequest>) -> Result<Response<Self::LogStreamStream>, Status> {
        let mut receiver = self.session.subscribe_logs();
        let (tx, rx) = mpsc::channel::<Result<LogEntry, Status>>(16);

        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(entry) => {
                        if tx.send(Ok(entry)).await.is_err() {
                            break;
                        }
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        let gap = LogEntry {
                            ts: std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0),
                            level: jumpstarter_proto::driver::LogLevel::Warn as i32,
                            logger: "jumpstarter.logstream".into(),
                            source: None,
                            message: format!("dropped {skipped} log entries (slow subscriber)"),
                        };
                        if tx.send(Ok(gap)).await.is_err() {
                            break;
                        }
                    },
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}

/// Converts a `mpsc::Receiver<Result<T, ErrorKind>>` into one yielding
/// `Result<T, Status>`, by re-wrapping it as a fresh channel (needed
/// because the receiver type is the one the trait's associated
/// `Stream` type actually names).
fn map_status_stream(mut rx: mpsc::Receiver<Result<StreamFrame, ErrorKind>>) -> mpsc::Receiver<Result<StreamFrame, Status>> {
    let (tx, mapped_rx) = mpsc::channel(16);
    tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            if tx.send(item.map_err(Status::from)).await.is_err() {
                break;
            }
        }
    });
    mapped_rx
}
