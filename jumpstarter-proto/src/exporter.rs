//  EXPORTER.rs
//
//  Description:
//!   Hand-rolled client, trait and server for the wire-stable `Exporter`
//!   gRPC service (§4.5, §6): `GetReport`, `DriverCall`,
//!   `StreamingDriverCall`, `Stream` and `LogStream`.

use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use prost::Message;
use tonic::body::{empty_body, BoxBody};
use tonic::client::Grpc as GrpcClient;
use tonic::codec::{ProstCodec, Streaming};
use tonic::codegen::{http, Body, BoxFuture, Context, Poll, Service, StdError};
use tonic::server::{Grpc as GrpcServer, NamedService, ServerStreamingService, StreamingService, UnaryService};
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Request, Response, Status};

pub use crate::errors::ServiceError as Error;
use crate::driver::{
    DriverCallReply, DriverCallRequest, DriverReport, GetReportRequest, LogEntry, LogStreamRequest, StreamFrame,
};

/// The ExporterServiceClient can connect to a remote server implementing
/// the Exporter protocol.
#[derive(Debug, Clone)]
pub struct ExporterServiceClient {
    client: GrpcClient<Channel>,
}

impl ExporterServiceClient {
    /// Attempts to connect to the remote endpoint.
    ///
    /// # Errors
    /// This function errors if the connection could not be established.
    pub async fn connect(address: impl Into<String>) -> Result<Self, Error> {
        let address: String = address.into();
        let conn: Channel = match Endpoint::new(address.clone()) {
            Ok(endpoint) => match endpoint.connect().await {
                Ok(conn) => conn,
                Err(err) => return Err(Error::ConnectError { address, err }),
            },
            Err(err) => return Err(Error::EndpointError { address, err }),
        };
        Ok(Self { client: GrpcClient::new(conn) })
    }

    /// Wraps an already-established channel (used by the router-dialled
    /// client path, §4.8, where the channel is not obtained via a plain
    /// address but via the router's `Dial` response).
    pub fn from_channel(channel: Channel) -> Self { Self { client: GrpcClient::new(channel) } }

    /// Dials a [`crate::transport::Endpoint`] directly, supporting a
    /// `unix://` local exporter address alongside the usual TCP one (§4.5).
    pub async fn connect_endpoint(endpoint: &crate::transport::Endpoint) -> Result<Self, Error> {
        Ok(Self { client: GrpcClient::new(endpoint.connect().await?) })
    }

    pub async fn get_report(&mut self, request: impl tonic::IntoRequest<GetReportRequest>) -> Result<Response<DriverReport>, Status> {
        if let Err(err) = self.client.ready().await {
            return Err(Status::new(Code::Unknown, format!("Service was not ready: {err}")));
        }
        let codec: ProstCodec<_, _> = ProstCodec::default();
        let path: http::uri::PathAndQuery = http::uri::PathAndQuery::from_static("/jumpstarter.Exporter/GetReport");
        self.client.unary(request.into_request(), path, codec).await
    }

    pub async fn driver_call(&mut self, request: impl tonic::IntoRequest<DriverCallRequest>) -> Result<Response<DriverCallReply>, Status> {
        if let Err(err) = self.client.ready().await {
            return Err(Status::new(Code::Unknown, format!("Service was not ready: {err}")));
        }
        let codec: ProstCodec<_, _> = ProstCodec::default();
        let path: http::uri::PathAndQuery = http::uri::PathAndQuery::from_static("/jumpstarter.Exporter/DriverCall");
        self.client.unary(request.into_request(), path, codec).await
    }

    pub async fn streaming_driver_call(
        &mut self,
        request: impl tonic::IntoRequest<DriverCallRequest>,
    ) -> Result<Response<Streaming<DriverCallReply>>, Status> {
        if let Err(err) = self.client.ready().await {
            return Err(Status::new(Code::Unknown, format!("Service was not ready: {err}")));
        }
        let codec: ProstCodec<_, _> = ProstCodec::default();
        let path: http::uri::PathAndQuery = http::uri::PathAndQuery::from_static("/jumpstarter.Exporter/StreamingDriverCall");
        self.client.server_streaming(request.into_request(), path, codec).await
    }

    /// Opens the bidirectional byte-stream RPC (§4.4). The caller supplies
    /// the outgoing frame stream (first frame carrying `metadata`).
    pub async fn stream(
        &mut self,
        request: impl tonic::IntoStreamingRequest<Message = StreamFrame>,
    ) -> Result<Response<Streaming<StreamFrame>>, Status> {
        if let Err(err) = self.client.ready().await {
            return Err(Status::new(Code::Unknown, format!("Service was not ready: {err}")));
        }
        let codec: ProstCodec<_, _> = ProstCodec::default();
        let path: http::uri::PathAndQuery = http::uri::PathAndQuery::from_static("/jumpstarter.Exporter/Stream");
        self.client.streaming(request.into_streaming_request(), path, codec).await
    }

    pub async fn log_stream(&mut self, request: impl tonic::IntoRequest<LogStreamRequest>) -> Result<Response<Streaming<LogEntry>>, Status> {
        if let Err(err) = self.client.ready().await {
            return Err(Status::new(Code::Unknown, format!("Service was not ready: {err}")));
        }
        let codec: ProstCodec<_, _> = ProstCodec::default();
        let path: http::uri::PathAndQuery = http::uri::PathAndQuery::from_static("/jumpstarter.Exporter/LogStream");
        self.client.server_streaming(request.into_request(), path, codec).await
    }
}

/// The Exporter service trait (§4.5, §6). A session implements this
/// directly; the server wrapper below does the gRPC-path dispatch.
#[async_trait]
pub trait ExporterService: 'static + Send + Sync {
    type StreamingDriverCallStream: 'static + Send + Stream<Item = Result<DriverCallReply, Status>>;
    type StreamStream: 'static + Send + Stream<Item = Result<StreamFrame, Status>>;
    type LogStreamStream: 'static + Send + Stream<Item = Result<LogEntry, Status>>;

    async fn get_report(&self, request: Request<GetReportRequest>) -> Result<Response<DriverReport>, Status>;
    async fn driver_call(&self, request: Request<DriverCallRequest>) -> Result<Response<DriverCallReply>, Status>;
    async fn streaming_driver_call(&self, request: Request<DriverCallRequest>) -> Result<Response<Self::StreamingDriverCallStream>, Status>;
    async fn stream(&self, request: Request<Streaming<StreamFrame>>) -> Result<Response<Self::StreamStream>, Status>;
    async fn log_stream(&self, request: Request<LogStreamRequest>) -> Result<Response<Self::LogStreamStream>, Status>;
}

/// Hosts the server part of the Exporter protocol.
#[derive(Debug)]
pub struct ExporterServiceServer<T> {
    service: Arc<T>,
}

impl<T> ExporterServiceServer<T> {
    #[inline]
    pub fn new(service: T) -> Self { Self { service: Arc::new(service) } }
}

impl<T: Clone> Clone for ExporterServiceServer<T> {
    #[inline]
    fn clone(&self) -> Self { Self { service: self.service.clone() } }
}

impl<T: ExporterService> NamedService for ExporterServiceServer<T> {
    const NAME: &'static str = "jumpstarter.Exporter";
}

impl<T, B> Service<http::Request<B>> for ExporterServiceServer<T>
where
    T: ExporterService,
    B: 'static + Send + Body,
    B::Error: 'static + Send + Into<StdError>,
{
    type Error = std::convert::Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;
    type Response = http::Response<BoxBody>;

    #[inline]
    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> { Poll::Ready(Ok(())) }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        match req.uri().path() {
            "/jumpstarter.Exporter/GetReport" => {
                struct Svc<T>(Arc<T>);
                impl<T: ExporterService> UnaryService<GetReportRequest> for Svc<T> {
                    type Future = BoxFuture<Response<Self::Response>, Status>;
                    type Response = DriverReport;

                    fn call(&mut self, req: Request<GetReportRequest>) -> Self::Future {
                        let service = self.0.clone();
                        Box::pin(async move { (*service).get_report(req).await })
                    }
                }
                let service = self.service.clone();
                Box::pin(async move {
                    let method: Svc<T> = Svc(service);
                    let codec: ProstCodec<_, _> = ProstCodec::default();
                    let mut grpc: GrpcServer<ProstCodec<_, _>> = GrpcServer::new(codec);
                    Ok(grpc.unary(method, req).await)
                })
            },

            "/jumpstarter.Exporter/DriverCall" => {
                struct Svc<T>(Arc<T>);
                impl<T: ExporterService> UnaryService<DriverCallRequest> for Svc<T> {
                    type Future = BoxFuture<Response<Self::Response>, Status>;
                    type Response = DriverCallReply;

                    fn call(&mut self, req: Request<DriverCallRequest>) -> Self::Future {
                        let service = self.0.clone();
                        Box::pin(async move { (*service).driver_call(req).await })
                    }
                }
                let service = self.service.clone();
                Box::pin(async move {
                    let method: Svc<T> = Svc(service);
                    let codec: ProstCodec<_, _> = ProstCodec::default();
                    let mut grpc: GrpcServer<ProstCodec<_, _>> = GrpcServer::new(codec);
                    Ok(grpc.unary(method, req).await)
                })
            },

            "/jumpstarter.Exporter/StreamingDriverCall" => {
                struct Svc<T>(Arc<T>);
                impl<T: ExporterService> ServerStreamingService<DriverCallRequest> for Svc<T> {
                    type Future = BoxFuture<Response<Self::ResponseStream>, Status>;
                    type Response = DriverCallReply;
                    type ResponseStream = T::StreamingDriverCallStream;

                    fn call(&mut self, req: Request<DriverCallRequest>) -> Self::Future {
                        let service = self.0.clone();
                        Box::pin(async move { (*service).streaming_driver_call(req).await })
                    }
                }
                let service = self.service.clone();
                Box::pin(async move {
                    let method: Svc<T> = Svc(service);
                    let codec: ProstCodec<_, _> = ProstCodec::default();
                    let mut grpc: GrpcServer<ProstCodec<_, _>> = GrpcServer::new(codec);
                    Ok(grpc.server_streaming(method, req).await)
                })
            },

            "/jumpstarter.Exporter/Stream" => {
                struct Svc<T>(Arc<T>);
                impl<T: ExporterService> StreamingService<StreamFrame> for Svc<T> {
                    type Future = BoxFuture<Response<Self::ResponseStream>, Status>;
                    type Response = StreamFrame;
                    type ResponseStream = T::StreamStream;

                    fn call(&mut self, req: Request<Streaming<StreamFrame>>) -> Self::Future {
                        let service = self.0.clone();
                        Box::pin(async move { (*service).stream(req).await })
                    }
                }
                let service = self.service.clone();
                Box::pin(async move {
                    let method: Svc<T> = Svc(service);
                    let codec: ProstCodec<_, _> = ProstCodec::default();
                    let mut grpc: GrpcServer<ProstCodec<_, _>> = GrpcServer::new(codec);
                    Ok(grpc.streaming(method, req).await)
                })
            },

            "/jumpstarter.Exporter/LogStream" => {
                struct Svc<T>(Arc<T>);
                impl<T: ExporterService> ServerStreamingService<LogStreamRequest> for Svc<T> {
                    type Future = BoxFuture<Response<Self::ResponseStream>, Status>;
                    type Response = LogEntry;
                    type ResponseStream = T::LogStreamStream;

                    fn call(&mut self, req: Request<LogStreamRequest>) -> Self::Future {
                        let service = self.0.clone();
                        Box::pin(async move { (*service).log_stream(req).await })
                    }
                }
                let service = self.service.clone();
                Box::pin(async move {
                    let method: Svc<T> = Svc(service);
                    let codec: ProstCodec<_, _> = ProstCodec::default();
                    let mut grpc: GrpcServer<ProstCodec<_, _>> = GrpcServer::new(codec);
                    Ok(grpc.server_streaming(method, req).await)
                })
            },

            _ => Box::pin(async move {
                Ok(http::Response::builder()
                    .status(200)
                    .header("grpc-status", "12")
                    .header("content-type", "application/grpc")
                    .body(empty_body())
                    .unwrap())
            }),
        }
    }
}
