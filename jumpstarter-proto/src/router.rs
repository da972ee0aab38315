//  ROUTER.rs
//
//  Description:
//!   Thin client stub for the router service (§4.8, §6): exporter-side
//!   `Listen`, client-side `Dial`. The router's own implementation is
//!   out of scope (§4.8): the fabric only needs full-duplex byte streams
//!   matching §4.4's ordering/backpressure.

use prost::Message;
use tonic::client::Grpc as GrpcClient;
use tonic::codec::{ProstCodec, Streaming};
use tonic::transport::{Channel, Endpoint};
use tonic::{codegen::http, Code, Request, Response, Status};

pub use crate::errors::ServiceError as Error;
use crate::driver::{DriverReport, StreamFrame};

/// What an exporter hands the router on `Register` (§4.8, SPEC_FULL.md
/// §4): its identity, its selector labels, and the driver tree report
/// the router can hand back out to clients listing exporters without
/// them needing a separate round trip to the exporter itself.
#[derive(Clone, PartialEq, Message)]
pub struct RegisterRequest {
    #[prost(tag = "1", required, string)]
    pub uuid: String,
    #[prost(tag = "2", map = "string, string")]
    pub labels: std::collections::HashMap<String, String>,
    #[prost(tag = "3", message, required)]
    pub device_report: DriverReport,
}

#[derive(Clone, PartialEq, Message)]
pub struct RegisterReply {}

#[derive(Clone, PartialEq, Message)]
pub struct ListenRequest {}

/// One assignment delivered over the exporter's long-lived `Listen()`
/// stream: a fresh per-stream token and the endpoint to dial to service
/// it (§4.8).
#[derive(Clone, PartialEq, Message)]
pub struct ListenResponse {
    #[prost(tag = "1", required, string)]
    pub router_endpoint: String,
    #[prost(tag = "2", required, string)]
    pub router_token: String,
}

/// Client-side stub for the router.
#[derive(Debug, Clone)]
pub struct RouterServiceClient {
    client: GrpcClient<Channel>,
}

impl RouterServiceClient {
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

    /// Wraps a channel dialled with per-stream composite credentials
    /// (channel creds + bearer access token), grounded in
    /// `jumpstarter/exporter/listener.py`'s `handle()`.
    pub fn from_channel(channel: Channel) -> Self { Self { client: GrpcClient::new(channel) } }

    /// Dials a [`crate::transport::Endpoint`] directly, supporting a
    /// `unix://` router-control address alongside the usual TCP one (§2).
    pub async fn connect_endpoint(endpoint: &crate::transport::Endpoint) -> Result<Self, Error> {
        Ok(Self { client: GrpcClient::new(endpoint.connect().await?) })
    }

    async fn ready(&mut self) -> Result<(), Status> {
        self.client.ready().await.map_err(|err| Status::new(Code::Unknown, format!("Service was not ready: {err}")))
    }

    pub async fn register(&mut self, request: impl tonic::IntoRequest<RegisterRequest>) -> Result<Response<RegisterReply>, Status> {
        self.ready().await?;
        let codec: ProstCodec<_, _> = ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static("/jumpstarter.Router/Register");
        self.client.unary(request.into_request(), path, codec).await
    }

    pub async fn listen(&mut self, request: impl tonic::IntoRequest<ListenRequest>) -> Result<Response<Streaming<ListenResponse>>, Status> {
        self.ready().await?;
        let codec: ProstCodec<_, _> = ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static("/jumpstarter.Router/Listen");
        self.client.server_streaming(request.into_request(), path, codec).await
    }

    /// Services one assigned stream: forwards `StreamFrame`s in both
    /// directions between the router and the local session transport.
    pub async fn stream(
        &mut self,
        request: impl tonic::IntoStreamingRequest<Message = StreamFrame>,
    ) -> Result<Response<Streaming<StreamFrame>>, Status> {
        self.ready().await?;
        let codec: ProstCodec<_, _> = ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static("/jumpstarter.Router/Stream");
        self.client.streaming(request.into_streaming_request(), path, codec).await
    }

    /// Client-side dial: exchanges a lease name for a full-duplex byte
    /// tunnel (§4.8 "Client side: dials the router-as-service"). The
    /// lease name travels as call metadata (`x-jmp-lease`) rather than as
    /// a leading message, since the streamed payload itself only ever
    /// carries `StreamFrame`s, symmetric with `stream()`.
    pub async fn dial(
        &mut self,
        lease_name: &str,
        request: impl tonic::IntoStreamingRequest<Message = StreamFrame>,
    ) -> Result<Response<Streaming<StreamFrame>>, Status> {
        self.ready().await?;
        let lease_name = lease_name
            .parse()
            .map_err(|_| Status::invalid_argument(format!("malformed lease name '{lease_name}'")))?;
        let mut request = request.into_streaming_request();
        request.metadata_mut().insert("x-jmp-lease", lease_name);
        let codec: ProstCodec<_, _> = ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static("/jumpstarter.Router/Dial");
        self.client.streaming(request, path, codec).await
    }
}
