//  CONTROLLER.rs
//
//  Description:
//!   Thin client stub for the controller service (§6): lease lifecycle
//!   and router-endpoint provisioning. The controller itself is an
//!   external collaborator (§1) and is never implemented here.

use prost::Message;
use tonic::client::Grpc as GrpcClient;
use tonic::codec::{ProstCodec, Streaming};
use tonic::transport::{Channel, Endpoint as TonicEndpoint};
use tonic::{codegen::http, Code, Request, Response, Status};

pub use crate::errors::ServiceError as Error;

#[derive(Clone, PartialEq, Message)]
pub struct RequestLeaseRequest {
    #[prost(tag = "1", required, string)]
    pub client_ref: String,
    #[prost(tag = "2", required, string)]
    pub selector: String,
    #[prost(tag = "3", required, uint64)]
    pub duration_secs: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct RequestLeaseReply {
    #[prost(tag = "1", required, string)]
    pub name: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct ReleaseLeaseRequest {
    #[prost(tag = "1", required, string)]
    pub name: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct ReleaseLeaseReply {}

#[derive(Clone, PartialEq, Message)]
pub struct WatchLeaseRequest {
    #[prost(tag = "1", required, string)]
    pub name: String,
}

/// One condition transition on a lease (§3 "Lease": `conditions[]`).
#[derive(Clone, PartialEq, Message)]
pub struct LeaseCondition {
    #[prost(tag = "1", required, bool)]
    pub ready: bool,
    #[prost(tag = "2", optional, string)]
    pub router_endpoint: Option<String>,
    #[prost(tag = "3", optional, string)]
    pub router_token: Option<String>,
    #[prost(tag = "4", optional, string)]
    pub message: Option<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ListExportersRequest {
    #[prost(tag = "1", required, string)]
    pub selector: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct ListExportersReply {
    #[prost(tag = "1", repeated, string)]
    pub names: Vec<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ListLeasesRequest {
    #[prost(tag = "1", required, string)]
    pub client_ref: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct ListLeasesReply {
    #[prost(tag = "1", repeated, string)]
    pub names: Vec<String>,
}

/// Client-side stub for the controller service consumed by the lease
/// client (§4.9). Follows the same connect/unary dispatch idiom as the
/// hand-rolled `ExporterServiceClient`, reduced to the five operations
/// §6 lists.
#[derive(Debug, Clone)]
pub struct ControllerServiceClient {
    client: GrpcClient<Channel>,
}

impl ControllerServiceClient {
    pub async fn connect(address: impl Into<String>) -> Result<Self, Error> {
        let address: String = address.into();
        let conn: Channel = match TonicEndpoint::new(address.clone()) {
            Ok(endpoint) => match endpoint.connect().await {
                Ok(conn) => conn,
                Err(err) => return Err(Error::ConnectError { address, err }),
            },
            Err(err) => return Err(Error::EndpointError { address, err }),
        };
        Ok(Self { client: GrpcClient::new(conn) })
    }

    /// Dials a [`crate::transport::Endpoint`] directly, supporting a
    /// `unix://` controller address alongside the usual TCP one (§2).
    pub async fn connect_endpoint(endpoint: &crate::transport::Endpoint) -> Result<Self, Error> {
        Ok(Self { client: GrpcClient::new(endpoint.connect().await?) })
    }

    pub fn from_channel(channel: Channel) -> Self { Self { client: GrpcClient::new(channel) } }

    async fn ready(&mut self) -> Result<(), Status> {
        self.client.ready().await.map_err(|err| Status::new(Code::Unknown, format!("Service was not ready: {err}")))
    }

    pub async fn request_lease(&mut self, request: impl tonic::IntoRequest<RequestLeaseRequest>) -> Result<Response<RequestLeaseReply>, Status> {
        self.ready().await?;
        let codec: ProstCodec<_, _> = ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static("/jumpstarter.Controller/RequestLease");
        self.client.unary(request.into_request(), path, codec).await
    }

    pub async fn release_lease(&mut self, request: impl tonic::IntoRequest<ReleaseLeaseRequest>) -> Result<Response<ReleaseLeaseReply>, Status> {
        self.ready().await?;
        let codec: ProstCodec<_, _> = ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static("/jumpstarter.Controller/ReleaseLease");
        self.client.unary(request.into_request(), path, codec).await
    }

    pub async fn watch_lease(&mut self, request: impl tonic::IntoRequest<WatchLeaseRequest>) -> Result<Response<Streaming<LeaseCondition>>, Status> {
        self.ready().await?;
        let codec: ProstCodec<_, _> = ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static("/jumpstarter.Controller/WatchLease");
        self.client.server_streaming(request.into_request(), path, codec).await
    }

    pub async fn list_exporters(&mut self, request: impl tonic::IntoRequest<ListExportersRequest>) -> Result<Response<ListExportersReply>, Status> {
        self.ready().await?;
        let codec: ProstCodec<_, _> = ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static("/jumpstarter.Controller/ListExporters");
        self.client.unary(request.into_request(), path, codec).await
    }

    pub async fn list_leases(&mut self, request: impl tonic::IntoRequest<ListLeasesRequest>) -> Result<Response<ListLeasesReply>, Status> {
        self.ready().await?;
        let codec: ProstCodec<_, _> = ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static("/jumpstarter.Controller/ListLeases");
        self.client.unary(request.into_request(), path, codec).await
    }
}
