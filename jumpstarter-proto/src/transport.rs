//  TRANSPORT.rs
//
//  Description:
//!   A lenient address type covering the two listener/dial choices the
//!   fabric supports (§4.5, §2 "Transport"): a Unix-domain socket path,
//!   or a TCP hostport.

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};
use std::str::FromStr;

use enum_debug::EnumDebug;
use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use tonic::transport::{Channel, Uri};

use crate::errors::ServiceError;

/// Errors that relate to parsing [`Endpoint`]s.
#[derive(Debug)]
pub enum EndpointError {
    IllegalPortNumber { raw: String, err: std::num::ParseIntError },
    MissingPort { raw: String },
}
impl Display for EndpointError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use EndpointError::*;
        match self {
            IllegalPortNumber { raw, .. } => write!(f, "Illegal port number '{raw}'"),
            MissingPort { raw } => write!(f, "Missing port in TCP endpoint '{raw}' (did you mean a unix:// path?)"),
        }
    }
}
impl Error for EndpointError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EndpointError::IllegalPortNumber { err, .. } => Some(err),
            EndpointError::MissingPort { .. } => None,
        }
    }
}

/// A session listener/dial address: either a Unix-domain socket path
/// (preferred when client and exporter share a host) or an authenticated
/// TCP hostport (used for remote clients, §4.5).
#[derive(Clone, Debug, EnumDebug, PartialEq, Eq)]
pub enum Endpoint {
    Unix(String),
    Tcp(String, u16),
}
impl Endpoint {
    #[inline]
    pub fn unix(path: impl Into<String>) -> Self { Self::Unix(path.into()) }

    #[inline]
    pub fn tcp(host: impl Into<String>, port: u16) -> Self { Self::Tcp(host.into(), port) }

    #[inline]
    pub fn is_unix(&self) -> bool { matches!(self, Self::Unix(_)) }

    /// Renders a `http://`/`unix://` URI suitable for `tonic::transport::Endpoint::new`.
    pub fn to_uri_string(&self) -> String {
        match self {
            Endpoint::Unix(path) => format!("unix://{path}"),
            Endpoint::Tcp(host, port) => format!("http://{host}:{port}"),
        }
    }

    /// Dials this endpoint and returns the resulting channel. TCP goes
    /// through the regular `tonic::transport::Endpoint`; Unix dials a
    /// `UnixStream` through a custom connector, since tonic's own
    /// `Endpoint` can't resolve a `unix://` URI on its own.
    pub async fn connect(&self) -> Result<Channel, ServiceError> {
        match self {
            Endpoint::Tcp(..) => {
                let uri = self.to_uri_string();
                let endpoint = tonic::transport::Endpoint::new(uri.clone()).map_err(|err| ServiceError::EndpointError { address: uri.clone(), err })?;
                endpoint.connect().await.map_err(|err| ServiceError::ConnectError { address: uri, err })
            },
            Endpoint::Unix(path) => {
                let path = path.clone();
                let uri = self.to_uri_string();
                // Placeholder authority; the connector below ignores it and always dials `path`.
                tonic::transport::Endpoint::from_static("http://[::]:0")
                    .connect_with_connector(tower::service_fn(move |_: Uri| {
                        let path = path.clone();
                        async move { tokio::net::UnixStream::connect(path).await }
                    }))
                    .await
                    .map_err(|err| ServiceError::ConnectError { address: uri, err })
            },
        }
    }
}
impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        match self {
            Endpoint::Unix(path) => write!(f, "unix://{path}"),
            Endpoint::Tcp(host, port) => write!(f, "{host}:{port}"),
        }
    }
}
impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(path) = s.strip_prefix("unix://") {
            return Ok(Self::Unix(path.to_string()));
        }
        match s.rfind(':') {
            Some(pos) => {
                let (host, port) = (&s[..pos], &s[pos + 1..]);
                let port: u16 = port.parse().map_err(|err| EndpointError::IllegalPortNumber { raw: port.into(), err })?;
                Ok(Self::Tcp(host.to_string(), port))
            },
            None => Err(EndpointError::MissingPort { raw: s.into() }),
        }
    }
}
impl Serialize for Endpoint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
impl<'de> Deserialize<'de> for Endpoint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EndpointVisitor;
        impl<'de> Visitor<'de> for EndpointVisitor {
            type Value = Endpoint;

            fn expecting(&self, f: &mut Formatter<'_>) -> FResult { write!(f, "a unix:// path or a host:port pair") }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Endpoint::from_str(v).map_err(E::custom)
            }
        }
        deserializer.deserialize_str(EndpointVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unix_and_tcp() {
        assert_eq!(Endpoint::from_str("unix:///tmp/jmp.sock").unwrap(), Endpoint::Unix("/tmp/jmp.sock".into()));
        assert_eq!(Endpoint::from_str("127.0.0.1:8080").unwrap(), Endpoint::Tcp("127.0.0.1".into(), 8080));
    }

    #[test]
    fn rejects_missing_port() {
        assert!(Endpoint::from_str("example.com").is_err());
    }
}
