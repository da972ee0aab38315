//  DRIVER.rs
//
//  Description:
//!   Wire types for the driver tree report (§3, §4.2), resource handles
//!   (§4.6) and the `Stream` open-request metadata (§4.4, §6).

use prost::{Message, Oneof};

use crate::value::Value;

/// The flat, on-wire description of a driver tree (§3 "Driver report").
#[derive(Clone, PartialEq, Message)]
pub struct DriverReport {
    #[prost(tag = "1", repeated, message)]
    pub entries: Vec<DriverReportEntry>,
}

#[derive(Clone, PartialEq, Message)]
pub struct DriverReportEntry {
    /// 128-bit UUID, encoded as its canonical string form.
    #[prost(tag = "1", required, string)]
    pub uuid: String,
    #[prost(tag = "2", optional, string)]
    pub parent_uuid: Option<String>,
    #[prost(tag = "3", map = "string, string")]
    pub labels: std::collections::HashMap<String, String>,
    #[prost(tag = "4", required, string)]
    pub client_class: String,
}

/// Exported-method kind tag (§3, §4.2, §4.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub enum MethodKind {
    Unary = 0,
    Streaming = 1,
    ExportStream = 2,
}

/// A resource handle argument (§3 "Resource handle", §4.6).
#[derive(Clone, PartialEq, Message)]
pub struct ResourceHandle {
    #[prost(tag = "1", oneof = "ResourceHandleKind")]
    pub kind: Option<ResourceHandleKind>,
    #[prost(tag = "10", optional, string)]
    pub x_jmp_content_encoding: Option<String>,
    #[prost(tag = "11", optional, string)]
    pub x_jmp_accept_encoding: Option<String>,
}

#[derive(Clone, PartialEq, Oneof)]
pub enum ResourceHandleKind {
    #[prost(tag = "1", message)]
    ClientStream(ClientStreamHandle),
    #[prost(tag = "2", message)]
    PresignedRequest(PresignedRequestHandle),
}

#[derive(Clone, PartialEq, Message)]
pub struct ClientStreamHandle {
    #[prost(tag = "1", required, string)]
    pub uuid: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub enum HttpMethod {
    Get = 0,
    Put = 1,
}

#[derive(Clone, PartialEq, Message)]
pub struct PresignedRequestHandle {
    #[prost(tag = "1", required, enumeration = "HttpMethod")]
    pub method: i32,
    #[prost(tag = "2", required, string)]
    pub url: String,
    #[prost(tag = "3", map = "string, string")]
    pub headers: std::collections::HashMap<String, String>,
}

/// Leading metadata of a `Stream` bidi call (§4.4, §6 `StreamRequest`).
#[derive(Clone, PartialEq, Message)]
pub struct StreamRequest {
    #[prost(tag = "1", oneof = "StreamRequestKind")]
    pub kind: Option<StreamRequestKind>,
}

#[derive(Clone, PartialEq, Oneof)]
pub enum StreamRequestKind {
    #[prost(tag = "1", message)]
    Driver(DriverStreamTarget),
    #[prost(tag = "2", message)]
    Resource(ResourceStreamTarget),
}

#[derive(Clone, PartialEq, Message)]
pub struct DriverStreamTarget {
    #[prost(tag = "1", required, string)]
    pub uuid: String,
    #[prost(tag = "2", required, string)]
    pub method: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct ResourceStreamTarget {
    #[prost(tag = "1", required, string)]
    pub uuid: String,
}

/// One frame of the `Stream` bidi RPC: the first frame of either side
/// carries `metadata`, every subsequent frame carries `payload` (§6).
#[derive(Clone, PartialEq, Message)]
pub struct StreamFrame {
    #[prost(tag = "1", optional, message)]
    pub metadata: Option<StreamRequest>,
    #[prost(tag = "2", optional, bytes)]
    pub payload: Option<Vec<u8>>,
}

/// One entry of the `DriverCall`/`StreamingDriverCall` request (§4.3).
#[derive(Clone, PartialEq, Message)]
pub struct DriverCallRequest {
    #[prost(tag = "1", required, string)]
    pub uuid: String,
    #[prost(tag = "2", required, string)]
    pub method: String,
    #[prost(tag = "3", required, message)]
    pub args: Value,
}

#[derive(Clone, PartialEq, Message)]
pub struct DriverCallReply {
    #[prost(tag = "1", required, message)]
    pub value: Value,
}

#[derive(Clone, PartialEq, Message)]
pub struct GetReportRequest {}

/// One entry of the `LogStream` RPC (§4.5 method 5).
#[derive(Clone, PartialEq, Message)]
pub struct LogEntry {
    /// Milliseconds since the Unix epoch.
    #[prost(tag = "1", required, uint64)]
    pub ts: u64,
    #[prost(tag = "2", required, enumeration = "LogLevel")]
    pub level: i32,
    #[prost(tag = "3", required, string)]
    pub logger: String,
    #[prost(tag = "4", optional, string)]
    pub source: Option<String>,
    #[prost(tag = "5", required, string)]
    pub message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

#[derive(Clone, PartialEq, Message)]
pub struct LogStreamRequest {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_entries_roundtrip_through_prost_bytes() {
        let report = DriverReport {
            entries: vec![DriverReportEntry {
                uuid: "11111111-1111-1111-1111-111111111111".into(),
                parent_uuid: None,
                labels: [("name".to_string(), "root".to_string())].into_iter().collect(),
                client_class: "jumpstarter.composite".into(),
            }],
        };
        let bytes = Message::encode_to_vec(&report);
        let decoded = DriverReport::decode(bytes.as_slice()).unwrap();
        assert_eq!(report, decoded);
    }
}
