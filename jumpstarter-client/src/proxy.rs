//  PROXY.rs
//
//  Description:
//!   The client-side driver proxy tree (§4.7): one proxy object per
//!   `DriverReport` entry, gated by an allow-list so that a client never
//!   imports or executes code for a client-class it hasn't opted into.
//!   New; no donor analogue (the donor's CLI talks to BraneScript's
//!   fixed package/function surface, not an open-ended driver-class
//!   registry), written in the crate's own idiom.

use std::collections::HashMap;

use glob::Pattern;
use indexmap::IndexMap;
use jumpstarter_proto::driver::{DriverCallReply, DriverReport, DriverReportEntry, StreamFrame, StreamRequest};
use jumpstarter_proto::errors::ErrorKind;
use jumpstarter_proto::exporter::ExporterServiceClient;
use jumpstarter_proto::value::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::transport::Channel;
use tonic::Request;
use uuid::Uuid;

/// Governs which client-class identifiers a client is willing to build a
/// proxy for (§4.7). `unsafe` bypasses the allow-list entirely.
#[derive(Clone, Debug, Default)]
pub struct AllowList {
    patterns: Vec<Pattern>,
    r#unsafe: bool,
}
impl AllowList {
    pub fn new(patterns: impl IntoIterator<Item = String>, r#unsafe: bool) -> Result<Self, ErrorKind> {
        let patterns = patterns
            .into_iter()
            .map(|raw| Pattern::new(&raw).map_err(|err| ErrorKind::InvalidArgument(format!("malformed allow-list pattern '{raw}': {err}"))))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns, r#unsafe })
    }

    pub fn allows(&self, client_class: &str) -> bool { self.r#unsafe || self.patterns.iter().any(|pattern| pattern.matches(client_class)) }
}

/// One node of the client-side proxy tree (§4.7).
pub struct DriverProxy {
    uuid: Uuid,
    client_class: String,
    channel: Channel,
    children: IndexMap<String, DriverProxy>,
}
impl DriverProxy {
    pub fn uuid(&self) -> Uuid { self.uuid }

    pub fn client_class(&self) -> &str { &self.client_class }

    pub fn children(&self) -> &IndexMap<String, DriverProxy> { &self.children }

    pub fn child(&self, name: &str) -> Option<&DriverProxy> { self.children.get(name) }

    fn client(&self) -> ExporterServiceClient { ExporterServiceClient::from_channel(self.channel.clone()) }

    /// `DriverCall` against this node (§4.3, §4.7).
    pub async fn call(&self, method: &str, args: Value) -> Result<Value, ErrorKind> {
        let reply: DriverCallReply = self
            .client()
            .driver_call(jumpstarter_proto::driver::DriverCallRequest { uuid: self.uuid.to_string(), method: method.to_string(), args })
            .await
            .map_err(status_to_kind)?
            .into_inner();
        Ok(reply.value)
    }

    /// `StreamingDriverCall` against this node.
    pub async fn call_streaming(&self, method: &str, args: Value) -> Result<tonic::Streaming<DriverCallReply>, ErrorKind> {
        let response = self
            .client()
            .streaming_driver_call(jumpstarter_proto::driver::DriverCallRequest { uuid: self.uuid.to_string(), method: method.to_string(), args })
            .await
            .map_err(status_to_kind)?;
        Ok(response.into_inner())
    }

    /// Opens a `Stream` call against this node's `method` (§4.4, §4.6):
    /// sends the leading `driver{uuid, method}` metadata frame, then
    /// hands back the sender/receiver pair a caller pumps bytes through.
    pub async fn open_stream(&self, method: &str) -> Result<(mpsc::Sender<Vec<u8>>, tonic::Streaming<StreamFrame>), ErrorKind> {
        let (tx, rx) = mpsc::channel::<StreamFrame>(16);
        let metadata = StreamRequest {
            kind: Some(jumpstarter_proto::driver::StreamRequestKind::Driver(jumpstarter_proto::driver::DriverStreamTarget {
                uuid: self.uuid.to_string(),
                method: method.to_string(),
            })),
        };
        tx.send(StreamFrame { metadata: Some(metadata), payload: None }).await.map_err(|_| ErrorKind::Internal("failed to queue Stream leading frame".into()))?;

        let response = self.client().stream(Request::new(ReceiverStream::new(rx))).await.map_err(status_to_kind)?;

        let (payload_tx, mut payload_rx) = mpsc::channel::<Vec<u8>>(16);
        tokio::spawn(async move {
            while let Some(chunk) = payload_rx.recv().await {
                if tx.send(StreamFrame { metadata: None, payload: Some(chunk) }).await.is_err() {
                    break;
                }
            }
        });

        Ok((payload_tx, response.into_inner()))
    }
}

fn status_to_kind(status: tonic::Status) -> ErrorKind {
    use tonic::Code;
    let msg = status.message().to_string();
    match status.code() {
        Code::InvalidArgument => ErrorKind::InvalidArgument(msg),
        Code::NotFound => ErrorKind::NotFound(msg),
        Code::PermissionDenied | Code::Unauthenticated => ErrorKind::PermissionDenied(msg),
        Code::Unavailable => ErrorKind::Unavailable(msg),
        Code::DeadlineExceeded => ErrorKind::DeadlineExceeded(msg),
        Code::Cancelled => ErrorKind::Cancelled(msg),
        _ => ErrorKind::Internal(msg),
    }
}

/// Builds the proxy tree from a flat `DriverReport` (§4.2, §4.7),
/// rejecting any entry whose `client_class` the allow-list refuses
/// before constructing anything beneath it. A child's map key is its
/// `name` label when present, falling back to its uuid — the wire report
/// carries no dedicated "child name" field, only free-form labels.
pub fn build_tree(report: &DriverReport, channel: Channel, allow: &AllowList) -> Result<DriverProxy, ErrorKind> {
    let mut children_of: HashMap<Option<String>, Vec<&DriverReportEntry>> = HashMap::new();
    for entry in &report.entries {
        children_of.entry(entry.parent_uuid.clone()).or_default().push(entry);
    }
    let root = report.entries.first().ok_or_else(|| ErrorKind::Internal("driver report carried no entries".into()))?;
    build_node(root, &children_of, &channel, allow)
}

fn build_node(
    entry: &DriverReportEntry,
    children_of: &HashMap<Option<String>, Vec<&DriverReportEntry>>,
    channel: &Channel,
    allow: &AllowList,
) -> Result<DriverProxy, ErrorKind> {
    if !allow.allows(&entry.client_class) {
        return Err(ErrorKind::PermissionDenied(format!("client-class '{}' is not in the allow-list", entry.client_class)));
    }
    let uuid = entry.uuid.parse::<Uuid>().map_err(|_| ErrorKind::Internal(format!("driver report carried a malformed uuid '{}'", entry.uuid)))?;

    let mut children = IndexMap::new();
    if let Some(kids) = children_of.get(&Some(entry.uuid.clone())) {
        for child_entry in kids {
            let name = child_entry.labels.get("name").cloned().unwrap_or_else(|| child_entry.uuid.clone());
            children.insert(name, build_node(child_entry, children_of, channel, allow)?);
        }
    }

    Ok(DriverProxy { uuid, client_class: entry.client_class.clone(), channel: channel.clone(), children })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(uuid: &str, parent: Option<&str>, class: &str, name: &str) -> DriverReportEntry {
        DriverReportEntry { uuid: uuid.to_string(), parent_uuid: parent.map(str::to_string), labels: [("name".to_string(), name.to_string())].into_iter().collect(), client_class: class.to_string() }
    }

    fn dummy_channel() -> Channel { Channel::from_static("http://127.0.0.1:1").connect_lazy() }

    #[test]
    fn allow_list_glob_matches() {
        let allow = AllowList::new(["jumpstarter.power.*".to_string()], false).unwrap();
        assert!(allow.allows("jumpstarter.power.Mock"));
        assert!(!allow.allows("jumpstarter.network.Echo"));
    }

    #[test]
    fn unsafe_bypasses_every_pattern() {
        let allow = AllowList::new(Vec::<String>::new(), true).unwrap();
        assert!(allow.allows("anything.at.all"));
    }

    #[test]
    fn disallowed_class_is_rejected_before_building_children() {
        let report = DriverReport {
            entries: vec![
                entry("11111111-1111-1111-1111-111111111111", None, "jumpstarter.composite", "root"),
                entry("22222222-2222-2222-2222-222222222222", Some("11111111-1111-1111-1111-111111111111"), "jumpstarter.network.Echo", "net0"),
            ],
        };
        let allow = AllowList::new(["jumpstarter.composite".to_string()], false).unwrap();
        let err = build_tree(&report, dummy_channel(), &allow).unwrap_err();
        assert!(matches!(err, ErrorKind::PermissionDenied(_)));
    }

    #[test]
    fn allowed_tree_nests_children_by_name() {
        let report = DriverReport {
            entries: vec![
                entry("11111111-1111-1111-1111-111111111111", None, "jumpstarter.composite", "root"),
                entry("22222222-2222-2222-2222-222222222222", Some("11111111-1111-1111-1111-111111111111"), "jumpstarter.power.Mock", "power0"),
            ],
        };
        let allow = AllowList::new(Vec::<String>::new(), true).unwrap();
        let tree = build_tree(&report, dummy_channel(), &allow).unwrap();
        assert_eq!(tree.client_class(), "jumpstarter.composite");
        assert_eq!(tree.child("power0").unwrap().client_class(), "jumpstarter.power.Mock");
    }
}
