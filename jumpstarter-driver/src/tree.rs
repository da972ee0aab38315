//  TREE.rs
//
//  Description:
//!   The driver tree: an ordered, labelled tree of driver instances with
//!   stable UUIDs (§3 "Driver node"/"Driver report", §4.2 enumeration).
//!   Grounded on the general "ordered children, stable identity,
//!   post-order serialisation" shape the donor uses for its recursive
//!   node-config types, reworked here into a runtime tree instead of a
//!   config enum.
//

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use jumpstarter_proto::driver::{DriverReport, DriverReportEntry};
use jumpstarter_proto::errors::ErrorKind;
use uuid::Uuid;

use crate::driver::Driver;

/// One node of the driver tree (§3).
pub enum TreeNode {
    /// A node backed by a concrete [`Driver`] implementation, with
    /// optionally-nested children (a composite driver is simply a
    /// `TreeNode::Leaf` whose `driver` exports no methods of its own).
    Leaf { uuid: Uuid, labels: HashMap<String, String>, driver: Arc<dyn Driver>, children: IndexMap<String, TreeNode> },
    /// A node that forwards every operation to another node in the same
    /// tree, referenced by path rather than by direct pointer (§9
    /// "cyclic references... broken by having Proxies store a path...
    /// and resolving against the root at each call").
    Proxy { uuid: Uuid, labels: HashMap<String, String>, client_class: String, target_path: Vec<String> },
}
impl TreeNode {
    pub fn uuid(&self) -> Uuid {
        match self {
            TreeNode::Leaf { uuid, .. } | TreeNode::Proxy { uuid, .. } => *uuid,
        }
    }

    pub fn labels(&self) -> &HashMap<String, String> {
        match self {
            TreeNode::Leaf { labels, .. } | TreeNode::Proxy { labels, .. } => labels,
        }
    }

    pub fn client_class(&self) -> &str {
        match self {
            TreeNode::Leaf { driver, .. } => driver.client_class(),
            TreeNode::Proxy { client_class, .. } => client_class,
        }
    }

    pub fn children(&self) -> Option<&IndexMap<String, TreeNode>> {
        match self {
            TreeNode::Leaf { children, .. } => Some(children),
            TreeNode::Proxy { .. } => None,
        }
    }
}

/// A constructed, immutable driver tree (§3: "Nodes are created at
/// session construction, never mutated after `enumerate()` returns").
pub struct DriverTree {
    root: TreeNode,
}
impl DriverTree {
    pub fn new(root: TreeNode) -> Self { Self { root } }

    pub fn root(&self) -> &TreeNode { &self.root }

    /// Resolves `uuid` to the driver that should actually service a call
    /// against it, following proxy chains by path from the root (§9).
    /// Proxy transparency (§8 property 3) falls out of this: a call
    /// against `uuid(P)` and a call against `uuid(T)` resolve to the
    /// identical `Arc<dyn Driver>`.
    pub fn resolve(&self, uuid: Uuid) -> Result<Arc<dyn Driver>, ErrorKind> {
        let node = self.find(uuid).ok_or_else(|| ErrorKind::NotFound(format!("no driver node with uuid '{uuid}'")))?;
        self.resolve_node(node, 0)
    }

    fn resolve_node(&self, node: &TreeNode, depth: usize) -> Result<Arc<dyn Driver>, ErrorKind> {
        if depth > 32 {
            return Err(ErrorKind::Internal("proxy resolution exceeded maximum depth (cyclic proxy chain?)".into()));
        }
        match node {
            TreeNode::Leaf { driver, .. } => Ok(driver.clone()),
            TreeNode::Proxy { target_path, .. } => {
                let target = self.find_by_path(target_path).ok_or_else(|| {
                    ErrorKind::Internal(format!("proxy target path '{}' no longer resolves", target_path.join("/")))
                })?;
                self.resolve_node(target, depth + 1)
            },
        }
    }

    fn find(&self, uuid: Uuid) -> Option<&TreeNode> { find_by_uuid(&self.root, uuid) }

    fn find_by_path(&self, path: &[String]) -> Option<&TreeNode> {
        let mut node = &self.root;
        for name in path {
            node = node.children()?.get(name)?;
        }
        Some(node)
    }

    /// Produces the on-wire driver report by post-order traversal of the
    /// root (§4.2). Idempotent and side-effect-free: calling it twice on
    /// the same tree yields equal reports (§8 property 1).
    pub fn enumerate(&self) -> DriverReport {
        let mut entries = Vec::new();
        enumerate_node(&self.root, None, &mut entries);
        DriverReport { entries }
    }
}

fn find_by_uuid(node: &TreeNode, uuid: Uuid) -> Option<&TreeNode> {
    if node.uuid() == uuid {
        return Some(node);
    }
    if let Some(children) = node.children() {
        for child in children.values() {
            if let Some(found) = find_by_uuid(child, uuid) {
                return Some(found);
            }
        }
    }
    None
}

/// Emits `node`'s own report entry (at its real position, under
/// `parent_uuid`) and then recurses into its children in spec order.
/// A [`TreeNode::Proxy`] still gets its own entry here — §4.2's "not
/// emitted as a distinct entry" refers to the *target* not being
/// duplicated at the proxy's position, not to the proxy itself being
/// invisible: the proxy needs an addressable, wire-stable `uuid` for
/// `DriverCall(uuid(P), ...)` (§8 property 3) to mean anything.
fn enumerate_node(node: &TreeNode, parent_uuid: Option<Uuid>, out: &mut Vec<DriverReportEntry>) {
    out.push(DriverReportEntry {
        uuid: node.uuid().to_string(),
        parent_uuid: parent_uuid.map(|u| u.to_string()),
        labels: node.labels().clone(),
        client_class: node.client_class().to_string(),
    });
    if let Some(children) = node.children() {
        for child in children.values() {
            enumerate_node(child, Some(node.uuid()), out);
        }
    }
}

#[cfg(test)]
mod tests {
    use jumpstarter_proto::value::Value;

    use super::*;
    use crate::driver::{MethodDescriptor, ResourceSource};
    use async_trait::async_trait;

    struct StubDriver {
        class: &'static str,
    }
    #[async_trait]
    impl Driver for StubDriver {
        fn client_class(&self) -> &str { self.class }

        fn methods(&self) -> &[MethodDescriptor] { &[] }

        async fn call(&self, _method: &str, _args: Value, _resources: &dyn ResourceSource) -> Result<Value, ErrorKind> { Ok(Value::null()) }
    }

    fn leaf(name: &str, class: &'static str, children: IndexMap<String, TreeNode>) -> TreeNode {
        TreeNode::Leaf {
            uuid: Uuid::new_v4(),
            labels: [("name".to_string(), name.to_string())].into_iter().collect(),
            driver: Arc::new(StubDriver { class }),
            children,
        }
    }

    #[test]
    fn enumerate_is_deterministic() {
        let tree = DriverTree::new(leaf("root", "jumpstarter.composite", IndexMap::new()));
        assert_eq!(tree.enumerate(), tree.enumerate());
    }

    #[test]
    fn uuids_are_unique_and_parents_precede_children() {
        let mut children = IndexMap::new();
        children.insert("power0".to_string(), leaf("power0", "jumpstarter.power.Mock", IndexMap::new()));
        let tree = DriverTree::new(leaf("root", "jumpstarter.composite", children));
        let report = tree.enumerate();

        let mut seen = std::collections::HashSet::new();
        for entry in &report.entries {
            assert!(seen.insert(entry.uuid.clone()), "duplicate uuid in report");
            if let Some(parent) = &entry.parent_uuid {
                assert!(seen.contains(parent), "parent_uuid must precede child in the report");
            }
        }
        assert_eq!(report.entries.iter().filter(|e| e.parent_uuid.is_none()).count(), 1);
    }

    #[test]
    fn proxy_resolves_to_target_driver() {
        let mut children = IndexMap::new();
        children.insert("power0".to_string(), leaf("power0", "jumpstarter.power.Mock", IndexMap::new()));
        let proxy = TreeNode::Proxy {
            uuid: Uuid::new_v4(),
            labels: [("name".to_string(), "alias".to_string())].into_iter().collect(),
            client_class: "jumpstarter.power.Mock".into(),
            target_path: vec!["power0".to_string()],
        };
        children.insert("alias".to_string(), proxy);
        let tree = DriverTree::new(leaf("root", "jumpstarter.composite", children));

        let power0_uuid = tree.find_by_path(&["power0".to_string()]).unwrap().uuid();
        let proxy_uuid = tree.find_by_path(&["alias".to_string()]).unwrap().uuid();
        assert!(Arc::ptr_eq(&tree.resolve(power0_uuid).unwrap(), &tree.resolve(proxy_uuid).unwrap()));
    }
}
