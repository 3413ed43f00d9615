//! In-memory JSON base adapter
//!
//! Treats a `serde_json::Value` document as a tree: object members and
//! array elements are children, scalars are leaves. Node identity is
//! the RFC 6901 JSON pointer of the position. Object members enumerate
//! in key order, array elements by index, so the reported order is
//! deterministic without any sorting pass.

use crate::adapter::{AdapterId, ChildRequest, TreeAdapter};
use crate::error::{AdapterError, AdapterResult};
use crate::node::{NodeHandle, NodeKey, TreeNode};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// Key used for the document root (whose JSON pointer is empty)
const ROOT_KEY: &str = "$";

/// Escape one pointer token per RFC 6901
fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// A position inside a JSON document
pub struct JsonNode {
    doc: Arc<Value>,
    key: NodeKey,
    name: String,
    expandable: bool,
}

impl JsonNode {
    fn new(doc: Arc<Value>, pointer: String, name: String) -> Self {
        let expandable = doc
            .pointer(&pointer)
            .map(|value| value.is_object() || value.is_array())
            .unwrap_or(false);
        let key = if pointer.is_empty() {
            NodeKey::new(ROOT_KEY)
        } else {
            NodeKey::new(pointer)
        };
        JsonNode {
            doc,
            key,
            name,
            expandable,
        }
    }

    fn pointer(&self) -> &str {
        let key = self.key.as_str();
        if key == ROOT_KEY {
            ""
        } else {
            key
        }
    }

    /// The value at this position, if it still resolves
    pub fn value(&self) -> Option<&Value> {
        self.doc.pointer(self.pointer())
    }
}

#[async_trait]
impl TreeNode for JsonNode {
    fn key(&self) -> NodeKey {
        self.key.clone()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_expandable(&self) -> bool {
        self.expandable
    }

    async fn metadata(&self) -> Option<Value> {
        let value = self.value()?;
        let kind = match value {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        };
        let len = match value {
            Value::Array(items) => Some(items.len()),
            Value::Object(members) => Some(members.len()),
            _ => None,
        };
        Some(json!({ "kind": kind, "len": len }))
    }
}

/// Base adapter over an immutable JSON document
pub struct JsonAdapter {
    doc: Arc<Value>,
    id: AdapterId,
}

impl JsonAdapter {
    /// Wrap a document; the adapter owns an immutable copy
    pub fn new(doc: Value) -> Self {
        JsonAdapter {
            doc: Arc::new(doc),
            id: AdapterId::new("json", "pointer"),
        }
    }

    /// Node for the document root
    pub fn root_node(&self) -> NodeHandle {
        Arc::new(JsonNode::new(
            Arc::clone(&self.doc),
            String::new(),
            ROOT_KEY.to_string(),
        ))
    }
}

#[async_trait]
impl TreeAdapter for JsonAdapter {
    async fn children(&self, node: &NodeHandle, _req: ChildRequest) -> AdapterResult<Vec<NodeHandle>> {
        let key = node.key();
        let pointer = if key.as_str() == ROOT_KEY {
            ""
        } else {
            key.as_str()
        };
        let value = self
            .doc
            .pointer(pointer)
            .ok_or_else(|| AdapterError::NodeGone { key: key.clone() })?;

        let children = match value {
            Value::Object(members) => members
                .iter()
                .map(|(name, _)| {
                    let child_pointer = format!("{pointer}/{}", escape_token(name));
                    Arc::new(JsonNode::new(
                        Arc::clone(&self.doc),
                        child_pointer,
                        name.clone(),
                    )) as NodeHandle
                })
                .collect(),
            Value::Array(items) => (0..items.len())
                .map(|index| {
                    let child_pointer = format!("{pointer}/{index}");
                    Arc::new(JsonNode::new(
                        Arc::clone(&self.doc),
                        child_pointer,
                        index.to_string(),
                    )) as NodeHandle
                })
                .collect(),
            _ => Vec::new(),
        };
        Ok(children)
    }

    fn identity(&self) -> AdapterId {
        self.id.clone()
    }
}
