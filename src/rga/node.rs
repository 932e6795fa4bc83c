//! Fundamental types for the RGA CRDT: element identity, the operation
//! taxonomy clients send, and the node representation integrated ops become.

use serde::{Deserialize, Serialize};

/// A globally unique identifier for an RGA element.
///
/// Ordered lexicographically: `lamport` first, then `replica_id`. Clients
/// assign these, never the server. Encoded on the wire as a 2-element JSON
/// array (`[lamport, replica_id]`) via serde's default tuple-struct
/// encoding.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementId(pub u64, pub String);

impl ElementId {
    pub fn new(lamport: u64, replica_id: impl Into<String>) -> Self {
        ElementId(lamport, replica_id.into())
    }

    pub fn lamport(&self) -> u64 {
        self.0
    }

    pub fn replica_id(&self) -> &str {
        &self.1
    }
}

/// The reserved root element. Always present, always a tombstone, always
/// sorts before every other id.
pub fn root_id() -> ElementId {
    ElementId(0, "root".to_string())
}

/// Insert a single character after `parent_id`.
///
/// `value` is one Unicode scalar value, the grapheme unit this
/// implementation chose to be consistent about. Serde's `char`
/// deserialization already rejects any string that isn't exactly one
/// scalar value, so the wire boundary enforces this without extra code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertOp {
    pub parent_id: ElementId,
    pub id: ElementId,
    pub value: char,
}

/// Logically delete the element identified by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOp {
    pub id: ElementId,
}

/// The closed sum of operations the RGA integrates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Op {
    #[serde(rename = "ins")]
    Insert(InsertOp),
    #[serde(rename = "del")]
    Delete(DeleteOp),
}

impl Op {
    /// The element id this op concerns: the insert's own id, or the
    /// delete's target.
    pub fn id(&self) -> &ElementId {
        match self {
            Op::Insert(op) => &op.id,
            Op::Delete(op) => &op.id,
        }
    }
}

/// A node in the RGA tree.
///
/// Immutable except that `deleted` may transition `false -> true`, never
/// back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgaNode {
    pub id: ElementId,
    pub parent_id: ElementId,
    pub value: char,
    pub deleted: bool,
}

impl RgaNode {
    pub fn root() -> Self {
        let root = root_id();
        RgaNode {
            parent_id: root.clone(),
            id: root,
            value: '\0',
            deleted: true,
        }
    }
}
