use thiserror::Error;

use crate::graph::edge::EdgeKind;

/// Errors returned by mutating operations on [`CodeGraph`](crate::graph::CodeGraph).
///
/// Duplicate edges get their own variant so callers can treat them as a
/// non-fatal no-op without inspecting error text.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The graph has been frozen; no structural mutation is allowed.
    #[error("graph is frozen")]
    Frozen,

    /// A node with the same ID already exists.
    #[error("node {0} already exists")]
    DuplicateNode(String),

    /// An edge with the same `(from, to, kind)` already exists.
    #[error("edge {from_id} -> {to_id} ({kind}) already exists")]
    DuplicateEdge {
        from_id: String,
        to_id: String,
        kind: EdgeKind,
    },

    /// An edge endpoint does not resolve to an existing node.
    #[error("edge endpoint {0} does not exist")]
    MissingEndpoint(String),

    /// The edge would connect a node to itself.
    #[error("self-referential edge on {0}")]
    SelfEdge(String),

    /// The configured node cap was reached.
    #[error("node limit of {0} reached")]
    NodeLimit(usize),

    /// The configured edge cap was reached.
    #[error("edge limit of {0} reached")]
    EdgeLimit(usize),

    /// The configured memory budget was exhausted.
    #[error("memory limit of {0} MB reached")]
    MemoryLimit(usize),
}

impl GraphError {
    /// True for the duplicate-edge variant, which insertion sites swallow.
    pub fn is_duplicate_edge(&self) -> bool {
        matches!(self, GraphError::DuplicateEdge { .. })
    }

    /// True for capacity errors; the build marks its result incomplete and
    /// keeps going when one of these comes back.
    pub fn is_capacity(&self) -> bool {
        matches!(
            self,
            GraphError::NodeLimit(_) | GraphError::EdgeLimit(_) | GraphError::MemoryLimit(_)
        )
    }
}

/// Fatal errors from the serialization and snapshot layers.
///
/// Everything else in the pipeline recovers locally (§ error policy in the
/// builder); only deserialization and snapshot storage can surface these.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The serialized graph carries a schema version this build cannot read.
    #[error("unsupported snapshot schema version {0:?}")]
    SchemaVersion(String),

    /// A serialized node has no symbol payload.
    #[error("node {0} has no symbol")]
    NilSymbol(String),

    /// A serialized edge references a node that is not in the node list.
    #[error("edge {from_id} -> {to_id} references a missing node")]
    DanglingEdge { from_id: String, to_id: String },

    /// Replaying nodes/edges into a fresh graph failed.
    #[error("graph replay failed: {0}")]
    Replay(#[from] GraphError),

    /// No snapshot stored under the requested key.
    #[error("snapshot {0} not found")]
    NotFound(String),

    /// The stored payload does not hash to the recorded content hash.
    #[error("content hash mismatch: stored {stored}, computed {computed}")]
    IntegrityMismatch { stored: String, computed: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Database(#[from] redb::DatabaseError),

    #[error(transparent)]
    Transaction(#[from] redb::TransactionError),

    #[error(transparent)]
    Table(#[from] redb::TableError),

    #[error(transparent)]
    Storage(#[from] redb::StorageError),

    #[error(transparent)]
    Commit(#[from] redb::CommitError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_edge_is_non_fatal() {
        let err = GraphError::DuplicateEdge {
            from_id: "a".into(),
            to_id: "b".into(),
            kind: EdgeKind::Calls,
        };
        assert!(err.is_duplicate_edge());
        assert!(!err.is_capacity());
    }

    #[test]
    fn test_capacity_errors() {
        assert!(GraphError::NodeLimit(10).is_capacity());
        assert!(GraphError::EdgeLimit(10).is_capacity());
        assert!(GraphError::MemoryLimit(64).is_capacity());
        assert!(!GraphError::Frozen.is_capacity());
    }
}
