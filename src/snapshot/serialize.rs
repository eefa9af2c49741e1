//! Canonical serialization: a deterministic record from which a graph can be
//! reconstructed with identical secondary indexes and identical content hash.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, SnapshotError};
use crate::graph::edge::EdgeKind;
use crate::graph::CodeGraph;
use crate::symbol::{Location, Symbol};

/// Bump when the serialized layout changes; readers reject anything else.
pub const SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Serialize, Deserialize)]
pub struct SerializableNode {
    pub id: String,
    /// Always present in well-formed data; `None` is a fatal decode error.
    pub symbol: Option<Symbol>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SerializableEdge {
    pub from_id: String,
    pub to_id: String,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
    pub type_code: u8,
    pub location: Location,
}

/// The wire form of a frozen graph. Nodes are sorted by ID, edges by
/// `(from_id, to_id, type_code)`, so serializing the same graph twice is
/// byte-identical.
#[derive(Debug, Serialize, Deserialize)]
pub struct SerializableGraph {
    pub schema_version: String,
    pub project_root: String,
    pub built_at_milli: i64,
    pub graph_hash: String,
    pub nodes: Vec<SerializableNode>,
    pub edges: Vec<SerializableEdge>,
}

/// Produce the canonical record for a graph.
pub fn to_serializable(graph: &CodeGraph) -> SerializableGraph {
    let mut nodes: Vec<SerializableNode> = graph
        .nodes()
        .into_iter()
        .map(|node| SerializableNode {
            id: node.id.clone(),
            symbol: Some(node.symbol.as_ref().clone()),
        })
        .collect();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));

    let mut edges: Vec<SerializableEdge> = graph
        .edges()
        .into_iter()
        .map(|edge| SerializableEdge {
            from_id: edge.from_id.clone(),
            to_id: edge.to_id.clone(),
            kind: edge.kind,
            type_code: edge.kind.type_code(),
            location: edge.location.clone(),
        })
        .collect();
    edges.sort_by(|a, b| {
        (&a.from_id, &a.to_id, a.type_code).cmp(&(&b.from_id, &b.to_id, b.type_code))
    });

    SerializableGraph {
        schema_version: SCHEMA_VERSION.to_string(),
        project_root: graph.project_root().to_string(),
        built_at_milli: graph.built_at_milli(),
        graph_hash: graph.graph_hash().to_string(),
        nodes,
        edges,
    }
}

/// Rebuild a graph by replaying `add_node` then `add_edge` into a fresh
/// mutable graph, so the secondary indexes come out consistent by
/// construction, then freeze with the stored timestamp.
pub fn from_serializable(record: &SerializableGraph) -> Result<CodeGraph, SnapshotError> {
    if record.schema_version != SCHEMA_VERSION {
        return Err(SnapshotError::SchemaVersion(record.schema_version.clone()));
    }

    let mut graph = CodeGraph::new();
    graph.set_project_root(record.project_root.clone());

    for node in &record.nodes {
        let symbol = node
            .symbol
            .as_ref()
            .ok_or_else(|| SnapshotError::NilSymbol(node.id.clone()))?;
        graph.add_node(Arc::new(symbol.clone()))?;
    }
    for edge in &record.edges {
        graph
            .add_edge(&edge.from_id, &edge.to_id, edge.kind, edge.location.clone())
            .map_err(|err| match err {
                GraphError::MissingEndpoint(_) => SnapshotError::DanglingEdge {
                    from_id: edge.from_id.clone(),
                    to_id: edge.to_id.clone(),
                },
                other => SnapshotError::Replay(other),
            })?;
    }

    graph.freeze_at(record.built_at_milli);
    Ok(graph)
}
