pub mod edge;
pub mod node;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use petgraph::Directed;
use petgraph::Direction;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableGraph};
use petgraph::visit::EdgeRef;
use sha2::{Digest, Sha256};

use crate::error::GraphError;
use crate::symbol::{Location, Symbol, SymbolKind};
use edge::{EdgeKind, GraphEdge};
use node::GraphNode;

/// Declarative capacity limits enforced at insertion. Zero means unlimited.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphLimits {
    pub max_nodes: usize,
    pub max_edges: usize,
    pub max_memory_mb: usize,
}

/// Aggregate counts derived from a built graph.
#[derive(Debug, Clone, Default)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub placeholder_count: usize,
    pub nodes_by_kind: HashMap<SymbolKind, usize>,
    pub edges_by_kind: HashMap<EdgeKind, usize>,
}

/// The in-memory code graph: a directed petgraph StableGraph with O(1)
/// lookup indexes, capacity limits and a freeze/hash lifecycle.
///
/// Before `freeze()` the graph is mutable and iteration follows insertion
/// order. After `freeze()` no structural mutation is allowed, every secondary
/// index is sorted, and iteration is canonical: nodes by ID, edges by
/// `(from_id, to_id, type_code)`.
pub struct CodeGraph {
    graph: StableGraph<GraphNode, GraphEdge, Directed>,
    /// Maps symbol IDs to node indices for O(1) lookup.
    id_index: HashMap<String, NodeIndex>,
    /// Uniqueness guard for `(from, to, kind)` triples.
    edge_keys: HashSet<(NodeIndex, NodeIndex, EdgeKind)>,

    by_name: HashMap<String, Vec<NodeIndex>>,
    by_kind: HashMap<SymbolKind, Vec<NodeIndex>>,
    by_file: HashMap<String, Vec<NodeIndex>>,
    edges_by_kind: HashMap<EdgeKind, Vec<EdgeIndex>>,
    edges_by_file: HashMap<String, Vec<EdgeIndex>>,

    /// Canonical iteration orders, built at freeze time.
    node_order: Vec<NodeIndex>,
    edge_order: Vec<EdgeIndex>,

    limits: GraphLimits,
    estimated_bytes: usize,
    frozen: bool,
    built_at_milli: i64,
    graph_hash: String,
    project_root: String,
}

impl CodeGraph {
    /// Create an empty, unlimited graph.
    pub fn new() -> Self {
        Self::with_limits(GraphLimits::default())
    }

    pub fn with_limits(limits: GraphLimits) -> Self {
        CodeGraph {
            graph: StableGraph::new(),
            id_index: HashMap::new(),
            edge_keys: HashSet::new(),
            by_name: HashMap::new(),
            by_kind: HashMap::new(),
            by_file: HashMap::new(),
            edges_by_kind: HashMap::new(),
            edges_by_file: HashMap::new(),
            node_order: Vec::new(),
            edge_order: Vec::new(),
            limits,
            estimated_bytes: 0,
            frozen: false,
            built_at_milli: 0,
            graph_hash: String::new(),
            project_root: String::new(),
        }
    }

    pub fn project_root(&self) -> &str {
        &self.project_root
    }

    pub fn set_project_root(&mut self, root: impl Into<String>) {
        self.project_root = root.into();
    }

    /// Add a node for `symbol`. Fails when the graph is frozen, the ID is
    /// taken, or a capacity limit would be exceeded.
    pub fn add_node(&mut self, symbol: Arc<Symbol>) -> Result<(), GraphError> {
        if self.frozen {
            return Err(GraphError::Frozen);
        }
        if self.id_index.contains_key(&symbol.id) {
            return Err(GraphError::DuplicateNode(symbol.id.clone()));
        }
        if self.limits.max_nodes > 0 && self.graph.node_count() >= self.limits.max_nodes {
            return Err(GraphError::NodeLimit(self.limits.max_nodes));
        }
        let estimate = node_estimate(&symbol);
        if self.over_memory_budget(estimate) {
            return Err(GraphError::MemoryLimit(self.limits.max_memory_mb));
        }

        let node = GraphNode::new(symbol);
        let id = node.id.clone();
        let name = node.name().to_string();
        let kind = node.kind();
        let file = node.file_path().to_string();

        let idx = self.graph.add_node(node);
        self.id_index.insert(id, idx);
        self.by_name.entry(name).or_default().push(idx);
        self.by_kind.entry(kind).or_default().push(idx);
        if !file.is_empty() {
            self.by_file.entry(file).or_default().push(idx);
        }
        self.estimated_bytes += estimate;
        Ok(())
    }

    /// Add a typed edge between two existing nodes.
    ///
    /// A duplicate `(from, to, kind)` triple returns the distinguished
    /// [`GraphError::DuplicateEdge`] variant so insertion sites can treat it
    /// as a no-op.
    pub fn add_edge(
        &mut self,
        from_id: &str,
        to_id: &str,
        kind: EdgeKind,
        location: Location,
    ) -> Result<(), GraphError> {
        if self.frozen {
            return Err(GraphError::Frozen);
        }
        if from_id == to_id {
            return Err(GraphError::SelfEdge(from_id.to_string()));
        }
        let from_idx = *self
            .id_index
            .get(from_id)
            .ok_or_else(|| GraphError::MissingEndpoint(from_id.to_string()))?;
        let to_idx = *self
            .id_index
            .get(to_id)
            .ok_or_else(|| GraphError::MissingEndpoint(to_id.to_string()))?;
        if self.edge_keys.contains(&(from_idx, to_idx, kind)) {
            return Err(GraphError::DuplicateEdge {
                from_id: from_id.to_string(),
                to_id: to_id.to_string(),
                kind,
            });
        }
        if self.limits.max_edges > 0 && self.graph.edge_count() >= self.limits.max_edges {
            return Err(GraphError::EdgeLimit(self.limits.max_edges));
        }
        let estimate = from_id.len() + to_id.len() + location.file.len() + 64;
        if self.over_memory_budget(estimate) {
            return Err(GraphError::MemoryLimit(self.limits.max_memory_mb));
        }

        let from_file = self.graph[from_idx].file_path().to_string();
        let edge = GraphEdge::new(from_id, to_id, kind, location);
        let eidx = self.graph.add_edge(from_idx, to_idx, edge);
        self.edge_keys.insert((from_idx, to_idx, kind));
        self.edges_by_kind.entry(kind).or_default().push(eidx);
        if !from_file.is_empty() {
            self.edges_by_file.entry(from_file).or_default().push(eidx);
        }
        self.estimated_bytes += estimate;
        Ok(())
    }

    fn over_memory_budget(&self, additional: usize) -> bool {
        self.limits.max_memory_mb > 0
            && self.estimated_bytes + additional > self.limits.max_memory_mb * 1024 * 1024
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.id_index.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.id_index.get(id).map(|&idx| &self.graph[idx])
    }

    /// Mutable access to a node's symbol before freeze (cross-file method
    /// association appends synthesized method signatures). `None` once frozen.
    pub(crate) fn node_symbol_mut(&mut self, id: &str) -> Option<&mut Symbol> {
        if self.frozen {
            return None;
        }
        let idx = *self.id_index.get(id)?;
        self.graph
            .node_weight_mut(idx)
            .map(|node| Arc::make_mut(&mut node.symbol))
    }

    /// All nodes; canonical (ID-sorted) order after freeze, insertion order
    /// before.
    pub fn nodes(&self) -> Vec<&GraphNode> {
        if self.frozen {
            self.node_order.iter().map(|&idx| &self.graph[idx]).collect()
        } else {
            self.graph
                .node_indices()
                .map(|idx| &self.graph[idx])
                .collect()
        }
    }

    /// All edges; canonical `(from, to, type_code)` order after freeze.
    pub fn edges(&self) -> Vec<&GraphEdge> {
        if self.frozen {
            self.edge_order.iter().map(|&idx| &self.graph[idx]).collect()
        } else {
            self.graph
                .edge_indices()
                .map(|idx| &self.graph[idx])
                .collect()
        }
    }

    pub fn nodes_named(&self, name: &str) -> Vec<&GraphNode> {
        self.collect_nodes(self.by_name.get(name))
    }

    pub fn nodes_of_kind(&self, kind: SymbolKind) -> Vec<&GraphNode> {
        self.collect_nodes(self.by_kind.get(&kind))
    }

    pub fn nodes_in_file(&self, file: &str) -> Vec<&GraphNode> {
        self.collect_nodes(self.by_file.get(file))
    }

    /// File paths that own at least one node, in index order.
    pub fn files(&self) -> Vec<&str> {
        self.by_file.keys().map(String::as_str).collect()
    }

    pub fn edges_of_kind(&self, kind: EdgeKind) -> Vec<&GraphEdge> {
        match self.edges_by_kind.get(&kind) {
            Some(indices) => indices.iter().map(|&idx| &self.graph[idx]).collect(),
            None => Vec::new(),
        }
    }

    /// Edges whose source node lives in `file`.
    pub fn edges_from_file(&self, file: &str) -> Vec<&GraphEdge> {
        match self.edges_by_file.get(file) {
            Some(indices) => indices.iter().map(|&idx| &self.graph[idx]).collect(),
            None => Vec::new(),
        }
    }

    fn collect_nodes(&self, indices: Option<&Vec<NodeIndex>>) -> Vec<&GraphNode> {
        match indices {
            Some(indices) => indices.iter().map(|&idx| &self.graph[idx]).collect(),
            None => Vec::new(),
        }
    }

    /// Outgoing edges of a node.
    pub fn outgoing(&self, id: &str) -> Vec<&GraphEdge> {
        self.adjacent(id, Direction::Outgoing)
    }

    /// Incoming edges of a node.
    pub fn incoming(&self, id: &str) -> Vec<&GraphEdge> {
        self.adjacent(id, Direction::Incoming)
    }

    fn adjacent(&self, id: &str, direction: Direction) -> Vec<&GraphEdge> {
        match self.id_index.get(id) {
            Some(&idx) => self
                .graph
                .edges_directed(idx, direction)
                .map(|e| e.weight())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Return a count of nodes broken down by symbol kind.
    pub fn counts_by_kind(&self) -> HashMap<SymbolKind, usize> {
        let mut map: HashMap<SymbolKind, usize> = HashMap::new();
        for idx in self.graph.node_indices() {
            *map.entry(self.graph[idx].kind()).or_insert(0) += 1;
        }
        map
    }

    pub fn stats(&self) -> GraphStats {
        let nodes_by_kind = self.counts_by_kind();
        let placeholder_count = *nodes_by_kind.get(&SymbolKind::External).unwrap_or(&0);
        let mut edges_by_kind: HashMap<EdgeKind, usize> = HashMap::new();
        for idx in self.graph.edge_indices() {
            *edges_by_kind.entry(self.graph[idx].kind).or_insert(0) += 1;
        }
        GraphStats {
            node_count: self.node_count(),
            edge_count: self.edge_count(),
            placeholder_count,
            nodes_by_kind,
            edges_by_kind,
        }
    }

    /// Freeze the graph: stamp the build time, sort every secondary index,
    /// compute the canonical content hash and forbid further mutation.
    pub fn freeze(&mut self) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        self.freeze_at(now);
    }

    /// Freeze with an explicit timestamp. Deserialization replays a stored
    /// graph and restores its original `built_at_milli` verbatim so the hash
    /// round-trips exactly; the hash itself never covers the timestamp.
    pub(crate) fn freeze_at(&mut self, built_at_milli: i64) {
        if self.frozen {
            return;
        }

        let mut node_order: Vec<NodeIndex> = self.graph.node_indices().collect();
        node_order.sort_by(|&a, &b| self.graph[a].id.cmp(&self.graph[b].id));
        let mut edge_order: Vec<EdgeIndex> = self.graph.edge_indices().collect();
        edge_order.sort_by(|&a, &b| edge_sort_key(&self.graph[a]).cmp(&edge_sort_key(&self.graph[b])));

        let graph = &self.graph;
        for indices in self
            .by_name
            .values_mut()
            .chain(self.by_kind.values_mut())
            .chain(self.by_file.values_mut())
        {
            indices.sort_by(|&a, &b| graph[a].id.cmp(&graph[b].id));
        }
        for indices in self
            .edges_by_kind
            .values_mut()
            .chain(self.edges_by_file.values_mut())
        {
            indices.sort_by(|&a, &b| edge_sort_key(&graph[a]).cmp(&edge_sort_key(&graph[b])));
        }

        self.node_order = node_order;
        self.edge_order = edge_order;
        self.built_at_milli = built_at_milli;
        self.graph_hash = self.compute_hash();
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Zero until the graph is frozen.
    pub fn built_at_milli(&self) -> i64 {
        self.built_at_milli
    }

    /// Empty until the graph is frozen.
    pub fn graph_hash(&self) -> &str {
        &self.graph_hash
    }

    /// SHA-256 over the canonical node and edge streams. Two builds over the
    /// same inputs hash identically regardless of when they ran.
    fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for &idx in &self.node_order {
            let node = &self.graph[idx];
            hasher.update(node.id.as_bytes());
            hasher.update([0u8]);
            let payload =
                serde_json::to_vec(node.symbol.as_ref()).expect("symbol serialization is infallible");
            hasher.update(&payload);
            hasher.update([0u8]);
        }
        for &idx in &self.edge_order {
            let edge = &self.graph[idx];
            hasher.update(edge.from_id.as_bytes());
            hasher.update([0u8]);
            hasher.update(edge.to_id.as_bytes());
            hasher.update([0u8]);
            hasher.update([edge.kind.type_code()]);
            hasher.update(edge.location.file.as_bytes());
            hasher.update(edge.location.line.to_le_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

impl Default for CodeGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CodeGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeGraph")
            .field("node_count", &self.graph.node_count())
            .field("edge_count", &self.graph.edge_count())
            .field("frozen", &self.frozen)
            .finish()
    }
}

fn edge_sort_key(edge: &GraphEdge) -> (&str, &str, u8) {
    (&edge.from_id, &edge.to_id, edge.kind.type_code())
}

/// Rough per-node footprint used for the declarative memory budget.
fn node_estimate(symbol: &Symbol) -> usize {
    symbol.id.len() + symbol.name.len() + symbol.file_path.len() + 192
}
