//! trace-graph — the core of a multi-language code graph builder.
//!
//! Takes parsed per-file symbol tables plus import/call/type metadata (Go,
//! Python, JavaScript, TypeScript) and produces a single typed, directed,
//! content-addressed graph whose nodes are code symbols and whose edges are
//! semantic relationships: calls, imports, implements, embeds, references,
//! returns, receives.
//!
//! The pieces:
//!
//! - [`symbol`] — the input contract shared with the per-language parsers.
//! - [`graph`] — node/edge storage, secondary indexes, freeze + content hash.
//! - [`builder`] — the three-phase pipeline: collect, extract (call-target
//!   resolution, implicit interface detection, cross-file method
//!   association), finalize.
//! - [`classify`] — topology-based production / non-production labeling.
//! - [`snapshot`] — canonical serialization and gzip + content-addressed
//!   storage in an embedded KV store.
//!
//! ```no_run
//! use trace_graph::{CancelToken, GraphBuilder, ParseResult};
//!
//! let builder = GraphBuilder::default();
//! let results: Vec<ParseResult> = Vec::new(); // from the parsers
//! let built = builder.build(&CancelToken::new(), &results);
//! println!("{} nodes, {} edges", built.graph.node_count(), built.graph.edge_count());
//! ```

pub mod builder;
pub mod classify;
pub mod error;
pub mod graph;
pub mod language;
pub mod snapshot;
pub mod symbol;

pub use builder::{
    BuildPhase, BuildProgress, BuildResult, BuildStats, BuilderConfig, CancelToken, EdgeError,
    FileError, GraphBuilder,
};
pub use classify::{classify_files, Classification, ClassificationStats, ClassifierConfig};
pub use error::{GraphError, SnapshotError};
pub use graph::edge::{EdgeKind, GraphEdge};
pub use graph::node::GraphNode;
pub use graph::{CodeGraph, GraphLimits, GraphStats};
pub use language::LanguageKind;
pub use snapshot::{SnapshotMetadata, SnapshotStore};
pub use symbol::{
    CallSite, Import, Location, MethodSignature, ParseResult, Symbol, SymbolKind, SymbolMetadata,
};
