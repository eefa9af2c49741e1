//! Three-phase build pipeline: collect symbols, extract edges, finalize.
//!
//! The builder itself is stateless and reusable; every `build` call
//! constructs fresh state, runs the phases and returns a frozen graph plus
//! per-file/per-edge error records. Failures stay local: a bad file is
//! skipped, a bad edge is recorded, capacity problems mark the result
//! incomplete, and only the caller decides whether any of that is fatal.

mod collect;
mod extract;
mod imports;
mod interfaces;
mod methods;
mod resolve;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::debug;

use crate::error::GraphError;
use crate::graph::edge::EdgeKind;
use crate::graph::{CodeGraph, GraphLimits};
use crate::symbol::{external_id, Import, Location, ParseResult, Symbol};

/// Build-time configuration.
///
/// `workers` is declarative: the pipeline is single-threaded cooperative, the
/// setting is carried for a future parallel extraction phase.
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    pub project_root: String,
    pub max_nodes: usize,
    pub max_edges: usize,
    pub max_memory_mb: usize,
    pub workers: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        BuilderConfig {
            project_root: String::new(),
            max_nodes: 0,
            max_edges: 0,
            max_memory_mb: 0,
            workers: 1,
        }
    }
}

/// Cooperative cancellation flag, polled at explicit checkpoints (per file,
/// every 10 imports, every 1,000 interface pair comparisons or methods).
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Pipeline phase reported through the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    Collecting,
    ExtractingEdges,
    Finalizing,
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildPhase::Collecting => "collecting",
            BuildPhase::ExtractingEdges => "extracting edges",
            BuildPhase::Finalizing => "finalizing",
        };
        f.write_str(name)
    }
}

/// Progress snapshot delivered at the end of each file in phases 1 and 2 and
/// once in phase 3. The callback must be cheap and cannot mutate build state.
#[derive(Debug, Clone)]
pub struct BuildProgress {
    pub phase: BuildPhase,
    pub files_total: usize,
    pub files_processed: usize,
    pub nodes_created: u64,
    pub edges_created: u64,
}

/// A file-level problem; the file was skipped but the build continued.
#[derive(Debug, Clone)]
pub struct FileError {
    pub file_path: String,
    pub message: String,
}

/// An edge-level problem; the edge was skipped but the build continued.
#[derive(Debug, Clone)]
pub struct EdgeError {
    pub from_id: String,
    pub to_id: String,
    pub kind: EdgeKind,
    pub message: String,
}

/// Counters accumulated over a single build.
#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    pub files_processed: u64,
    pub files_failed: u64,
    pub nodes_created: u64,
    pub edges_created: u64,
    pub placeholder_nodes: u64,
    pub call_edges_resolved: u64,
    pub call_edges_unresolved: u64,
    pub ambiguous_resolves: u64,
    pub named_import_edges_resolved: u64,
    pub dynamic_import_edges_resolved: u64,
    pub decorator_arg_edges_resolved: u64,
    pub interface_edges_detected: u64,
    pub duration_milli: u64,
    pub duration_micro: u64,
}

/// The outcome of one build: the frozen graph, everything that went wrong
/// locally, and the counters.
#[derive(Debug)]
pub struct BuildResult {
    pub graph: CodeGraph,
    pub file_errors: Vec<FileError>,
    pub edge_errors: Vec<EdgeError>,
    pub stats: BuildStats,
    /// True when the build was cancelled or hit a capacity limit; the graph
    /// still contains everything created up to that point.
    pub incomplete: bool,
}

/// Name-map entry recorded for `import { orig as alias }` style imports.
#[derive(Debug, Clone)]
pub(crate) struct ImportedName {
    pub module_path: String,
    pub original_name: String,
}

/// A validated file retained for the edge-extraction phase.
pub(crate) struct CollectedFile {
    pub file_path: String,
    pub language: String,
    /// Top-level symbols; children are reached through `Symbol::children`.
    pub symbols: Vec<Arc<Symbol>>,
}

/// Mutable state threaded through the pipeline. Mirrors the supporting
/// tables the resolver needs (symbols by ID/name, parent and extends maps,
/// per-file imports, the import name map, and the placeholder table).
pub(crate) struct BuildState {
    pub graph: CodeGraph,
    pub files: Vec<CollectedFile>,
    pub symbols_by_id: HashMap<String, Arc<Symbol>>,
    pub symbols_by_name: HashMap<String, Vec<Arc<Symbol>>>,
    /// Child symbol ID -> parent symbol ID (receiver-less languages).
    pub symbol_parent: HashMap<String, String>,
    /// Class name -> parent class name, for inheritance chain walking.
    pub class_extends: HashMap<String, String>,
    pub file_imports: HashMap<String, Vec<Import>>,
    pub import_name_map: HashMap<String, HashMap<String, ImportedName>>,
    /// Mutex-guarded so a future parallel extraction phase can share it.
    pub placeholders: Mutex<HashSet<String>>,
    pub file_errors: Vec<FileError>,
    pub edge_errors: Vec<EdgeError>,
    pub stats: BuildStats,
    pub incomplete: bool,
}

impl BuildState {
    fn new(config: &BuilderConfig) -> Self {
        let mut graph = CodeGraph::with_limits(GraphLimits {
            max_nodes: config.max_nodes,
            max_edges: config.max_edges,
            max_memory_mb: config.max_memory_mb,
        });
        graph.set_project_root(config.project_root.clone());
        BuildState {
            graph,
            files: Vec::new(),
            symbols_by_id: HashMap::new(),
            symbols_by_name: HashMap::new(),
            symbol_parent: HashMap::new(),
            class_extends: HashMap::new(),
            file_imports: HashMap::new(),
            import_name_map: HashMap::new(),
            placeholders: Mutex::new(HashSet::new()),
            file_errors: Vec::new(),
            edge_errors: Vec::new(),
            stats: BuildStats::default(),
            incomplete: false,
        }
    }

    /// Read-only view over the lookup tables for the call-target resolver.
    pub(crate) fn resolver_ctx(&self) -> resolve::ResolverCtx<'_> {
        resolve::ResolverCtx {
            symbols_by_id: &self.symbols_by_id,
            symbols_by_name: &self.symbols_by_name,
            symbol_parent: &self.symbol_parent,
            class_extends: &self.class_extends,
            import_name_map: &self.import_name_map,
        }
    }

    /// Insert an edge, enforcing the kind-compatibility table.
    ///
    /// Self edges are skipped silently, duplicates are a no-op, capacity
    /// problems mark the build incomplete, and anything else lands in
    /// `edge_errors`. Returns true when the edge exists afterwards.
    pub(crate) fn add_edge_checked(
        &mut self,
        from_id: &str,
        to_id: &str,
        kind: EdgeKind,
        location: Location,
    ) -> bool {
        if from_id == to_id {
            return false;
        }
        if let (Some(from), Some(to)) = (self.graph.node(from_id), self.graph.node(to_id)) {
            if !extract::edge_kind_allowed(kind, from.kind(), to.kind()) {
                debug!(from = from_id, to = to_id, kind = %kind, "incompatible endpoint kinds, skipping edge");
                return false;
            }
        }
        match self.graph.add_edge(from_id, to_id, kind, location) {
            Ok(()) => {
                self.stats.edges_created += 1;
                true
            }
            Err(err) if err.is_duplicate_edge() => true,
            Err(err) => {
                if err.is_capacity() {
                    self.incomplete = true;
                }
                self.edge_errors.push(EdgeError {
                    from_id: from_id.to_string(),
                    to_id: to_id.to_string(),
                    kind,
                    message: err.to_string(),
                });
                false
            }
        }
    }

    /// Create (or reuse) the placeholder node for an unresolved reference.
    /// Returns `None` only when node insertion failed outright.
    pub(crate) fn get_or_create_placeholder(&mut self, pkg: &str, name: &str) -> Option<String> {
        let id = external_id(pkg, name);
        let mut table = self.placeholders.lock().expect("placeholder table poisoned");
        if table.contains(&id) {
            return Some(id);
        }
        match self.graph.add_node(Arc::new(Symbol::external(pkg, name))) {
            Ok(()) => {
                table.insert(id.clone());
                self.stats.nodes_created += 1;
                self.stats.placeholder_nodes += 1;
                Some(id)
            }
            Err(GraphError::DuplicateNode(_)) => {
                table.insert(id.clone());
                Some(id)
            }
            Err(err) => {
                if err.is_capacity() {
                    self.incomplete = true;
                }
                debug!(id = %id, error = %err, "placeholder node rejected");
                None
            }
        }
    }
}

/// Builds a frozen [`CodeGraph`] from per-file parse results.
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    config: BuilderConfig,
}

impl GraphBuilder {
    pub fn new(config: BuilderConfig) -> Self {
        GraphBuilder { config }
    }

    /// Run the full pipeline without progress reporting.
    pub fn build(&self, cancel: &CancelToken, results: &[ParseResult]) -> BuildResult {
        self.build_with_progress(cancel, results, &mut |_| {})
    }

    /// Run the full pipeline.
    ///
    /// Cancellation at any checkpoint returns the partial result with
    /// `incomplete = true`, still containing every node and edge created so
    /// far; the graph is frozen either way so the caller can read it.
    pub fn build_with_progress(
        &self,
        cancel: &CancelToken,
        results: &[ParseResult],
        progress: &mut dyn FnMut(&BuildProgress),
    ) -> BuildResult {
        let started = Instant::now();
        let mut state = BuildState::new(&self.config);
        let files_total = results.len();
        let mut cancelled = false;

        // Phase 1: collect. Validate files, insert symbol nodes, build the
        // parent/extends side tables.
        let mut files_seen = 0;
        for result in results {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            collect::collect_file(&mut state, result);
            files_seen += 1;
            progress(&BuildProgress {
                phase: BuildPhase::Collecting,
                files_total,
                files_processed: files_seen,
                nodes_created: state.stats.nodes_created,
                edges_created: state.stats.edges_created,
            });
        }

        // Phase 2: extract edges per file, then the cross-file passes.
        if !cancelled {
            collect::build_import_name_map(&mut state);
            for index in 0..state.files.len() {
                if cancel.is_cancelled() {
                    cancelled = true;
                    break;
                }
                if !imports::extract_import_edges(&mut state, index, cancel) {
                    cancelled = true;
                    break;
                }
                extract::extract_file(&mut state, index);
                progress(&BuildProgress {
                    phase: BuildPhase::ExtractingEdges,
                    files_total,
                    files_processed: index + 1,
                    nodes_created: state.stats.nodes_created,
                    edges_created: state.stats.edges_created,
                });
            }
            // Method association must precede implementation detection: a
            // method defined away from its receiver type still counts in
            // that type's method set.
            if !cancelled {
                if methods::associate_go_methods(&mut state, cancel) {
                    cancelled = !interfaces::detect_implementations(&mut state, cancel);
                } else {
                    cancelled = true;
                }
            }
        }

        // Phase 3: finalize. Freeze the graph and stamp durations.
        state.graph.freeze();
        state.incomplete |= cancelled;
        let elapsed = started.elapsed();
        state.stats.duration_milli = elapsed.as_millis() as u64;
        state.stats.duration_micro = elapsed.as_micros() as u64;
        progress(&BuildProgress {
            phase: BuildPhase::Finalizing,
            files_total,
            files_processed: files_seen,
            nodes_created: state.stats.nodes_created,
            edges_created: state.stats.edges_created,
        });

        BuildResult {
            graph: state.graph,
            file_errors: state.file_errors,
            edge_errors: state.edge_errors,
            stats: state.stats,
            incomplete: state.incomplete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{CallSite, SymbolKind};

    fn func(id: &str, name: &str, file: &str) -> Symbol {
        Symbol::new(id, name, SymbolKind::Function, file, "go")
    }

    #[test]
    fn test_empty_build() {
        let builder = GraphBuilder::default();
        let result = builder.build(&CancelToken::new(), &[]);
        assert!(!result.incomplete);
        assert_eq!(result.graph.node_count(), 0);
        assert!(result.graph.is_frozen());
    }

    #[test]
    fn test_invalid_file_is_skipped_not_fatal() {
        let builder = GraphBuilder::default();
        let bad = ParseResult::new("../escape.go", "go");
        let good = ParseResult::new("a.go", "go").with_symbol(func("a.go:1:f", "f", "a.go"));
        let result = builder.build(&CancelToken::new(), &[bad, good]);
        assert_eq!(result.file_errors.len(), 1);
        assert_eq!(result.stats.files_failed, 1);
        assert_eq!(result.stats.files_processed, 1);
        assert!(result.graph.contains_node("a.go:1:f"));
        assert!(!result.incomplete);
    }

    #[test]
    fn test_cancellation_returns_partial_result() {
        let builder = GraphBuilder::default();
        let cancel = CancelToken::new();
        cancel.cancel();
        let results =
            vec![ParseResult::new("a.go", "go").with_symbol(func("a.go:1:f", "f", "a.go"))];
        let result = builder.build(&cancel, &results);
        assert!(result.incomplete);
        assert_eq!(result.graph.node_count(), 0);
        assert!(result.graph.is_frozen());
    }

    #[test]
    fn test_node_capacity_marks_incomplete() {
        let builder = GraphBuilder::new(BuilderConfig {
            max_nodes: 1,
            ..Default::default()
        });
        let results = vec![
            ParseResult::new("a.go", "go")
                .with_symbol(func("a.go:1:f", "f", "a.go"))
                .with_symbol(func("a.go:2:g", "g", "a.go")),
        ];
        let result = builder.build(&CancelToken::new(), &results);
        assert!(result.incomplete);
        assert_eq!(result.graph.node_count(), 1);
        assert!(!result.file_errors.is_empty());
    }

    #[test]
    fn test_progress_reports_all_phases() {
        let builder = GraphBuilder::default();
        let results = vec![
            ParseResult::new("a.go", "go").with_symbol(
                func("a.go:1:f", "f", "a.go")
                    .with_call(CallSite::new("g", Location::new("a.go", 2))),
            ),
            ParseResult::new("b.go", "go").with_symbol(func("b.go:1:g", "g", "b.go")),
        ];
        let mut phases = Vec::new();
        let result = builder.build_with_progress(&CancelToken::new(), &results, &mut |p| {
            phases.push((p.phase, p.files_processed));
        });
        assert!(!result.incomplete);
        // Two collect ticks, two extract ticks, one finalize tick.
        assert_eq!(
            phases,
            vec![
                (BuildPhase::Collecting, 1),
                (BuildPhase::Collecting, 2),
                (BuildPhase::ExtractingEdges, 1),
                (BuildPhase::ExtractingEdges, 2),
                (BuildPhase::Finalizing, 2),
            ]
        );
    }
}
