//! Implicit interface detection by method-set containment.
//!
//! One algorithm covers Go interfaces, Python Protocol classes and
//! TypeScript interfaces: collect each interface's method names (closed over
//! embedded interfaces), collect each type's method names (closed over
//! embedded types, i.e. promoted methods), then emit an Implements edge for
//! every type whose set contains an interface's set. Matching is by method
//! name only and never crosses languages.

use std::collections::{BTreeMap, HashSet};

use crate::graph::edge::EdgeKind;
use crate::graph::CodeGraph;
use crate::symbol::{Location, SymbolKind};

use super::{BuildState, CancelToken};

/// Embed chains deeper than this are treated as pathological.
const EMBED_DEPTH_LIMIT: usize = 20;

struct MethodSet {
    id: String,
    file_path: String,
    start_line: u32,
    methods: HashSet<String>,
}

/// Returns false when the cancel token fired (polled every 1,000 pair
/// comparisons).
pub(crate) fn detect_implementations(state: &mut BuildState, cancel: &CancelToken) -> bool {
    // Interface method sets, closed over embedded interfaces. An interface
    // with no direct methods still participates: composition may fill it in.
    let mut interfaces: BTreeMap<String, Vec<MethodSet>> = BTreeMap::new();
    for node in state.graph.nodes() {
        if node.kind() != SymbolKind::Interface {
            continue;
        }
        let Some(meta) = &node.symbol.metadata else {
            continue;
        };
        let mut methods: HashSet<String> = meta.methods.iter().map(|m| m.name.clone()).collect();
        let mut visited = HashSet::from([node.id.clone()]);
        collect_embedded_methods(&state.graph, &node.id, &mut methods, &mut visited, 0);
        interfaces
            .entry(node.language().to_lowercase())
            .or_default()
            .push(MethodSet {
                id: node.id.clone(),
                file_path: node.file_path().to_string(),
                start_line: node.symbol.start_line,
                methods,
            });
    }

    // An empty method set would subsume every type; drop those interfaces.
    for sets in interfaces.values_mut() {
        sets.retain(|s| !s.methods.is_empty());
    }

    // Type method sets with promoted methods from embedded types. A type
    // with no direct methods can still qualify through its embeds.
    let mut types: BTreeMap<String, Vec<MethodSet>> = BTreeMap::new();
    for node in state.graph.nodes() {
        if !matches!(
            node.kind(),
            SymbolKind::Struct | SymbolKind::Class | SymbolKind::Type
        ) {
            continue;
        }
        let Some(meta) = &node.symbol.metadata else {
            continue;
        };
        let has_method_sources = !meta.methods.is_empty()
            || meta.extends.as_deref().is_some_and(|e| !e.is_empty())
            || !meta.implements.is_empty();
        if !has_method_sources {
            continue;
        }
        let mut methods: HashSet<String> = meta.methods.iter().map(|m| m.name.clone()).collect();
        let mut visited = HashSet::from([node.id.clone()]);
        collect_embedded_methods(&state.graph, &node.id, &mut methods, &mut visited, 0);
        types
            .entry(node.language().to_lowercase())
            .or_default()
            .push(MethodSet {
                id: node.id.clone(),
                file_path: node.file_path().to_string(),
                start_line: node.symbol.start_line,
                methods,
            });
    }

    // Superset matching, per language.
    let mut comparisons = 0usize;
    for (language, type_sets) in &types {
        let Some(interface_sets) = interfaces.get(language) else {
            continue;
        };
        for type_set in type_sets {
            for interface_set in interface_sets {
                comparisons += 1;
                if comparisons % 1000 == 0 && cancel.is_cancelled() {
                    state.incomplete = true;
                    return false;
                }
                if !interface_set.methods.is_subset(&type_set.methods) {
                    continue;
                }
                let location = Location::new(&type_set.file_path, type_set.start_line);
                if state.add_edge_checked(
                    &type_set.id,
                    &interface_set.id,
                    EdgeKind::Implements,
                    location,
                ) {
                    state.stats.interface_edges_detected += 1;
                }
            }
        }
    }
    true
}

/// Depth-first walk over outgoing Embeds edges, unioning each embedded
/// symbol's direct method names. The visited set breaks cycles; the depth
/// cap is defense in depth for pathological chains.
fn collect_embedded_methods(
    graph: &CodeGraph,
    id: &str,
    methods: &mut HashSet<String>,
    visited: &mut HashSet<String>,
    depth: usize,
) {
    if depth >= EMBED_DEPTH_LIMIT {
        return;
    }
    let targets: Vec<String> = graph
        .outgoing(id)
        .iter()
        .filter(|e| e.kind == EdgeKind::Embeds)
        .map(|e| e.to_id.clone())
        .collect();
    for target in targets {
        if !visited.insert(target.clone()) {
            continue;
        }
        if let Some(node) = graph.node(&target) {
            if let Some(meta) = &node.symbol.metadata {
                for method in &meta.methods {
                    methods.insert(method.name.clone());
                }
            }
        }
        collect_embedded_methods(graph, &target, methods, visited, depth + 1);
    }
}
