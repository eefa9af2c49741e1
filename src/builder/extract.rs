//! Per-symbol edge extraction, dispatched on symbol kind.
//!
//! Methods get a `Receives` edge and then share the function path; functions
//! and properties emit `Calls` and `Returns`; structs and classes emit
//! `Implements`/`Embeds`; interfaces emit composition `Embeds`. Decorator
//! arguments, type arguments, type narrowings and callback arguments emit
//! `References` regardless of kind.

use std::sync::Arc;

use tracing::debug;

use crate::graph::edge::EdgeKind;
use crate::symbol::{CallSite, Location, Symbol, SymbolKind};

use super::{resolve, BuildState};

/// Extract all edges for one collected file's symbols (children included).
pub(crate) fn extract_file(state: &mut BuildState, index: usize) {
    let symbols = state.files[index].symbols.clone();
    for symbol in &symbols {
        extract_symbol(state, symbol);
    }
}

fn extract_symbol(state: &mut BuildState, symbol: &Arc<Symbol>) {
    match symbol.kind {
        SymbolKind::Method => {
            extract_receiver_edge(state, symbol);
            extract_callable(state, symbol);
        }
        SymbolKind::Function | SymbolKind::Property => extract_callable(state, symbol),
        SymbolKind::Struct | SymbolKind::Class => extract_type_edges(state, symbol),
        SymbolKind::Interface => extract_interface_composition(state, symbol),
        _ => {}
    }
    extract_reference_edges(state, symbol);

    for child in &symbol.children {
        let child_arc = state
            .symbols_by_id
            .get(&child.id)
            .cloned()
            .unwrap_or_else(|| Arc::new(child.clone()));
        extract_symbol(state, &child_arc);
    }
}

/// Calls, callback references and the annotated return type.
fn extract_callable(state: &mut BuildState, symbol: &Arc<Symbol>) {
    for call in &symbol.calls {
        if call.target.is_empty() {
            continue;
        }
        let resolution = resolve::resolve_call_target(&state.resolver_ctx(), symbol, call);
        match resolution {
            Some(target) => {
                if target.ambiguous {
                    state.stats.ambiguous_resolves += 1;
                }
                if target.id != symbol.id {
                    state.add_edge_checked(
                        &symbol.id,
                        &target.id,
                        EdgeKind::Calls,
                        call.location.clone(),
                    );
                }
                state.stats.call_edges_resolved += 1;
            }
            None => {
                let (pkg, name) = split_qualified(&call.target);
                if let Some(placeholder) = state.get_or_create_placeholder(pkg, name) {
                    state.add_edge_checked(
                        &symbol.id,
                        &placeholder,
                        EdgeKind::Calls,
                        call.location.clone(),
                    );
                }
                state.stats.call_edges_unresolved += 1;
            }
        }
        callback_references(state, symbol, call);
    }

    let return_type = symbol
        .metadata
        .as_ref()
        .and_then(|m| m.return_type.as_deref());
    if let Some(return_type) = return_type {
        let name = normalize_type_expr(return_type);
        if !name.is_empty() {
            if let Some(target) = resolve_type_by_name(state, &name, &symbol.file_path) {
                state.add_edge_checked(
                    &symbol.id,
                    &target,
                    EdgeKind::Returns,
                    Location::new(&symbol.file_path, symbol.start_line),
                );
            }
        }
    }
}

/// Functions passed by bare identifier become References edges. No
/// placeholders for callbacks.
fn callback_references(state: &mut BuildState, symbol: &Arc<Symbol>, call: &CallSite) {
    for arg in &call.function_args {
        if !is_identifier(arg) {
            continue;
        }
        let target = {
            let candidates = match state.symbols_by_name.get(arg.as_str()) {
                Some(c) => c,
                None => continue,
            };
            let callables: Vec<&Arc<Symbol>> = candidates
                .iter()
                .filter(|s| matches!(s.kind, SymbolKind::Function | SymbolKind::Method))
                .collect();
            pick_nearest(&callables, &symbol.file_path).map(|s| s.id.clone())
        };
        if let Some(target) = target {
            state.add_edge_checked(
                &symbol.id,
                &target,
                EdgeKind::References,
                call.location.clone(),
            );
        }
    }
}

/// Method -> receiver type. Unresolvable receivers emit nothing.
fn extract_receiver_edge(state: &mut BuildState, symbol: &Arc<Symbol>) {
    if symbol.receiver.is_empty() {
        return;
    }
    let name = symbol.receiver.trim_start_matches('*');
    let Some(target) = resolve_type_by_name(state, name, &symbol.file_path) else {
        debug!(method = %symbol.id, receiver = %symbol.receiver, "receiver type not found");
        return;
    };
    state.add_edge_checked(
        &symbol.id,
        &target,
        EdgeKind::Receives,
        Location::new(&symbol.file_path, symbol.start_line),
    );
}

/// Struct/Class: `extends` embeds the first parent; `implements` entries
/// naming an interface become Implements edges, anything else a struct
/// names is an additional embed.
fn extract_type_edges(state: &mut BuildState, symbol: &Arc<Symbol>) {
    let Some(meta) = symbol.metadata.as_ref() else {
        return;
    };
    let location = Location::new(&symbol.file_path, symbol.start_line);

    if let Some(extends) = meta.extends.as_deref().filter(|e| !e.is_empty()) {
        let name = extends.trim_start_matches('*');
        if let Some(target) = resolve_type_by_name(state, name, &symbol.file_path) {
            state.add_edge_checked(&symbol.id, &target, EdgeKind::Embeds, location.clone());
        }
    }

    for name in &meta.implements {
        let Some(target_id) = resolve_implements_target(state, name, &symbol.file_path) else {
            continue;
        };
        let target_kind = state.graph.node(&target_id).map(|n| n.kind());
        if target_kind == Some(SymbolKind::Interface) {
            state.add_edge_checked(&symbol.id, &target_id, EdgeKind::Implements, location.clone());
        } else if symbol.kind == SymbolKind::Struct {
            state.add_edge_checked(&symbol.id, &target_id, EdgeKind::Embeds, location.clone());
        }
    }
}

/// Interface composition: both `extends` and `implements` entries embed.
fn extract_interface_composition(state: &mut BuildState, symbol: &Arc<Symbol>) {
    let Some(meta) = symbol.metadata.as_ref() else {
        return;
    };
    let location = Location::new(&symbol.file_path, symbol.start_line);
    let extends = meta.extends.iter().map(String::as_str);
    let implements = meta.implements.iter().map(String::as_str);
    for name in extends.chain(implements).filter(|n| !n.is_empty()) {
        let name = name.trim_start_matches('*');
        if let Some(target) = resolve_implements_target(state, name, &symbol.file_path) {
            state.add_edge_checked(&symbol.id, &target, EdgeKind::Embeds, location.clone());
        }
    }
}

/// Decorator-argument, type-argument and type-narrowing references.
fn extract_reference_edges(state: &mut BuildState, symbol: &Arc<Symbol>) {
    let Some(meta) = symbol.metadata.as_ref() else {
        return;
    };
    let location = Location::new(&symbol.file_path, symbol.start_line);

    for arg in &meta.decorator_args {
        if arg.is_empty() {
            continue;
        }
        if let Some(target) = resolve_any_by_name(state, arg, &symbol.file_path) {
            if state.add_edge_checked(&symbol.id, &target, EdgeKind::References, location.clone()) {
                state.stats.decorator_arg_edges_resolved += 1;
            }
        } else if arg.chars().next().is_some_and(char::is_uppercase) {
            // Likely a type name; a placeholder is worth it.
            if let Some(placeholder) = state.get_or_create_placeholder("", arg) {
                state.add_edge_checked(
                    &symbol.id,
                    &placeholder,
                    EdgeKind::References,
                    location.clone(),
                );
            }
        }
    }

    // Type arguments and narrowings never create placeholders.
    for name in meta.type_arguments.iter().chain(meta.type_narrowings.iter()) {
        let name = name.trim_start_matches('*');
        if name.is_empty() {
            continue;
        }
        if let Some(target) = resolve_type_by_name(state, name, &symbol.file_path) {
            state.add_edge_checked(&symbol.id, &target, EdgeKind::References, location.clone());
        }
    }
}

/// Kind-compatibility table consulted before every insertion.
pub(crate) fn edge_kind_allowed(kind: EdgeKind, from: SymbolKind, to: SymbolKind) -> bool {
    match kind {
        // Constructor calls make Class/Struct targets callable.
        EdgeKind::Calls => {
            from.is_callable()
                && (to.is_callable() || matches!(to, SymbolKind::Class | SymbolKind::Struct))
        }
        EdgeKind::Implements => to == SymbolKind::Interface,
        EdgeKind::Embeds => matches!(
            from,
            SymbolKind::Struct | SymbolKind::Class | SymbolKind::Interface
        ),
        _ => true,
    }
}

/// Normalize a type expression to a bare type name; empty for built-ins.
///
/// Strips pointer/slice/channel prefixes, takes the value type of maps, and
/// drops generic parameter lists.
pub(crate) fn normalize_type_expr(expr: &str) -> String {
    let mut t = expr.trim();
    loop {
        if let Some(rest) = t.strip_prefix('*') {
            t = rest.trim_start();
        } else if let Some(rest) = t.strip_prefix("[]") {
            t = rest.trim_start();
        } else if let Some(rest) = t.strip_prefix("<-chan") {
            t = rest.trim_start();
        } else if let Some(rest) = t.strip_prefix("chan<-") {
            t = rest.trim_start();
        } else if let Some(rest) = t.strip_prefix("chan ") {
            t = rest.trim_start();
        } else {
            break;
        }
    }
    if let Some(rest) = t.strip_prefix("map[") {
        // The value type follows the key's closing bracket.
        let mut depth = 1;
        for (i, c) in rest.char_indices() {
            match c {
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        return normalize_type_expr(&rest[i + 1..]);
                    }
                }
                _ => {}
            }
        }
        return String::new();
    }
    let t = match t.find('[') {
        Some(i) => t[..i].trim(),
        None => t,
    };
    if t.is_empty() || BUILTIN_TYPES.contains(&t) {
        String::new()
    } else {
        t.to_string()
    }
}

const BUILTIN_TYPES: &[&str] = &[
    "bool", "int", "int8", "int16", "int32", "int64", "uint", "uint8", "uint16", "uint32",
    "uint64", "uintptr", "float32", "float64", "string", "byte", "rune", "error", "any",
    "complex64", "complex128",
];

/// Nearest candidate: same file, then same directory, then the first one.
pub(crate) fn pick_nearest<'a>(
    candidates: &[&'a Arc<Symbol>],
    caller_file: &str,
) -> Option<&'a Arc<Symbol>> {
    if let Some(hit) = candidates.iter().find(|s| s.file_path == caller_file) {
        return Some(*hit);
    }
    let dir = parent_dir(caller_file);
    if let Some(hit) = candidates.iter().find(|s| parent_dir(&s.file_path) == dir) {
        return Some(*hit);
    }
    candidates.first().copied()
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

fn resolve_type_by_name(state: &BuildState, name: &str, caller_file: &str) -> Option<String> {
    let candidates = state.symbols_by_name.get(name)?;
    let typed: Vec<&Arc<Symbol>> = candidates.iter().filter(|s| s.kind.is_type_like()).collect();
    pick_nearest(&typed, caller_file).map(|s| s.id.clone())
}

fn resolve_any_by_name(state: &BuildState, name: &str, caller_file: &str) -> Option<String> {
    let candidates = state.symbols_by_name.get(name)?;
    let all: Vec<&Arc<Symbol>> = candidates.iter().collect();
    pick_nearest(&all, caller_file).map(|s| s.id.clone())
}

/// Interface candidates first, then any type-like symbol.
fn resolve_implements_target(state: &BuildState, name: &str, caller_file: &str) -> Option<String> {
    let name = name.trim_start_matches('*');
    let candidates = state.symbols_by_name.get(name)?;
    let interfaces: Vec<&Arc<Symbol>> = candidates
        .iter()
        .filter(|s| s.kind == SymbolKind::Interface)
        .collect();
    if let Some(hit) = pick_nearest(&interfaces, caller_file) {
        return Some(hit.id.clone());
    }
    let typed: Vec<&Arc<Symbol>> = candidates.iter().filter(|s| s.kind.is_type_like()).collect();
    pick_nearest(&typed, caller_file).map(|s| s.id.clone())
}

/// Split an unresolved qualified target into a placeholder key.
fn split_qualified(target: &str) -> (&str, &str) {
    match target.split_once('.') {
        Some((pkg, name)) => (pkg, name),
        None => ("", target),
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}
