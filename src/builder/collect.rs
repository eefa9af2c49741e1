//! Phase 1: validate parse results, insert symbol nodes, and build the
//! side tables (parent map, extends map, per-file imports, import name map)
//! the later phases resolve against.

use std::sync::Arc;

use tracing::debug;

use crate::symbol::{ParseResult, Symbol};

use super::{BuildState, CollectedFile, FileError, ImportedName};

/// Collect a single file. A failed validation records a per-file error and
/// skips the file entirely; it never aborts the build.
pub(crate) fn collect_file(state: &mut BuildState, result: &ParseResult) {
    if let Err(message) = result.validate() {
        state.file_errors.push(FileError {
            file_path: result.file_path.clone(),
            message,
        });
        state.stats.files_failed += 1;
        return;
    }

    state
        .file_imports
        .insert(result.file_path.clone(), result.imports.clone());

    let mut top_level = Vec::new();
    for symbol in result.symbols.iter().flatten() {
        if let Some(arc) = insert_symbol_tree(state, symbol, None) {
            top_level.push(arc);
        }
    }

    state.files.push(CollectedFile {
        file_path: result.file_path.clone(),
        language: result.language.clone(),
        symbols: top_level,
    });
    state.stats.files_processed += 1;
}

/// Insert one symbol and, recursively, its children. Records parent links
/// and extends entries as it goes. Returns the shared symbol on success.
fn insert_symbol_tree(
    state: &mut BuildState,
    symbol: &Symbol,
    parent: Option<&Symbol>,
) -> Option<Arc<Symbol>> {
    let arc = Arc::new(symbol.clone());
    let mut inserted = true;

    match state.graph.add_node(arc.clone()) {
        Ok(()) => {
            state.stats.nodes_created += 1;
            state.symbols_by_id.insert(symbol.id.clone(), arc.clone());
            state
                .symbols_by_name
                .entry(symbol.name.clone())
                .or_default()
                .push(arc.clone());
        }
        Err(err) => {
            state.file_errors.push(FileError {
                file_path: symbol.file_path.clone(),
                message: format!("node {}: {err}", symbol.id),
            });
            if err.is_capacity() {
                // No rollback: the build keeps whatever fit.
                state.incomplete = true;
                return None;
            }
            inserted = false;
        }
    }

    if let Some(parent) = parent {
        state
            .symbol_parent
            .insert(symbol.id.clone(), parent.id.clone());
    }
    if let Some(extends) = symbol
        .metadata
        .as_ref()
        .and_then(|m| m.extends.as_deref())
        .filter(|e| !e.is_empty())
    {
        state
            .class_extends
            .insert(symbol.name.clone(), extends.to_string());
    }

    for child in &symbol.children {
        insert_symbol_tree(state, child, Some(symbol));
    }

    inserted.then_some(arc)
}

/// After phase 1 completes cleanly, index every named import so the resolver
/// can chase `alias -> (module, original)` without re-parsing import lists.
pub(crate) fn build_import_name_map(state: &mut BuildState) {
    for (file, imports) in &state.file_imports {
        for import in imports {
            if import.is_wildcard || import.names.is_empty() {
                continue;
            }
            for raw in &import.names {
                let (original, local) = split_import_alias(raw);
                if local.is_empty() {
                    debug!(file = %file, name = %raw, "import name parsed to nothing, skipping");
                    continue;
                }
                state
                    .import_name_map
                    .entry(file.clone())
                    .or_default()
                    .insert(
                        local.to_string(),
                        ImportedName {
                            module_path: import.path.clone(),
                            original_name: original.to_string(),
                        },
                    );
            }
        }
    }
}

/// Split an `"orig as alias"` import name. Either side may be missing, in
/// which case the other stands in for both.
pub(crate) fn split_import_alias(raw: &str) -> (&str, &str) {
    match raw.split_once(" as ") {
        Some((orig, alias)) => {
            let orig = orig.trim();
            let alias = alias.trim();
            match (orig.is_empty(), alias.is_empty()) {
                (true, _) => (alias, alias),
                (_, true) => (orig, orig),
                _ => (orig, alias),
            }
        }
        None => {
            let name = raw.trim();
            (name, name)
        }
    }
}
