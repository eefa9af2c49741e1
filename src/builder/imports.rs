//! Import-edge extraction: one `Imports` edge per import statement, plus the
//! two reference passes that ride on import entries — Python named-import
//! references and JavaScript/TypeScript dynamic-import references.

use tracing::debug;

use crate::graph::edge::EdgeKind;
use crate::language::LanguageKind;
use crate::symbol::{Import, SymbolKind};

use super::{collect::split_import_alias, BuildState, CancelToken};

/// Extract all import-derived edges for one collected file. Returns false
/// when the cancel token fired mid-loop (polled every 10 imports).
pub(crate) fn extract_import_edges(
    state: &mut BuildState,
    index: usize,
    cancel: &CancelToken,
) -> bool {
    let file = &state.files[index];
    let file_path = file.file_path.clone();
    let language = file.language.clone();

    // The source of every import edge is the file's package symbol: the
    // first Package-kind symbol, or the first symbol at all.
    let Some(source_id) = source_symbol_id(state, index) else {
        return true;
    };
    if !state.graph.contains_node(&source_id) {
        debug!(file = %file_path, source = %source_id, "import source symbol not in graph, skipping file");
        return true;
    }

    let imports = state
        .file_imports
        .get(&file_path)
        .cloned()
        .unwrap_or_default();

    for (i, import) in imports.iter().enumerate() {
        if i % 10 == 0 && cancel.is_cancelled() {
            state.incomplete = true;
            return false;
        }
        let Some(placeholder) = state.get_or_create_placeholder(&import.path, &import.path) else {
            continue;
        };
        state.add_edge_checked(
            &source_id,
            &placeholder,
            EdgeKind::Imports,
            import.location.clone(),
        );
    }

    match LanguageKind::detect(&language, &file_path) {
        Some(LanguageKind::Python) => {
            named_import_references(state, &source_id, &imports);
        }
        Some(kind) if kind.is_ecmascript() => {
            dynamic_import_references(state, &source_id, &file_path, &imports);
        }
        _ => {}
    }
    true
}

/// First Package-kind symbol, else the first symbol, else nothing.
fn source_symbol_id(state: &BuildState, index: usize) -> Option<String> {
    let symbols = &state.files[index].symbols;
    symbols
        .iter()
        .find(|s| s.kind == SymbolKind::Package)
        .or_else(|| symbols.first())
        .map(|s| s.id.clone())
}

/// Python: link the importing file's package symbol to each symbol a named
/// import actually brings in. The edge keeps the import statement's location
/// so two files importing the same symbol stay distinct downstream.
fn named_import_references(state: &mut BuildState, source_id: &str, imports: &[Import]) {
    for import in imports {
        if import.is_wildcard || import.is_dynamic || import.names.is_empty() {
            continue;
        }
        for raw in &import.names {
            let (original, _) = split_import_alias(raw);
            if original.is_empty() {
                continue;
            }
            let targets: Vec<String> = match state.symbols_by_name.get(original) {
                Some(candidates) => candidates
                    .iter()
                    .filter(|s| import_path_matches_file(&import.path, &s.file_path))
                    .map(|s| s.id.clone())
                    .collect(),
                None => continue,
            };
            for target in targets {
                if state.add_edge_checked(
                    source_id,
                    &target,
                    EdgeKind::References,
                    import.location.clone(),
                ) {
                    state.stats.named_import_edges_resolved += 1;
                }
            }
        }
    }
}

/// JavaScript/TypeScript: `import('./module')` against a relative path
/// resolves to a project file; each exported class in that file gets a
/// References edge. External dynamic imports are ignored.
fn dynamic_import_references(
    state: &mut BuildState,
    source_id: &str,
    file_path: &str,
    imports: &[Import],
) {
    for import in imports {
        if !import.is_dynamic {
            continue;
        }
        if !import.path.starts_with("./") && !import.path.starts_with("../") {
            continue;
        }
        let normalized = resolve_relative(file_path, &import.path);
        let Some(target_file) = find_project_file(state, &normalized) else {
            debug!(from = %file_path, path = %import.path, "dynamic import did not resolve to a project file");
            continue;
        };
        let classes: Vec<String> = state
            .graph
            .nodes_in_file(&target_file)
            .iter()
            .filter(|n| n.kind() == SymbolKind::Class && n.symbol.exported)
            .map(|n| n.id.clone())
            .collect();
        for class_id in classes {
            if state.add_edge_checked(
                source_id,
                &class_id,
                EdgeKind::References,
                import.location.clone(),
            ) {
                state.stats.dynamic_import_edges_resolved += 1;
            }
        }
    }
}

/// Resolve a `./`-style specifier against the importing file's directory.
fn resolve_relative(base_file: &str, relative: &str) -> String {
    let mut parts: Vec<&str> = match base_file.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// A dynamic import rarely spells out the extension; try the bare path, the
/// ECMAScript extensions, then index files.
fn find_project_file(state: &BuildState, normalized: &str) -> Option<String> {
    if state.graph.nodes_in_file(normalized).is_empty() {
        let mut candidates = Vec::new();
        for ext in ["js", "jsx", "ts", "tsx", "mjs", "cjs"] {
            candidates.push(format!("{normalized}.{ext}"));
        }
        for ext in ["js", "ts"] {
            candidates.push(format!("{normalized}/index.{ext}"));
        }
        candidates
            .into_iter()
            .find(|c| !state.graph.nodes_in_file(c).is_empty())
    } else {
        Some(normalized.to_string())
    }
}

/// Match an import module path against a project file path.
///
/// `"flask.globals"` (or relative `".globals"`) matches `"flask/globals.py"`
/// and `"flask/globals/__init__.py"`: strip `.py` and a trailing
/// `/__init__`, then compare against the dots-to-slashes form, either
/// exactly or as a path suffix.
pub(crate) fn import_path_matches_file(import_path: &str, file_path: &str) -> bool {
    let mut stripped = file_path.strip_suffix(".py").unwrap_or(file_path);
    if let Some(s) = stripped.strip_suffix("/__init__") {
        stripped = s;
    }
    let dotted = import_path.trim_start_matches('.');
    if dotted.is_empty() {
        return false;
    }
    let slashed = dotted.replace('.', "/");
    stripped == slashed || stripped.ends_with(&format!("/{slashed}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_path_matches_file() {
        assert!(import_path_matches_file(".globals", "flask/globals.py"));
        assert!(import_path_matches_file("flask.globals", "flask/globals.py"));
        assert!(import_path_matches_file(
            "pandas.core.reshape.concat",
            "pandas/core/reshape/concat.py"
        ));
        assert!(import_path_matches_file(".globals", "src/flask/globals.py"));
        assert!(import_path_matches_file(".sansio", "flask/sansio/__init__.py"));
        assert!(!import_path_matches_file(".globals", "flask/app.py"));
        assert!(!import_path_matches_file("..", "flask/app.py"));
    }

    #[test]
    fn test_resolve_relative() {
        assert_eq!(resolve_relative("src/app.js", "./router"), "src/router");
        assert_eq!(resolve_relative("src/app.js", "../lib/util"), "lib/util");
        assert_eq!(resolve_relative("app.js", "./pages/home"), "pages/home");
        assert_eq!(
            resolve_relative("a/b/c.ts", ".././d"),
            "a/d"
        );
    }
}
