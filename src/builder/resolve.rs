//! Call-target resolution: turning a textual call site into a node ID.
//!
//! Expressed as an ordered sequence of pure functions, each returning `None`
//! on failure and short-circuiting the chain:
//!
//! 1. bare identifiers (same-file, then same-package, then anywhere, with
//!    aliased imports consulted before tie-breaking),
//! 2. qualified identifiers (`pkg.fn`),
//! 3. method calls (`this`/`self` through the owning class and its
//!    inheritance chain; named receivers matched case-insensitively against
//!    method receiver types, retried across all files).
//!
//! A `None` all the way through means "give up": the caller creates a
//! placeholder and counts the call as unresolved.

use std::collections::HashMap;
use std::sync::Arc;

use crate::symbol::{CallSite, Symbol, SymbolKind};

use super::imports::import_path_matches_file;
use super::ImportedName;

/// Read-only view over the builder's lookup tables.
pub(crate) struct ResolverCtx<'a> {
    pub symbols_by_id: &'a HashMap<String, Arc<Symbol>>,
    pub symbols_by_name: &'a HashMap<String, Vec<Arc<Symbol>>>,
    pub symbol_parent: &'a HashMap<String, String>,
    pub class_extends: &'a HashMap<String, String>,
    pub import_name_map: &'a HashMap<String, HashMap<String, ImportedName>>,
}

/// A successful resolution. `ambiguous` is set when more than one candidate
/// survived and a tie-break picked the winner.
pub(crate) struct ResolvedTarget {
    pub id: String,
    pub ambiguous: bool,
}

/// Inheritance chains longer than this are treated as cyclic.
const INHERITANCE_DEPTH_LIMIT: usize = 10;

pub(crate) fn resolve_call_target(
    ctx: &ResolverCtx<'_>,
    caller: &Symbol,
    call: &CallSite,
) -> Option<ResolvedTarget> {
    if call.is_method && !call.receiver.is_empty() {
        return resolve_method_call(ctx, caller, call);
    }
    if !call.is_method {
        if call.target.contains('.') {
            return resolve_qualified_call(ctx, caller, call);
        }
        return resolve_bare_call(ctx, caller, call);
    }
    None
}

/// `Target` has no dot and is not a method call.
fn resolve_bare_call(
    ctx: &ResolverCtx<'_>,
    caller: &Symbol,
    call: &CallSite,
) -> Option<ResolvedTarget> {
    let target = call.target.as_str();

    // Candidates never include the caller itself: a class method and a
    // module-level function sharing a name must not self-resolve.
    let mut candidates: Vec<&Arc<Symbol>> = preferred_candidates(ctx, target, &caller.file_path)
        .into_iter()
        .filter(|s| s.id != caller.id)
        .collect();
    if candidates.is_empty() {
        // The preferred tier may have held only the caller; retry everywhere.
        candidates = all_candidates(ctx, target)
            .iter()
            .filter(|s| s.id != caller.id)
            .collect();
    }

    // Aliased imports win over plain name hits, and also cover the case
    // where the local alias matches no symbol at all.
    if let Some(id) = resolve_via_import_map(ctx, &caller.file_path, target) {
        return Some(ResolvedTarget {
            id,
            ambiguous: false,
        });
    }

    if candidates.is_empty() {
        return None;
    }
    let ambiguous = candidates.len() > 1;
    if let Some(hit) = candidates
        .iter()
        .find(|s| matches!(s.kind, SymbolKind::Function | SymbolKind::Method))
    {
        return Some(ResolvedTarget {
            id: hit.id.clone(),
            ambiguous,
        });
    }
    Some(ResolvedTarget {
        id: candidates[0].id.clone(),
        ambiguous,
    })
}

/// `Target` contains a dot and is not a method call: resolve the member name.
fn resolve_qualified_call(
    ctx: &ResolverCtx<'_>,
    caller: &Symbol,
    call: &CallSite,
) -> Option<ResolvedTarget> {
    let (_, member) = call.target.split_once('.')?;
    let candidates = preferred_candidates(ctx, member, &caller.file_path);
    let first = candidates.first()?;
    Some(ResolvedTarget {
        id: first.id.clone(),
        ambiguous: candidates.len() > 1,
    })
}

/// Method call with a receiver.
fn resolve_method_call(
    ctx: &ResolverCtx<'_>,
    caller: &Symbol,
    call: &CallSite,
) -> Option<ResolvedTarget> {
    let candidates = preferred_candidates(ctx, &call.target, &caller.file_path);

    if call.receiver == "this" || call.receiver == "self" {
        if let Some(id) = resolve_through_owning_class(ctx, caller, &candidates) {
            return Some(ResolvedTarget {
                id,
                ambiguous: false,
            });
        }
    } else if let Some(id) = resolve_by_receiver_name(ctx, call, &candidates) {
        return Some(ResolvedTarget {
            id,
            ambiguous: false,
        });
    }

    // Fallback: any method or property among the name matches.
    let fallback = candidates
        .iter()
        .find(|s| matches!(s.kind, SymbolKind::Method | SymbolKind::Property))?;
    Some(ResolvedTarget {
        id: fallback.id.clone(),
        ambiguous: candidates.len() > 1,
    })
}

/// `this.foo()` / `self.foo()`: find the caller's owning class, then walk
/// its inheritance chain looking for a candidate attached to each class.
fn resolve_through_owning_class(
    ctx: &ResolverCtx<'_>,
    caller: &Symbol,
    candidates: &[&Arc<Symbol>],
) -> Option<String> {
    let class_name = owning_class_name(ctx, caller)?;

    let mut chain: Vec<String> = vec![class_name];
    while chain.len() < INHERITANCE_DEPTH_LIMIT {
        let Some(parent) = ctx.class_extends.get(chain.last()?.as_str()) else {
            break;
        };
        if chain.iter().any(|c| c == parent) {
            break;
        }
        chain.push(parent.clone());
    }

    for class in &chain {
        for candidate in candidates {
            if !matches!(
                candidate.kind,
                SymbolKind::Method | SymbolKind::Function | SymbolKind::Property
            ) {
                continue;
            }
            if strip_pointer(&candidate.receiver) == class.as_str() {
                return Some(candidate.id.clone());
            }
            let parent_matches = ctx
                .symbol_parent
                .get(&candidate.id)
                .and_then(|pid| ctx.symbols_by_id.get(pid))
                .is_some_and(|parent| parent.name == *class);
            if parent_matches {
                return Some(candidate.id.clone());
            }
        }
    }
    None
}

/// The class a symbol belongs to: its own receiver when set, else the first
/// Class/Struct ancestor in the parent map.
fn owning_class_name(ctx: &ResolverCtx<'_>, caller: &Symbol) -> Option<String> {
    if !caller.receiver.is_empty() {
        return Some(strip_pointer(&caller.receiver).to_string());
    }
    let mut current = caller.id.as_str();
    for _ in 0..INHERITANCE_DEPTH_LIMIT {
        let parent_id = ctx.symbol_parent.get(current)?;
        let parent = ctx.symbols_by_id.get(parent_id)?;
        if matches!(parent.kind, SymbolKind::Class | SymbolKind::Struct) {
            return Some(parent.name.clone());
        }
        current = parent_id;
    }
    None
}

/// Named receiver: match the receiver variable against method receiver types
/// case-insensitively (`txn` resolves to methods on `Txn`). Same-file
/// preference can mask a cross-file method, so a miss retries everywhere.
fn resolve_by_receiver_name(
    ctx: &ResolverCtx<'_>,
    call: &CallSite,
    candidates: &[&Arc<Symbol>],
) -> Option<String> {
    let matches_receiver = |s: &Symbol| {
        s.kind == SymbolKind::Method
            && strip_pointer(&s.receiver).eq_ignore_ascii_case(&call.receiver)
    };
    if let Some(hit) = candidates.iter().find(|s| matches_receiver(s.as_ref())) {
        return Some(hit.id.clone());
    }
    ctx.symbols_by_name
        .get(&call.target)?
        .iter()
        .find(|s| matches_receiver(s.as_ref()))
        .map(|s| s.id.clone())
}

/// Aliased-import resolution: `pd_concat` -> (`pandas.core.reshape.concat`,
/// `concat`) -> the `concat` defined in the matching module file.
fn resolve_via_import_map(
    ctx: &ResolverCtx<'_>,
    caller_file: &str,
    local_name: &str,
) -> Option<String> {
    let entry = ctx.import_name_map.get(caller_file)?.get(local_name)?;
    ctx.symbols_by_name
        .get(&entry.original_name)?
        .iter()
        .find(|s| import_path_matches_file(&entry.module_path, &s.file_path))
        .map(|s| s.id.clone())
}

/// The first non-empty tier of name matches: same file, then same package
/// (directory), then everything else.
fn preferred_candidates<'a>(
    ctx: &ResolverCtx<'a>,
    name: &str,
    caller_file: &str,
) -> Vec<&'a Arc<Symbol>> {
    let Some(all) = ctx.symbols_by_name.get(name) else {
        return Vec::new();
    };
    let caller_dir = parent_dir(caller_file);
    let mut same_file = Vec::new();
    let mut same_package = Vec::new();
    let mut other = Vec::new();
    for symbol in all {
        if symbol.file_path == caller_file {
            same_file.push(symbol);
        } else if parent_dir(&symbol.file_path) == caller_dir {
            same_package.push(symbol);
        } else {
            other.push(symbol);
        }
    }
    if !same_file.is_empty() {
        same_file
    } else if !same_package.is_empty() {
        same_package
    } else {
        other
    }
}

fn all_candidates<'a>(ctx: &ResolverCtx<'a>, name: &str) -> &'a [Arc<Symbol>] {
    ctx.symbols_by_name
        .get(name)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

fn strip_pointer(receiver: &str) -> &str {
    receiver.trim_start_matches('*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::Location;

    struct Tables {
        by_id: HashMap<String, Arc<Symbol>>,
        by_name: HashMap<String, Vec<Arc<Symbol>>>,
        parents: HashMap<String, String>,
        extends: HashMap<String, String>,
        import_names: HashMap<String, HashMap<String, ImportedName>>,
    }

    impl Tables {
        fn new(symbols: Vec<Symbol>) -> Self {
            let mut by_id = HashMap::new();
            let mut by_name: HashMap<String, Vec<Arc<Symbol>>> = HashMap::new();
            for sym in symbols {
                let arc = Arc::new(sym);
                by_id.insert(arc.id.clone(), arc.clone());
                by_name.entry(arc.name.clone()).or_default().push(arc);
            }
            Tables {
                by_id,
                by_name,
                parents: HashMap::new(),
                extends: HashMap::new(),
                import_names: HashMap::new(),
            }
        }

        fn ctx(&self) -> ResolverCtx<'_> {
            ResolverCtx {
                symbols_by_id: &self.by_id,
                symbols_by_name: &self.by_name,
                symbol_parent: &self.parents,
                class_extends: &self.extends,
                import_name_map: &self.import_names,
            }
        }
    }

    fn call(target: &str) -> CallSite {
        CallSite::new(target, Location::new("caller.go", 1))
    }

    #[test]
    fn test_bare_call_prefers_same_file() {
        let tables = Tables::new(vec![
            Symbol::new("a.go:1:run", "run", SymbolKind::Function, "a.go", "go"),
            Symbol::new("b.go:1:run", "run", SymbolKind::Function, "b.go", "go"),
        ]);
        let caller = Symbol::new("a.go:9:main", "main", SymbolKind::Function, "a.go", "go");
        let hit = resolve_call_target(&tables.ctx(), &caller, &call("run")).unwrap();
        assert_eq!(hit.id, "a.go:1:run");
        assert!(!hit.ambiguous);
    }

    #[test]
    fn test_bare_call_filters_caller_and_retries_everywhere() {
        // A method named `merge` calling bare `merge()` must resolve to the
        // module-level function elsewhere, never to itself.
        let tables = Tables::new(vec![
            Symbol::new(
                "frame.py:10:merge",
                "merge",
                SymbolKind::Method,
                "frame.py",
                "python",
            ),
            Symbol::new(
                "core/merge.py:1:merge",
                "merge",
                SymbolKind::Function,
                "core/merge.py",
                "python",
            ),
        ]);
        let caller = tables.by_id["frame.py:10:merge"].as_ref().clone();
        let hit = resolve_call_target(&tables.ctx(), &caller, &call("merge")).unwrap();
        assert_eq!(hit.id, "core/merge.py:1:merge");
    }

    #[test]
    fn test_bare_call_prefers_functions_over_variables() {
        let tables = Tables::new(vec![
            Symbol::new("b.go:1:run", "run", SymbolKind::Variable, "b.go", "go"),
            Symbol::new("c.go:1:run", "run", SymbolKind::Function, "c.go", "go"),
        ]);
        let caller = Symbol::new("a.go:9:main", "main", SymbolKind::Function, "a.go", "go");
        let hit = resolve_call_target(&tables.ctx(), &caller, &call("run")).unwrap();
        assert_eq!(hit.id, "c.go:1:run");
        assert!(hit.ambiguous);
    }

    #[test]
    fn test_aliased_import_resolution() {
        let mut tables = Tables::new(vec![Symbol::new(
            "pandas/core/reshape/concat.py:5:concat",
            "concat",
            SymbolKind::Function,
            "pandas/core/reshape/concat.py",
            "python",
        )]);
        tables.import_names.insert(
            "user.py".into(),
            HashMap::from([(
                "pd_concat".to_string(),
                ImportedName {
                    module_path: "pandas.core.reshape.concat".into(),
                    original_name: "concat".into(),
                },
            )]),
        );
        let caller = Symbol::new("user.py:1:work", "work", SymbolKind::Function, "user.py", "python");
        let hit = resolve_call_target(&tables.ctx(), &caller, &call("pd_concat")).unwrap();
        assert_eq!(hit.id, "pandas/core/reshape/concat.py:5:concat");
    }

    #[test]
    fn test_qualified_call_resolves_member() {
        let tables = Tables::new(vec![Symbol::new(
            "fmt.go:1:Println",
            "Println",
            SymbolKind::Function,
            "fmt.go",
            "go",
        )]);
        let caller = Symbol::new("a.go:9:main", "main", SymbolKind::Function, "a.go", "go");
        let hit = resolve_call_target(&tables.ctx(), &caller, &call("fmt.Println")).unwrap();
        assert_eq!(hit.id, "fmt.go:1:Println");
    }

    #[test]
    fn test_method_call_matches_receiver_case_insensitively() {
        let tables = Tables::new(vec![
            Symbol::new("app.js:3:handle", "handle", SymbolKind::Method, "app.js", "javascript")
                .with_receiver("Application"),
            Symbol::new(
                "router/index.js:8:handle",
                "handle",
                SymbolKind::Method,
                "router/index.js",
                "javascript",
            )
            .with_receiver("Router"),
        ]);
        let caller = tables.by_id["app.js:3:handle"].as_ref().clone();
        let site = CallSite::method("handle", "router", Location::new("app.js", 4));
        let hit = resolve_call_target(&tables.ctx(), &caller, &site).unwrap();
        // The same-file candidate has the wrong receiver; the cross-file
        // retry finds Router.handle.
        assert_eq!(hit.id, "router/index.js:8:handle");
    }

    #[test]
    fn test_self_call_walks_inheritance_chain() {
        let mut tables = Tables::new(vec![
            Symbol::new("base.py:2:setup", "setup", SymbolKind::Method, "base.py", "python"),
            Symbol::new("base.py:1:Base", "Base", SymbolKind::Class, "base.py", "python"),
            Symbol::new("child.py:1:Child", "Child", SymbolKind::Class, "child.py", "python"),
            Symbol::new("child.py:3:run", "run", SymbolKind::Method, "child.py", "python"),
        ]);
        tables
            .parents
            .insert("base.py:2:setup".into(), "base.py:1:Base".into());
        tables
            .parents
            .insert("child.py:3:run".into(), "child.py:1:Child".into());
        tables.extends.insert("Child".into(), "Base".into());

        let caller = tables.by_id["child.py:3:run"].as_ref().clone();
        let site = CallSite::method("setup", "self", Location::new("child.py", 4));
        let hit = resolve_call_target(&tables.ctx(), &caller, &site).unwrap();
        assert_eq!(hit.id, "base.py:2:setup");
        assert!(!hit.ambiguous);
    }

    #[test]
    fn test_cyclic_extends_terminates() {
        let mut tables = Tables::new(vec![
            Symbol::new("a.py:1:A", "A", SymbolKind::Class, "a.py", "python"),
            Symbol::new("a.py:3:m", "m", SymbolKind::Method, "a.py", "python"),
        ]);
        tables.parents.insert("a.py:3:m".into(), "a.py:1:A".into());
        tables.extends.insert("A".into(), "B".into());
        tables.extends.insert("B".into(), "A".into());
        let caller = tables.by_id["a.py:3:m"].as_ref().clone();
        let site = CallSite::method("missing", "self", Location::new("a.py", 4));
        assert!(resolve_call_target(&tables.ctx(), &caller, &site).is_none());
    }

    #[test]
    fn test_method_fallback_picks_method_kind() {
        let tables = Tables::new(vec![
            Symbol::new("a.go:1:close", "close", SymbolKind::Variable, "a.go", "go"),
            Symbol::new("b.go:1:close", "close", SymbolKind::Method, "b.go", "go"),
        ]);
        let caller = Symbol::new("c.go:9:main", "main", SymbolKind::Function, "c.go", "go");
        let site = CallSite::method("close", "conn", Location::new("c.go", 2));
        let hit = resolve_call_target(&tables.ctx(), &caller, &site).unwrap();
        assert_eq!(hit.id, "b.go:1:close");
    }

    #[test]
    fn test_unresolvable_returns_none() {
        let tables = Tables::new(vec![]);
        let caller = Symbol::new("a.go:9:main", "main", SymbolKind::Function, "a.go", "go");
        assert!(resolve_call_target(&tables.ctx(), &caller, &call("nothing")).is_none());
    }
}
