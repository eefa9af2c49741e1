//! Integration test suite — drives the full pipeline through the public
//! API with hand-built parse results, the way the upstream parsers would
//! feed it. Covers cross-file call resolution, aliased and named imports,
//! interface composition and promoted methods, file classification, and the
//! serialization/snapshot round-trips with their determinism guarantees.

use std::collections::HashSet;

use trace_graph::snapshot::serialize::{from_serializable, to_serializable};
use trace_graph::{
    classify_files, BuildResult, CallSite, CancelToken, ClassifierConfig, CodeGraph, EdgeKind,
    GraphBuilder, Import, Location, MethodSignature, ParseResult, Symbol, SymbolKind,
    SymbolMetadata,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn build(results: &[ParseResult]) -> BuildResult {
    let result = GraphBuilder::default().build(&CancelToken::new(), results);
    assert!(result.file_errors.is_empty(), "unexpected file errors: {:?}", result.file_errors);
    result
}

fn has_edge(graph: &CodeGraph, from: &str, to: &str, kind: EdgeKind) -> bool {
    graph
        .outgoing(from)
        .iter()
        .any(|e| e.to_id == to && e.kind == kind)
}

fn methods(names: &[&str]) -> Vec<MethodSignature> {
    names
        .iter()
        .map(|name| MethodSignature {
            name: name.to_string(),
            ..Default::default()
        })
        .collect()
}

fn package(file: &str, language: &str) -> Symbol {
    let name = file.rsplit('/').next().unwrap_or(file);
    Symbol::new(format!("{file}:0:{name}"), name, SymbolKind::Package, file, language)
}

// ---------------------------------------------------------------------------
// Call resolution across files
// ---------------------------------------------------------------------------

/// A method call on a named receiver resolves to the method on the matching
/// receiver type even when it lives in another file.
#[test]
fn test_cross_file_method_call_through_receiver() {
    let application = ParseResult::new("lib/application.js", "javascript").with_symbol(
        Symbol::new(
            "lib/application.js:5:Application",
            "Application",
            SymbolKind::Class,
            "lib/application.js",
            "javascript",
        )
        .with_child(
            Symbol::new(
                "lib/application.js:12:handle",
                "handle",
                SymbolKind::Method,
                "lib/application.js",
                "javascript",
            )
            .with_receiver("Application")
            .with_call(CallSite::method(
                "handle",
                "router",
                Location::new("lib/application.js", 14),
            )),
        ),
    );
    let router = ParseResult::new("lib/router/index.js", "javascript").with_symbol(
        Symbol::new(
            "lib/router/index.js:3:Router",
            "Router",
            SymbolKind::Class,
            "lib/router/index.js",
            "javascript",
        )
        .with_child(
            Symbol::new(
                "lib/router/index.js:10:handle",
                "handle",
                SymbolKind::Method,
                "lib/router/index.js",
                "javascript",
            )
            .with_receiver("Router"),
        ),
    );

    let result = build(&[application, router]);
    assert!(has_edge(
        &result.graph,
        "lib/application.js:12:handle",
        "lib/router/index.js:10:handle",
        EdgeKind::Calls,
    ));
    assert_eq!(result.stats.call_edges_unresolved, 0);
}

/// A bare call from a method sharing the callee's name must resolve to the
/// module-level function, never to the calling method itself.
#[test]
fn test_bare_call_never_resolves_to_caller() {
    let frame = ParseResult::new("pandas/core/frame.py", "python")
        .with_symbol(package("pandas/core/frame.py", "python"))
        .with_symbol(
            Symbol::new(
                "pandas/core/frame.py:100:DataFrame",
                "DataFrame",
                SymbolKind::Class,
                "pandas/core/frame.py",
                "python",
            )
            .with_child(
                Symbol::new(
                    "pandas/core/frame.py:200:merge",
                    "merge",
                    SymbolKind::Method,
                    "pandas/core/frame.py",
                    "python",
                )
                .with_call(CallSite::new(
                    "merge",
                    Location::new("pandas/core/frame.py", 210),
                )),
            ),
        )
        .with_import(
            Import::new(
                "pandas.core.reshape.merge",
                Location::new("pandas/core/frame.py", 10),
            )
            .with_names(vec!["merge".into()]),
        );
    let reshape = ParseResult::new("pandas/core/reshape/merge.py", "python")
        .with_symbol(package("pandas/core/reshape/merge.py", "python"))
        .with_symbol(Symbol::new(
            "pandas/core/reshape/merge.py:50:merge",
            "merge",
            SymbolKind::Function,
            "pandas/core/reshape/merge.py",
            "python",
        ));

    let result = build(&[frame, reshape]);
    assert!(has_edge(
        &result.graph,
        "pandas/core/frame.py:200:merge",
        "pandas/core/reshape/merge.py:50:merge",
        EdgeKind::Calls,
    ));
    assert!(!has_edge(
        &result.graph,
        "pandas/core/frame.py:200:merge",
        "pandas/core/frame.py:200:merge",
        EdgeKind::Calls,
    ));
}

/// `import { concat as pd_concat }` followed by `pd_concat(...)` resolves
/// through the import name map to the original function.
#[test]
fn test_aliased_import_call_resolution() {
    let user = ParseResult::new("app.py", "python")
        .with_symbol(package("app.py", "python"))
        .with_symbol(
            Symbol::new("app.py:20:run", "run", SymbolKind::Function, "app.py", "python")
                .with_call(CallSite::new("pd_concat", Location::new("app.py", 22))),
        )
        .with_import(
            Import::new("pandas.core.reshape.concat", Location::new("app.py", 3))
                .with_names(vec!["concat as pd_concat".into()]),
        );
    let concat = ParseResult::new("pandas/core/reshape/concat.py", "python")
        .with_symbol(package("pandas/core/reshape/concat.py", "python"))
        .with_symbol(Symbol::new(
            "pandas/core/reshape/concat.py:80:concat",
            "concat",
            SymbolKind::Function,
            "pandas/core/reshape/concat.py",
            "python",
        ));

    let result = build(&[user, concat]);
    assert!(has_edge(
        &result.graph,
        "app.py:20:run",
        "pandas/core/reshape/concat.py:80:concat",
        EdgeKind::Calls,
    ));
    assert_eq!(result.stats.call_edges_unresolved, 0);
}

/// An unresolvable call falls back to a placeholder node and is counted.
#[test]
fn test_unresolved_call_creates_placeholder() {
    let app = ParseResult::new("a.go", "go").with_symbol(
        Symbol::new("a.go:1:main", "main", SymbolKind::Function, "a.go", "go")
            .with_call(CallSite::new("fmt.Println", Location::new("a.go", 3))),
    );
    let result = build(&[app]);
    assert_eq!(result.stats.call_edges_unresolved, 1);
    assert_eq!(result.stats.placeholder_nodes, 1);
    assert!(has_edge(
        &result.graph,
        "a.go:1:main",
        "external:fmt:Println",
        EdgeKind::Calls,
    ));
}

// ---------------------------------------------------------------------------
// Import-derived references
// ---------------------------------------------------------------------------

/// A Python named import produces a References edge from the importing
/// file's package symbol, carrying the import statement's own location.
#[test]
fn test_python_named_import_reference_keeps_location() {
    let globals = ParseResult::new("flask/globals.py", "python")
        .with_symbol(package("flask/globals.py", "python"))
        .with_symbol(Symbol::new(
            "flask/globals.py:30:request",
            "request",
            SymbolKind::Variable,
            "flask/globals.py",
            "python",
        ));
    let app = ParseResult::new("flask/app.py", "python")
        .with_symbol(package("flask/app.py", "python"))
        .with_import(
            Import::new(".globals", Location::new("flask/app.py", 19))
                .with_names(vec!["request".into()])
                .relative(),
        );

    let result = build(&[globals, app]);
    let edge = result
        .graph
        .outgoing("flask/app.py:0:app.py")
        .iter()
        .find(|e| e.to_id == "flask/globals.py:30:request" && e.kind == EdgeKind::References)
        .cloned()
        .expect("named import reference edge missing");
    assert_eq!(edge.location.file, "flask/app.py");
    assert_eq!(edge.location.line, 19, "edge must keep the import's line");
    assert_eq!(result.stats.named_import_edges_resolved, 1);
}

/// A relative dynamic import references the exported classes of the target
/// file; external dynamic imports are ignored.
#[test]
fn test_dynamic_import_references_exported_classes() {
    let app = ParseResult::new("src/app.ts", "typescript")
        .with_symbol(package("src/app.ts", "typescript"))
        .with_import(
            Import::new("./admin", Location::new("src/app.ts", 40))
                .relative()
                .dynamic(),
        )
        .with_import(Import::new("lodash", Location::new("src/app.ts", 41)).dynamic());
    let admin = ParseResult::new("src/admin.ts", "typescript")
        .with_symbol(package("src/admin.ts", "typescript"))
        .with_symbol(
            Symbol::new(
                "src/admin.ts:5:AdminPanel",
                "AdminPanel",
                SymbolKind::Class,
                "src/admin.ts",
                "typescript",
            )
            .with_exported(true),
        );

    let result = build(&[app, admin]);
    assert!(has_edge(
        &result.graph,
        "src/app.ts:0:app.ts",
        "src/admin.ts:5:AdminPanel",
        EdgeKind::References,
    ));
    assert_eq!(result.stats.dynamic_import_edges_resolved, 1);
}

/// Every import gets an Imports edge to a module placeholder, deduplicated
/// per module path.
#[test]
fn test_import_edges_to_module_placeholders() {
    let app = ParseResult::new("a.go", "go")
        .with_symbol(package("a.go", "go"))
        .with_import(Import::new("net/http", Location::new("a.go", 3)))
        .with_import(Import::new("net/http", Location::new("a.go", 4)));
    let result = build(&[app]);
    assert!(has_edge(
        &result.graph,
        "a.go:0:a.go",
        "external:net/http:net/http",
        EdgeKind::Imports,
    ));
    assert_eq!(result.stats.placeholder_nodes, 1);
}

// ---------------------------------------------------------------------------
// Interface detection
// ---------------------------------------------------------------------------

fn reader_writer_fixture() -> Vec<ParseResult> {
    let interfaces = ParseResult::new("io/interfaces.go", "go")
        .with_symbol(
            Symbol::new(
                "io/interfaces.go:1:Reader",
                "Reader",
                SymbolKind::Interface,
                "io/interfaces.go",
                "go",
            )
            .with_metadata(SymbolMetadata {
                methods: methods(&["Read"]),
                ..Default::default()
            }),
        )
        .with_symbol(
            Symbol::new(
                "io/interfaces.go:5:Writer",
                "Writer",
                SymbolKind::Interface,
                "io/interfaces.go",
                "go",
            )
            .with_metadata(SymbolMetadata {
                methods: methods(&["Write"]),
                ..Default::default()
            }),
        )
        .with_symbol(
            Symbol::new(
                "io/interfaces.go:9:ReadWriter",
                "ReadWriter",
                SymbolKind::Interface,
                "io/interfaces.go",
                "go",
            )
            .with_metadata(SymbolMetadata {
                extends: Some("Reader".into()),
                implements: vec!["Writer".into()],
                ..Default::default()
            }),
        );
    let file = ParseResult::new("io/file.go", "go").with_symbol(
        Symbol::new(
            "io/file.go:10:File",
            "File",
            SymbolKind::Struct,
            "io/file.go",
            "go",
        )
        .with_metadata(SymbolMetadata {
            methods: methods(&["Read", "Write", "Close"]),
            ..Default::default()
        }),
    );
    vec![interfaces, file]
}

/// Interface composition: the composed interface's method set is the union
/// of its embeds, and a type satisfying that union implements all three.
#[test]
fn test_interface_composition_and_matching() {
    let result = build(&reader_writer_fixture());
    let graph = &result.graph;

    assert!(has_edge(graph, "io/interfaces.go:9:ReadWriter", "io/interfaces.go:1:Reader", EdgeKind::Embeds));
    assert!(has_edge(graph, "io/interfaces.go:9:ReadWriter", "io/interfaces.go:5:Writer", EdgeKind::Embeds));

    assert!(has_edge(graph, "io/file.go:10:File", "io/interfaces.go:1:Reader", EdgeKind::Implements));
    assert!(has_edge(graph, "io/file.go:10:File", "io/interfaces.go:5:Writer", EdgeKind::Implements));
    assert!(has_edge(graph, "io/file.go:10:File", "io/interfaces.go:9:ReadWriter", EdgeKind::Implements));
    assert_eq!(result.stats.interface_edges_detected, 3);
}

/// Promoted methods: a struct embedding another satisfies interfaces through
/// the embedded type's methods.
#[test]
fn test_promoted_methods_satisfy_interfaces() {
    let base = ParseResult::new("base.go", "go").with_symbol(
        Symbol::new("base.go:1:Base", "Base", SymbolKind::Struct, "base.go", "go")
            .with_metadata(SymbolMetadata {
                methods: methods(&["Init"]),
                ..Default::default()
            }),
    );
    let derived = ParseResult::new("derived.go", "go").with_symbol(
        Symbol::new(
            "derived.go:1:Derived",
            "Derived",
            SymbolKind::Struct,
            "derived.go",
            "go",
        )
        .with_metadata(SymbolMetadata {
            extends: Some("Base".into()),
            ..Default::default()
        }),
    );
    let initter = ParseResult::new("initter.go", "go").with_symbol(
        Symbol::new(
            "initter.go:1:Initter",
            "Initter",
            SymbolKind::Interface,
            "initter.go",
            "go",
        )
        .with_metadata(SymbolMetadata {
            methods: methods(&["Init"]),
            ..Default::default()
        }),
    );

    let result = build(&[base, derived, initter]);
    assert!(has_edge(&result.graph, "derived.go:1:Derived", "base.go:1:Base", EdgeKind::Embeds));
    assert!(has_edge(&result.graph, "derived.go:1:Derived", "initter.go:1:Initter", EdgeKind::Implements));
}

/// A Go method defined in a different file than its receiver type still
/// counts in that type's method set.
#[test]
fn test_cross_file_method_association_feeds_interfaces() {
    let types = ParseResult::new("store/types.go", "go").with_symbol(Symbol::new(
        "store/types.go:5:Txn",
        "Txn",
        SymbolKind::Struct,
        "store/types.go",
        "go",
    ).with_metadata(SymbolMetadata::default()));
    let txn_ops = ParseResult::new("store/txn.go", "go").with_symbol(
        Symbol::new("store/txn.go:10:Commit", "Commit", SymbolKind::Method, "store/txn.go", "go")
            .with_receiver("*Txn")
            .with_signature("func (t *Txn) Commit() error"),
    );
    let committer = ParseResult::new("store/iface.go", "go").with_symbol(
        Symbol::new(
            "store/iface.go:3:Committer",
            "Committer",
            SymbolKind::Interface,
            "store/iface.go",
            "go",
        )
        .with_metadata(SymbolMetadata {
            methods: methods(&["Commit"]),
            ..Default::default()
        }),
    );

    let result = build(&[types, txn_ops, committer]);
    assert!(has_edge(
        &result.graph,
        "store/types.go:5:Txn",
        "store/iface.go:3:Committer",
        EdgeKind::Implements,
    ));
}

/// Languages never cross: a Python class with the right method names does
/// not implement a Go interface.
#[test]
fn test_interface_matching_stays_within_language() {
    let go_iface = ParseResult::new("r.go", "go").with_symbol(
        Symbol::new("r.go:1:Runner", "Runner", SymbolKind::Interface, "r.go", "go")
            .with_metadata(SymbolMetadata {
                methods: methods(&["Run"]),
                ..Default::default()
            }),
    );
    let py_class = ParseResult::new("r.py", "python").with_symbol(
        Symbol::new("r.py:1:Runner", "Runner", SymbolKind::Class, "r.py", "python")
            .with_metadata(SymbolMetadata {
                methods: methods(&["Run"]),
                ..Default::default()
            }),
    );
    let result = build(&[go_iface, py_class]);
    assert!(!has_edge(&result.graph, "r.py:1:Runner", "r.go:1:Runner", EdgeKind::Implements));
}

// ---------------------------------------------------------------------------
// File classification
// ---------------------------------------------------------------------------

/// Test-infrastructure files with many test callers get demoted once their
/// callers are: the refinement loop sees their production traffic collapse.
#[test]
fn test_classification_demotes_test_infrastructure() {
    let mut results = Vec::new();

    // The helper everything calls.
    let mut builder_fn = Symbol::new(
        "itest/builder.go:1:NewBuilder",
        "NewBuilder",
        SymbolKind::Function,
        "itest/builder.go",
        "go",
    );
    builder_fn = builder_fn
        .with_call(CallSite::new("Alpha", Location::new("itest/builder.go", 5)))
        .with_call(CallSite::new("Beta", Location::new("itest/builder.go", 6)));
    results.push(ParseResult::new("itest/builder.go", "go").with_symbol(builder_fn));

    // Production callees that also call each other, so they keep production
    // traffic once the test wall falls away.
    for (name, peer) in [("Alpha", "Beta"), ("Beta", "Alpha")] {
        let file = format!("core/{}.go", name.to_lowercase());
        results.push(
            ParseResult::new(file.as_str(), "go").with_symbol(
                Symbol::new(
                    format!("{file}:1:{name}"),
                    name,
                    SymbolKind::Function,
                    file.as_str(),
                    "go",
                )
                .with_call(CallSite::new(peer, Location::new(file.as_str(), 2))),
            ),
        );
    }

    // A wall of test files calling the helper.
    for i in 0..24 {
        let file = format!("itest/case{i}_test.go");
        results.push(
            ParseResult::new(file.as_str(), "go").with_symbol(
                Symbol::new(
                    format!("{file}:1:TestCase{i}"),
                    format!("TestCase{i}"),
                    SymbolKind::Function,
                    file.as_str(),
                    "go",
                )
                .with_call(CallSite::new("NewBuilder", Location::new(file.as_str(), 3))),
            ),
        );
    }

    let result = build(&results);
    let classification = classify_files(&result.graph, &ClassifierConfig::default());

    assert_eq!(classification.is_production("itest/builder.go"), Some(false));
    assert_eq!(classification.is_production("itest/case0_test.go"), Some(false));
    assert_eq!(classification.is_production("core/alpha.go"), Some(true));

    let stats = &classification.stats;
    assert_eq!(
        stats.total_files,
        stats.production_files + stats.non_production_files
    );
    assert!(stats.isolated_files <= stats.production_files);
}

/// Isolated files stay production, and user overrides are final.
#[test]
fn test_classification_overrides_and_isolated_files() {
    let results = vec![
        ParseResult::new("lone.go", "go").with_symbol(Symbol::new(
            "lone.go:1:Util",
            "Util",
            SymbolKind::Function,
            "lone.go",
            "go",
        )),
        ParseResult::new("gen/schema.go", "go").with_symbol(Symbol::new(
            "gen/schema.go:1:Schema",
            "Schema",
            SymbolKind::Struct,
            "gen/schema.go",
            "go",
        )),
    ];
    let result = build(&results);

    let config = ClassifierConfig {
        exclude_from_analysis: vec!["gen/".into()],
        include_override: vec![],
    };
    let classification = classify_files(&result.graph, &config);
    assert_eq!(classification.is_production("lone.go"), Some(true));
    assert_eq!(classification.is_production("gen/schema.go"), Some(false));
    assert_eq!(classification.stats.isolated_files, 1);

    // Include wins over exclude on overlap.
    let config = ClassifierConfig {
        exclude_from_analysis: vec!["gen/".into()],
        include_override: vec!["gen/schema".into()],
    };
    let classification = classify_files(&result.graph, &config);
    assert_eq!(classification.is_production("gen/schema.go"), Some(true));
}

// ---------------------------------------------------------------------------
// Determinism, serialization and snapshots
// ---------------------------------------------------------------------------

fn mixed_fixture() -> Vec<ParseResult> {
    let mut results = reader_writer_fixture();
    results.push(
        ParseResult::new("flask/app.py", "python")
            .with_symbol(package("flask/app.py", "python"))
            .with_symbol(
                Symbol::new("flask/app.py:50:serve", "serve", SymbolKind::Function, "flask/app.py", "python")
                    .with_call(CallSite::new("missing_helper", Location::new("flask/app.py", 51))),
            )
            .with_import(
                Import::new(".globals", Location::new("flask/app.py", 2))
                    .with_names(vec!["request".into()])
                    .relative(),
            ),
    );
    results.push(
        ParseResult::new("flask/globals.py", "python")
            .with_symbol(package("flask/globals.py", "python"))
            .with_symbol(Symbol::new(
                "flask/globals.py:10:request",
                "request",
                SymbolKind::Variable,
                "flask/globals.py",
                "python",
            )),
    );
    results
}

/// Universal graph invariants: edge endpoints exist, no duplicate triples,
/// no self edges.
#[test]
fn test_frozen_graph_invariants() {
    let result = build(&mixed_fixture());
    let graph = &result.graph;

    let mut seen = HashSet::new();
    for edge in graph.edges() {
        assert!(graph.node(&edge.from_id).is_some(), "dangling from: {}", edge.from_id);
        assert!(graph.node(&edge.to_id).is_some(), "dangling to: {}", edge.to_id);
        assert_ne!(edge.from_id, edge.to_id, "self edge on {}", edge.from_id);
        assert!(
            seen.insert((edge.from_id.clone(), edge.to_id.clone(), edge.kind)),
            "duplicate edge {} -> {} ({})",
            edge.from_id,
            edge.to_id,
            edge.kind
        );
    }
}

/// Two builds over the same inputs produce the same hash and, modulo the
/// build timestamp, byte-identical serialized output.
#[test]
fn test_builds_are_deterministic() {
    let first = build(&mixed_fixture());
    let second = build(&mixed_fixture());
    assert_eq!(first.graph.graph_hash(), second.graph.graph_hash());

    let mut record_a = to_serializable(&first.graph);
    let mut record_b = to_serializable(&second.graph);
    record_a.built_at_milli = 0;
    record_b.built_at_milli = 0;
    assert_eq!(
        serde_json::to_vec(&record_a).unwrap(),
        serde_json::to_vec(&record_b).unwrap()
    );
}

/// Serialization round-trip: equal counts, timestamp, hash, and working
/// secondary indexes.
#[test]
fn test_serialization_roundtrip() {
    let result = build(&mixed_fixture());
    let graph = &result.graph;
    let rebuilt = from_serializable(&to_serializable(graph)).unwrap();

    assert_eq!(rebuilt.node_count(), graph.node_count());
    assert_eq!(rebuilt.edge_count(), graph.edge_count());
    assert_eq!(rebuilt.built_at_milli(), graph.built_at_milli());
    assert_eq!(rebuilt.graph_hash(), graph.graph_hash());

    assert!(!rebuilt.nodes_named("File").is_empty());
    assert!(!rebuilt.nodes_of_kind(SymbolKind::Interface).is_empty());
    assert!(!rebuilt.nodes_in_file("io/file.go").is_empty());
    assert!(!rebuilt.edges_of_kind(EdgeKind::Implements).is_empty());
}

/// Snapshot round-trip through the KV store: the loaded graph hashes to the
/// saved metadata's graph hash and the payload passes its content check.
#[test]
fn test_snapshot_roundtrip_through_store() {
    use trace_graph::SnapshotStore;

    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::open(&dir.path().join("snapshots.redb")).unwrap();

    let builder = GraphBuilder::new(trace_graph::BuilderConfig {
        project_root: "/repo/demo".into(),
        ..Default::default()
    });
    let result = builder.build(&CancelToken::new(), &mixed_fixture());
    let saved = store.save(&result.graph).unwrap();

    let (loaded, metadata) = store.load("/repo/demo", None).unwrap();
    assert_eq!(metadata.graph_hash, result.graph.graph_hash());
    assert_eq!(loaded.graph_hash(), metadata.graph_hash);
    assert_eq!(loaded.node_count(), result.graph.node_count());
    assert_eq!(loaded.edge_count(), result.graph.edge_count());
    assert_eq!(saved.snapshot_id, metadata.snapshot_id);

    let listed = store.list(None).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].snapshot_id, saved.snapshot_id);
}

/// Implementation soundness: every Implements edge stays within one language
/// and its interface's direct methods all appear on the implementing type
/// (after promotion, which the engine resolved through embeds).
#[test]
fn test_implements_edges_are_sound() {
    let result = build(&reader_writer_fixture());
    let graph = &result.graph;
    for edge in graph.edges_of_kind(EdgeKind::Implements) {
        let from = graph.node(&edge.from_id).unwrap();
        let to = graph.node(&edge.to_id).unwrap();
        assert_eq!(from.symbol.language, to.symbol.language);
        assert_eq!(to.kind(), SymbolKind::Interface);
    }
}
