//! Graph-topology file classification: a binary production / non-production
//! label for every file, computed from cross-file edge flow plus language
//! naming heuristics, iteratively refined until stable, then overridden by
//! user config.

pub mod config;

pub use config::ClassifierConfig;

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use crate::graph::CodeGraph;
use crate::language::LanguageKind;
use crate::symbol::{Symbol, SymbolKind};

/// Files consuming far more than they serve are pure consumers (tests,
/// examples, scripts).
const PURE_CONSUMER_RATIO: f64 = 0.05;
/// Below this the file is suspicious but gets a symbol-level look first.
const DEFERRED_RATIO: f64 = 0.15;
/// Refinement threshold once non-production callers are excluded.
const REFINED_RATIO: f64 = 0.10;
/// Caller-purity: a heavily-called file whose production callers collapse
/// below this share of its original callers is test infrastructure.
const CALLER_PURITY_MIN_INCOMING: usize = 20;
const CALLER_PURITY_RATIO: f64 = 0.10;
const MAX_REFINEMENT_PASSES: usize = 5;
const KEYWORD_MIN_SYMBOLS: usize = 3;
const KEYWORD_DENSITY: f64 = 0.60;

const TEST_DIR_SEGMENTS: &[&str] = &[
    "__tests__",
    "__fixtures__",
    "__mocks__",
    "quicktests",
    "e2e",
    "cypress",
    "integration",
];

const TEST_NAME_KEYWORDS: &[&str] = &[
    "assert",
    "test",
    "mock",
    "stub",
    "fixture",
    "setup",
    "teardown",
    "benchmark",
    "expect",
    "verify",
    "fake",
    "spy",
];

/// Summary counts for one classification run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassificationStats {
    pub total_files: usize,
    pub production_files: usize,
    pub non_production_files: usize,
    /// Files with no cross-file edges that stayed production.
    pub isolated_files: usize,
}

/// The classifier's output: a per-file production flag plus summary stats.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    /// true = production.
    pub files: HashMap<String, bool>,
    pub stats: ClassificationStats,
}

impl Classification {
    pub fn is_production(&self, file: &str) -> Option<bool> {
        self.files.get(file).copied()
    }

    /// Production file paths, sorted.
    pub fn production_files(&self) -> Vec<&str> {
        let mut files: Vec<&str> = self
            .files
            .iter()
            .filter(|&(_, &prod)| prod)
            .map(|(f, _)| f.as_str())
            .collect();
        files.sort_unstable();
        files
    }

    /// Non-production file paths, sorted.
    pub fn non_production_files(&self) -> Vec<&str> {
        let mut files: Vec<&str> = self
            .files
            .iter()
            .filter(|&(_, &prod)| !prod)
            .map(|(f, _)| f.as_str())
            .collect();
        files.sort_unstable();
        files
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Label {
    Production,
    NonProduction,
    Deferred,
}

struct FileFacts {
    label: Label,
    edges_in: usize,
    edges_out: usize,
    isolated: bool,
    /// Cleared symbol analysis keeps a file out of iterative refinement.
    refine_exempt: bool,
    /// Cross-file edge endpoints: (other file, incoming?).
    cross_edges: Vec<(String, bool)>,
}

/// Classify every file of a frozen graph. Placeholder nodes carry no file
/// path and are excluded up front.
pub fn classify_files(graph: &CodeGraph, config: &ClassifierConfig) -> Classification {
    let mut facts = initial_consumption_labels(graph);

    apply_test_file_patterns(&mut facts);
    apply_symbol_analysis(graph, &mut facts);
    refine_iteratively(&mut facts);
    apply_config_overrides(config, &mut facts);

    let mut files = HashMap::new();
    let mut stats = ClassificationStats {
        total_files: facts.len(),
        ..Default::default()
    };
    for (file, fact) in facts {
        let production = fact.label == Label::Production;
        if production {
            stats.production_files += 1;
            if fact.isolated {
                stats.isolated_files += 1;
            }
        } else {
            stats.non_production_files += 1;
        }
        files.insert(file, production);
    }
    Classification { files, stats }
}

/// Group nodes by file and label each file by its initial consumption
/// ratio: edges-in over total cross-file edges.
fn initial_consumption_labels(graph: &CodeGraph) -> BTreeMap<String, FileFacts> {
    let mut facts = BTreeMap::new();
    for file in graph.files() {
        let mut cross_edges = Vec::new();
        for node in graph.nodes_in_file(file) {
            for edge in graph.incoming(&node.id) {
                if let Some(other) = cross_file_endpoint(graph, &edge.from_id, file) {
                    cross_edges.push((other, true));
                }
            }
            for edge in graph.outgoing(&node.id) {
                if let Some(other) = cross_file_endpoint(graph, &edge.to_id, file) {
                    cross_edges.push((other, false));
                }
            }
        }
        let edges_in = cross_edges.iter().filter(|(_, incoming)| *incoming).count();
        let edges_out = cross_edges.len() - edges_in;
        let total = edges_in + edges_out;

        let (label, isolated) = if total == 0 {
            // Isolated files get the benefit of the doubt.
            (Label::Production, true)
        } else {
            let ratio = edges_in as f64 / total as f64;
            if ratio < PURE_CONSUMER_RATIO {
                (Label::NonProduction, false)
            } else if ratio < DEFERRED_RATIO {
                (Label::Deferred, false)
            } else {
                (Label::Production, false)
            }
        };

        facts.insert(
            file.to_string(),
            FileFacts {
                label,
                edges_in,
                edges_out,
                isolated,
                refine_exempt: false,
                cross_edges,
            },
        );
    }
    facts
}

/// The other endpoint's file, when it is a different project file.
fn cross_file_endpoint(graph: &CodeGraph, node_id: &str, this_file: &str) -> Option<String> {
    let other = graph.node(node_id)?.file_path();
    if other.is_empty() || other == this_file {
        return None;
    }
    Some(other.to_string())
}

/// Definitive test-file naming rules demote files regardless of topology.
fn apply_test_file_patterns(facts: &mut BTreeMap<String, FileFacts>) {
    for (file, fact) in facts.iter_mut() {
        if fact.label == Label::Production && is_definitive_test_file(file) {
            fact.label = Label::NonProduction;
        }
    }
}

fn is_definitive_test_file(path: &str) -> bool {
    if path
        .split('/')
        .any(|segment| TEST_DIR_SEGMENTS.contains(&segment))
    {
        return true;
    }
    let basename = path.rsplit('/').next().unwrap_or(path);
    match LanguageKind::from_path(path) {
        Some(LanguageKind::Go) => basename.ends_with("_test.go"),
        Some(LanguageKind::Python) => {
            let stem = basename
                .rsplit_once('.')
                .map(|(s, _)| s)
                .unwrap_or(basename)
                .to_lowercase();
            stem.starts_with("test_") || stem.ends_with("_test") || stem == "conftest"
        }
        Some(kind) if kind.is_ecmascript() => basename
            .split('.')
            .skip(1)
            .any(|segment| segment == "test" || segment == "spec"),
        _ => false,
    }
}

/// Deferred files are decided by their symbols; production files with
/// overwhelming test vocabulary are demoted.
fn apply_symbol_analysis(graph: &CodeGraph, facts: &mut BTreeMap<String, FileFacts>) {
    for (file, fact) in facts.iter_mut() {
        if fact.label != Label::Deferred {
            continue;
        }
        let nodes = graph.nodes_in_file(file);
        let entry_points = nodes
            .iter()
            .filter(|n| is_test_entry_point(&n.symbol))
            .count();
        if !nodes.is_empty() && entry_points * 2 > nodes.len() {
            fact.label = Label::NonProduction;
        } else {
            // Cleared by symbol analysis; refinement leaves it alone.
            fact.label = Label::Production;
            fact.refine_exempt = true;
        }
    }

    for (file, fact) in facts.iter_mut() {
        if fact.label != Label::Production {
            continue;
        }
        let nodes = graph.nodes_in_file(file);
        if nodes.len() < KEYWORD_MIN_SYMBOLS {
            continue;
        }
        let keyword_hits = nodes
            .iter()
            .filter(|n| {
                let name = n.name().to_lowercase();
                TEST_NAME_KEYWORDS.iter().any(|kw| name.contains(kw))
            })
            .count();
        if keyword_hits as f64 / nodes.len() as f64 > KEYWORD_DENSITY {
            debug!(file = %file, hits = keyword_hits, "demoting file with high test-keyword density");
            fact.label = Label::NonProduction;
        }
    }
}

/// A symbol that only exists to be picked up by a test runner.
fn is_test_entry_point(symbol: &Symbol) -> bool {
    match LanguageKind::detect(&symbol.language, &symbol.file_path) {
        Some(LanguageKind::Go) => ["Test", "Benchmark", "Example", "Fuzz"]
            .iter()
            .any(|prefix| symbol.name.starts_with(prefix)),
        Some(LanguageKind::Python) => {
            if symbol.name.starts_with("test_") {
                return true;
            }
            if matches!(
                symbol.name.as_str(),
                "setUp" | "tearDown" | "setUpClass" | "tearDownClass"
            ) {
                return true;
            }
            if let Some(meta) = &symbol.metadata {
                if meta
                    .decorators
                    .iter()
                    .any(|d| d.to_lowercase().contains("fixture"))
                {
                    return true;
                }
                if symbol.kind == SymbolKind::Class
                    && meta
                        .extends
                        .as_deref()
                        .is_some_and(|e| e.ends_with("TestCase"))
                {
                    return true;
                }
            }
            false
        }
        Some(kind) if kind.is_ecmascript() => matches!(
            symbol.name.as_str(),
            "it" | "test"
                | "describe"
                | "beforeEach"
                | "afterEach"
                | "beforeAll"
                | "afterAll"
                | "before"
                | "after"
        ),
        _ => false,
    }
}

/// Recompute each production file's edge flow against the current production
/// set, demoting files whose production traffic collapses. Repeats until a
/// pass changes nothing.
fn refine_iteratively(facts: &mut BTreeMap<String, FileFacts>) {
    for _ in 0..MAX_REFINEMENT_PASSES {
        let production: HashSet<String> = facts
            .iter()
            .filter(|(_, f)| f.label == Label::Production)
            .map(|(file, _)| file.clone())
            .collect();

        let mut demote = Vec::new();
        for (file, fact) in facts.iter() {
            if fact.label != Label::Production || fact.refine_exempt {
                continue;
            }
            let prod_in = fact
                .cross_edges
                .iter()
                .filter(|(other, incoming)| *incoming && production.contains(other))
                .count();
            let prod_out = fact
                .cross_edges
                .iter()
                .filter(|(other, incoming)| !*incoming && production.contains(other))
                .count();
            let prod_total = prod_in + prod_out;

            if prod_total == 0 {
                // Isolated files keep their benefit of the doubt; files that
                // lost all their edges to demotion do not.
                if fact.edges_in + fact.edges_out > 0 {
                    demote.push(file.clone());
                }
                continue;
            }

            let prod_ratio = prod_in as f64 / prod_total as f64;
            let caller_purity_failed = fact.edges_in > CALLER_PURITY_MIN_INCOMING
                && (prod_in as f64 / fact.edges_in as f64) < CALLER_PURITY_RATIO;
            if prod_ratio < REFINED_RATIO || caller_purity_failed {
                demote.push(file.clone());
            }
        }

        if demote.is_empty() {
            break;
        }
        for file in demote {
            if let Some(fact) = facts.get_mut(&file) {
                fact.label = Label::NonProduction;
            }
        }
    }
}

/// User overrides are final; include wins on overlap.
fn apply_config_overrides(config: &ClassifierConfig, facts: &mut BTreeMap<String, FileFacts>) {
    for (file, fact) in facts.iter_mut() {
        if config
            .exclude_from_analysis
            .iter()
            .any(|prefix| file.starts_with(prefix))
        {
            fact.label = Label::NonProduction;
        }
        if config
            .include_override
            .iter()
            .any(|prefix| file.starts_with(prefix))
        {
            fact.label = Label::Production;
        }
    }
}
