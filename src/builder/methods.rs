//! Cross-file method association for Go.
//!
//! Go parsers report method receivers textually, so a method defined in a
//! different file than its receiver type never shows up in that type's
//! method list. Before interface detection runs, every Go method is parsed
//! out of its declaration text and appended to its receiver type's
//! `metadata.methods` (unless an entry with that name already exists).

use tracing::debug;

use crate::language::LanguageKind;
use crate::symbol::{MethodSignature, Symbol, SymbolKind};

use super::{extract::pick_nearest, BuildState, CancelToken};

/// Parsed pieces of a Go method declaration.
#[derive(Debug, PartialEq)]
pub(crate) struct GoSignature {
    pub receiver: String,
    pub params: String,
    pub returns: String,
}

struct PendingMethod {
    name: String,
    file_path: String,
    receiver_type: String,
    params: String,
    returns: String,
}

/// Returns false when the cancel token fired (polled every 1,000 methods).
pub(crate) fn associate_go_methods(state: &mut BuildState, cancel: &CancelToken) -> bool {
    // Snapshot first: the graph's type symbols are mutated below, and file
    // order keeps the appended method lists deterministic.
    let mut pending: Vec<PendingMethod> = Vec::new();
    let mut scanned = 0usize;
    for file in &state.files {
        let mut stack: Vec<&Symbol> = file.symbols.iter().map(|s| s.as_ref()).collect();
        while let Some(symbol) = stack.pop() {
            stack.extend(symbol.children.iter());
            if symbol.kind != SymbolKind::Method {
                continue;
            }
            if LanguageKind::detect(&symbol.language, &symbol.file_path) != Some(LanguageKind::Go) {
                continue;
            }
            scanned += 1;
            if scanned % 1000 == 0 && cancel.is_cancelled() {
                state.incomplete = true;
                return false;
            }

            let parsed = if symbol.signature.is_empty() {
                None
            } else {
                parse_go_signature(&symbol.signature)
            };
            let (receiver_type, params, returns) = match parsed {
                Some(sig) => (sig.receiver, sig.params, sig.returns),
                None if !symbol.receiver.is_empty() => (
                    symbol.receiver.trim_start_matches('*').to_string(),
                    String::new(),
                    String::new(),
                ),
                None => continue,
            };
            pending.push(PendingMethod {
                name: symbol.name.clone(),
                file_path: symbol.file_path.clone(),
                receiver_type,
                params,
                returns,
            });
        }
    }

    for method in pending {
        let Some(type_id) = find_receiver_type(state, &method.receiver_type, &method.file_path)
        else {
            debug!(method = %method.name, receiver = %method.receiver_type, "receiver type not found for association");
            continue;
        };
        let Some(type_symbol) = state.graph.node_symbol_mut(&type_id) else {
            continue;
        };
        let meta = type_symbol.metadata.get_or_insert_with(Default::default);
        if meta.methods.iter().any(|sig| sig.name == method.name) {
            continue;
        }
        meta.methods.push(MethodSignature {
            name: method.name,
            param_count: count_at_depth_zero(&method.params),
            return_count: count_at_depth_zero(&method.returns),
            params: method.params,
            returns: method.returns,
            receiver_type: method.receiver_type,
        });
    }
    true
}

fn find_receiver_type(state: &BuildState, name: &str, method_file: &str) -> Option<String> {
    let candidates = state.symbols_by_name.get(name)?;
    let types: Vec<_> = candidates
        .iter()
        .filter(|s| {
            matches!(
                s.kind,
                SymbolKind::Struct | SymbolKind::Class | SymbolKind::Type
            )
        })
        .collect();
    pick_nearest(&types, method_file).map(|s| s.id.clone())
}

/// Parse `"func (r *Txn) Commit(opts ...Option) (int, error)"` into its
/// receiver type, parameter list and return list.
pub(crate) fn parse_go_signature(signature: &str) -> Option<GoSignature> {
    let after = signature.split_once("func (")?.1;
    let close = after.find(')')?;
    let receiver = after[..close]
        .split_whitespace()
        .last()?
        .trim_start_matches('*')
        .to_string();
    if receiver.is_empty() {
        return None;
    }

    let rest = &after[close + 1..];
    let open = rest.find('(')?;
    let mut depth = 0i32;
    let mut params_end = None;
    for (i, c) in rest[open..].char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth -= 1;
                if depth == 0 {
                    params_end = Some(open + i);
                    break;
                }
            }
            _ => {}
        }
    }
    let params_end = params_end?;
    let params = rest[open + 1..params_end].trim().to_string();

    let mut returns = rest[params_end + 1..].trim();
    // Multi-returns come parenthesized; strip one outer pair.
    if let Some(stripped) = returns
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
    {
        returns = stripped.trim();
    }

    Some(GoSignature {
        receiver,
        params,
        returns: returns.to_string(),
    })
}

/// Comma-separated group count at bracket depth zero; zero for empty input.
pub(crate) fn count_at_depth_zero(s: &str) -> u32 {
    let t = s.trim();
    if t.is_empty() {
        return 0;
    }
    let mut depth = 0i32;
    let mut count = 1u32;
    for c in t.chars() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            ',' if depth == 0 => count += 1,
            _ => {}
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_signature() {
        let sig = parse_go_signature("func (r *Router) Handle(path string) error").unwrap();
        assert_eq!(sig.receiver, "Router");
        assert_eq!(sig.params, "path string");
        assert_eq!(sig.returns, "error");
    }

    #[test]
    fn test_parse_multi_return() {
        let sig = parse_go_signature("func (t Txn) Get(key []byte) (Item, error)").unwrap();
        assert_eq!(sig.receiver, "Txn");
        assert_eq!(sig.params, "key []byte");
        assert_eq!(sig.returns, "Item, error");
    }

    #[test]
    fn test_parse_nested_params() {
        let sig =
            parse_go_signature("func (s *Server) Walk(fn func(k, v []byte) error) error").unwrap();
        assert_eq!(sig.params, "fn func(k, v []byte) error");
        assert_eq!(sig.returns, "error");
    }

    #[test]
    fn test_parse_no_returns() {
        let sig = parse_go_signature("func (w *Writer) Reset()").unwrap();
        assert_eq!(sig.params, "");
        assert_eq!(sig.returns, "");
    }

    #[test]
    fn test_parse_rejects_plain_functions() {
        assert!(parse_go_signature("func Handle(path string) error").is_none());
        assert!(parse_go_signature("").is_none());
    }

    #[test]
    fn test_count_at_depth_zero() {
        assert_eq!(count_at_depth_zero(""), 0);
        assert_eq!(count_at_depth_zero("a int"), 1);
        assert_eq!(count_at_depth_zero("a int, b string"), 2);
        assert_eq!(count_at_depth_zero("fn func(k, v []byte) error, n int"), 2);
        assert_eq!(count_at_depth_zero("m map[string]int"), 1);
    }
}
