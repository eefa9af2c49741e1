use std::sync::Arc;

use crate::symbol::{Symbol, SymbolKind};

/// A graph wrapper over a parsed [`Symbol`], identified by the symbol's ID.
///
/// The symbol is shared (`Arc`) with the builder's lookup tables so a build
/// holds a single copy of each parsed symbol.
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub id: String,
    pub symbol: Arc<Symbol>,
}

impl GraphNode {
    pub fn new(symbol: Arc<Symbol>) -> Self {
        GraphNode {
            id: symbol.id.clone(),
            symbol,
        }
    }

    pub fn kind(&self) -> SymbolKind {
        self.symbol.kind
    }

    pub fn name(&self) -> &str {
        &self.symbol.name
    }

    /// Empty for placeholder (external) nodes.
    pub fn file_path(&self) -> &str {
        &self.symbol.file_path
    }

    pub fn language(&self) -> &str {
        &self.symbol.language
    }

    pub fn is_placeholder(&self) -> bool {
        self.symbol.kind == SymbolKind::External
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_takes_symbol_id() {
        let sym = Arc::new(Symbol::new(
            "a.go:1:main",
            "main",
            SymbolKind::Function,
            "a.go",
            "go",
        ));
        let node = GraphNode::new(sym);
        assert_eq!(node.id, "a.go:1:main");
        assert_eq!(node.kind(), SymbolKind::Function);
        assert!(!node.is_placeholder());
    }

    #[test]
    fn test_placeholder_node() {
        let node = GraphNode::new(Arc::new(Symbol::external("fmt", "Println")));
        assert!(node.is_placeholder());
        assert_eq!(node.file_path(), "");
    }
}
