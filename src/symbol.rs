//! Input contract shared with the per-language parsers.
//!
//! Parsers run upstream of this crate and hand over one [`ParseResult`] per
//! file. Nothing in here touches source text: these types are the fixed shape
//! of what a parser already extracted (symbols, call sites, imports and the
//! metadata needed for inheritance, interfaces and decorators).

use std::fmt;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

/// A source position carried on edges, call sites and imports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    /// 1-based line number; 0 when the parser did not record one.
    pub line: u32,
}

impl Location {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Location {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// The kind of symbol produced by a parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Struct,
    Interface,
    /// A named type that is neither a class nor a struct (Go type alias,
    /// TypeScript type alias).
    Type,
    Property,
    Variable,
    /// The synthetic per-file package/module symbol most parsers emit first.
    Package,
    /// A placeholder for a reference that resolves outside the project.
    External,
}

impl SymbolKind {
    /// Kinds that may appear as the source of a `Calls` edge.
    pub fn is_callable(self) -> bool {
        matches!(
            self,
            SymbolKind::Function | SymbolKind::Method | SymbolKind::External | SymbolKind::Property
        )
    }

    /// Kinds that own method sets: structs, classes, named types and interfaces.
    pub fn is_type_like(self) -> bool {
        matches!(
            self,
            SymbolKind::Struct | SymbolKind::Class | SymbolKind::Type | SymbolKind::Interface
        )
    }
}

/// One method entry in a type's or interface's method list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSignature {
    pub name: String,
    #[serde(default)]
    pub params: String,
    #[serde(default)]
    pub returns: String,
    #[serde(default)]
    pub param_count: u32,
    #[serde(default)]
    pub return_count: u32,
    #[serde(default)]
    pub receiver_type: String,
}

/// Optional per-symbol metadata parsers attach for types, interfaces,
/// decorated symbols and annotated functions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolMetadata {
    /// First parent class or first embedded type/interface.
    pub extends: Option<String>,
    /// Additional embeds, or declared interfaces for classes.
    pub implements: Vec<String>,
    /// Direct method list for types and interfaces.
    pub methods: Vec<MethodSignature>,
    pub decorators: Vec<String>,
    pub decorator_args: Vec<String>,
    pub type_arguments: Vec<String>,
    pub type_narrowings: Vec<String>,
    pub return_type: Option<String>,
}

/// A call site recorded inside a function, method or property body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallSite {
    /// Raw textual target as written in source (`"merge"`, `"router.handle"`).
    pub target: String,
    /// Receiver variable for method calls; empty for plain calls.
    #[serde(default)]
    pub receiver: String,
    #[serde(default)]
    pub is_method: bool,
    #[serde(default)]
    pub location: Location,
    /// Arguments passed by bare identifier (callbacks, handler functions).
    #[serde(default)]
    pub function_args: Vec<String>,
}

impl CallSite {
    pub fn new(target: impl Into<String>, location: Location) -> Self {
        CallSite {
            target: target.into(),
            location,
            ..Default::default()
        }
    }

    pub fn method(target: impl Into<String>, receiver: impl Into<String>, location: Location) -> Self {
        CallSite {
            target: target.into(),
            receiver: receiver.into(),
            is_method: true,
            location,
            ..Default::default()
        }
    }

    pub fn with_function_args(mut self, args: Vec<String>) -> Self {
        self.function_args = args;
        self
    }
}

/// A syntactic code entity produced by a parser.
///
/// `id` is globally unique within a build; parsers produce
/// `"<file>:<startLine>:<name>"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: String,
    pub name: String,
    pub kind: SymbolKind,
    pub file_path: String,
    pub language: String,
    #[serde(default)]
    pub start_line: u32,
    #[serde(default)]
    pub end_line: u32,
    #[serde(default)]
    pub exported: bool,
    /// Textual receiver type for methods (`"Router"`, `"*Handler"`); empty otherwise.
    #[serde(default)]
    pub receiver: String,
    /// Raw declaration text when the parser kept it (Go method association
    /// reads receivers, params and returns out of this).
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub children: Vec<Symbol>,
    #[serde(default)]
    pub calls: Vec<CallSite>,
    #[serde(default)]
    pub metadata: Option<SymbolMetadata>,
}

impl Symbol {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: SymbolKind,
        file_path: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Symbol {
            id: id.into(),
            name: name.into(),
            kind,
            file_path: file_path.into(),
            language: language.into(),
            start_line: 0,
            end_line: 0,
            exported: false,
            receiver: String::new(),
            signature: String::new(),
            children: Vec::new(),
            calls: Vec::new(),
            metadata: None,
        }
    }

    /// Synthetic symbol for an unresolved external reference.
    pub fn external(pkg: &str, name: &str) -> Self {
        Symbol::new(external_id(pkg, name), name, SymbolKind::External, "", "")
    }

    pub fn with_lines(mut self, start: u32, end: u32) -> Self {
        self.start_line = start;
        self.end_line = end;
        self
    }

    pub fn with_receiver(mut self, receiver: impl Into<String>) -> Self {
        self.receiver = receiver.into();
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = signature.into();
        self
    }

    pub fn with_exported(mut self, exported: bool) -> Self {
        self.exported = exported;
        self
    }

    pub fn with_call(mut self, call: CallSite) -> Self {
        self.calls.push(call);
        self
    }

    pub fn with_child(mut self, child: Symbol) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_metadata(mut self, metadata: SymbolMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Validate the symbol and, recursively, its children.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("symbol has an empty id".into());
        }
        if self.name.is_empty() {
            return Err(format!("symbol {} has an empty name", self.id));
        }
        if self.file_path.is_empty() {
            return Err(format!("symbol {} has an empty file path", self.id));
        }
        if self.end_line != 0 && self.end_line < self.start_line {
            return Err(format!(
                "symbol {} ends (line {}) before it starts (line {})",
                self.id, self.end_line, self.start_line
            ));
        }
        for child in &self.children {
            child.validate()?;
        }
        Ok(())
    }
}

/// Placeholder node ID format shared by the builder and the resolver.
pub fn external_id(pkg: &str, name: &str) -> String {
    format!("external:{pkg}:{name}")
}

/// An import statement extracted from a source file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Import {
    /// Raw module path as written (`".globals"`, `"pandas.core.frame"`, `"./router"`).
    pub path: String,
    /// Named imports; entries may carry an `"orig as alias"` form.
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub is_relative: bool,
    #[serde(default)]
    pub is_wildcard: bool,
    #[serde(default)]
    pub is_dynamic: bool,
    #[serde(default)]
    pub is_module: bool,
    #[serde(default)]
    pub location: Location,
}

impl Import {
    pub fn new(path: impl Into<String>, location: Location) -> Self {
        Import {
            path: path.into(),
            location,
            ..Default::default()
        }
    }

    pub fn with_names(mut self, names: Vec<String>) -> Self {
        self.names = names;
        self
    }

    pub fn relative(mut self) -> Self {
        self.is_relative = true;
        self
    }

    pub fn dynamic(mut self) -> Self {
        self.is_dynamic = true;
        self
    }

    pub fn wildcard(mut self) -> Self {
        self.is_wildcard = true;
        self
    }
}

/// The per-file unit of work handed over by a parser.
///
/// `symbols` may contain `None` entries (parsers emit nulls for constructs
/// they gave up on); those are skipped during collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseResult {
    pub file_path: String,
    pub language: String,
    #[serde(default)]
    pub symbols: Vec<Option<Symbol>>,
    #[serde(default)]
    pub imports: Vec<Import>,
}

impl ParseResult {
    pub fn new(file_path: impl Into<String>, language: impl Into<String>) -> Self {
        ParseResult {
            file_path: file_path.into(),
            language: language.into(),
            symbols: Vec::new(),
            imports: Vec::new(),
        }
    }

    pub fn with_symbol(mut self, symbol: Symbol) -> Self {
        self.symbols.push(Some(symbol));
        self
    }

    pub fn with_import(mut self, import: Import) -> Self {
        self.imports.push(import);
        self
    }

    /// Validate the file path and every non-null symbol.
    pub fn validate(&self) -> Result<(), String> {
        if self.file_path.is_empty() {
            return Err("parse result has an empty file path".into());
        }
        let traverses = Path::new(&self.file_path)
            .components()
            .any(|c| matches!(c, Component::ParentDir));
        if traverses {
            return Err(format!(
                "file path {:?} contains a parent-directory component",
                self.file_path
            ));
        }
        for symbol in self.symbols.iter().flatten() {
            symbol.validate()?;
        }
        Ok(())
    }
}
