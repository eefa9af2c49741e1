use serde::{Deserialize, Serialize};

/// A source language handled by the graph builder.
///
/// Uses a plain enum (not trait objects) to avoid `dyn` overhead. Cheap to
/// copy and pattern-matched at dispatch boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LanguageKind {
    Go,
    Python,
    JavaScript,
    TypeScript,
}

impl LanguageKind {
    /// Parse a parser-reported language string. Case-insensitive.
    ///
    /// Accepted values:
    /// - "go" or "golang"          -> Go
    /// - "python" or "py"          -> Python
    /// - "javascript" or "js"      -> JavaScript
    /// - "typescript" or "ts"      -> TypeScript
    pub fn from_language(s: &str) -> Option<LanguageKind> {
        match s.to_lowercase().as_str() {
            "go" | "golang" => Some(LanguageKind::Go),
            "python" | "py" => Some(LanguageKind::Python),
            "javascript" | "js" => Some(LanguageKind::JavaScript),
            "typescript" | "ts" => Some(LanguageKind::TypeScript),
            _ => None,
        }
    }

    /// Infer the language from a file path's extension.
    pub fn from_path(path: &str) -> Option<LanguageKind> {
        let ext = path.rsplit_once('.').map(|(_, e)| e)?;
        match ext {
            "go" => Some(LanguageKind::Go),
            "py" | "pyi" => Some(LanguageKind::Python),
            "js" | "jsx" | "mjs" | "cjs" => Some(LanguageKind::JavaScript),
            "ts" | "tsx" | "mts" | "cts" => Some(LanguageKind::TypeScript),
            _ => None,
        }
    }

    /// The language string first, the file extension as a fallback.
    pub fn detect(language: &str, path: &str) -> Option<LanguageKind> {
        LanguageKind::from_language(language).or_else(|| LanguageKind::from_path(path))
    }

    /// Human-readable display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            LanguageKind::Go => "Go",
            LanguageKind::Python => "Python",
            LanguageKind::JavaScript => "JavaScript",
            LanguageKind::TypeScript => "TypeScript",
        }
    }

    /// JavaScript and TypeScript share most heuristics downstream.
    pub fn is_ecmascript(&self) -> bool {
        matches!(self, LanguageKind::JavaScript | LanguageKind::TypeScript)
    }
}
