use std::fmt;

use serde::{Deserialize, Serialize};

use crate::symbol::Location;

/// The kind of directed edge between two nodes in the code graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Caller -> callee (or constructor) relationship.
    Calls,
    /// Per-file package symbol -> imported module placeholder.
    Imports,
    /// Type -> interface it satisfies (declared or detected by method set).
    Implements,
    /// Composer -> composed type or interface.
    Embeds,
    /// Method -> its receiver type.
    Receives,
    /// Function -> its named return type.
    Returns,
    /// Any symbol -> a symbol it mentions (named imports, decorator args,
    /// type arguments, callbacks).
    References,
}

impl EdgeKind {
    /// Stable numeric code used for canonical edge ordering and the wire format.
    pub fn type_code(self) -> u8 {
        match self {
            EdgeKind::Calls => 0,
            EdgeKind::Imports => 1,
            EdgeKind::Implements => 2,
            EdgeKind::Embeds => 3,
            EdgeKind::Receives => 4,
            EdgeKind::Returns => 5,
            EdgeKind::References => 6,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EdgeKind::Calls => "calls",
            EdgeKind::Imports => "imports",
            EdgeKind::Implements => "implements",
            EdgeKind::Embeds => "embeds",
            EdgeKind::Receives => "receives",
            EdgeKind::Returns => "returns",
            EdgeKind::References => "references",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed, directed link between two nodes with a source location.
///
/// Uniqueness key is `(from_id, to_id, kind)`; the location is carried for
/// reporting but does not participate in identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from_id: String,
    pub to_id: String,
    pub kind: EdgeKind,
    pub location: Location,
}

impl GraphEdge {
    pub fn new(
        from_id: impl Into<String>,
        to_id: impl Into<String>,
        kind: EdgeKind,
        location: Location,
    ) -> Self {
        GraphEdge {
            from_id: from_id.into(),
            to_id: to_id.into(),
            kind,
            location,
        }
    }
}
