//! Relationship edges used by the in-memory dependency graph.
//!
//! This is a thin, direction-tagged wrapper used only by
//! [`crate::storage::graph::DependencyGraph`] for bounded traversal
//! (`impact`, `trace`, `graph`). The richer, typed edges (`ImportEdge`,
//! `AliasEdge`, `InheritanceEdge`, `CallSite`) in [`crate::symbol`] remain
//! the source of truth the resolution engine queries directly; this graph
//! is a derived index over the `Calls`/`Implements`/`Uses` subset of them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    Calls,
    CalledBy,
    Implements,
    ImplementedBy,
    Uses,
    UsedBy,
    Defines,
    DefinedIn,
    Extends,
    ExtendedBy,
    References,
    ReferencedBy,
}

impl RelationKind {
    /// The edge kind recorded when traversing this relationship in reverse.
    pub fn inverse(self) -> Self {
        match self {
            Self::Calls => Self::CalledBy,
            Self::CalledBy => Self::Calls,
            Self::Implements => Self::ImplementedBy,
            Self::ImplementedBy => Self::Implements,
            Self::Uses => Self::UsedBy,
            Self::UsedBy => Self::Uses,
            Self::Defines => Self::DefinedIn,
            Self::DefinedIn => Self::Defines,
            Self::Extends => Self::ExtendedBy,
            Self::ExtendedBy => Self::Extends,
            Self::References => Self::ReferencedBy,
            Self::ReferencedBy => Self::References,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub kind: RelationKind,
}

impl Relationship {
    pub fn new(kind: RelationKind) -> Self {
        Self { kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverse_round_trips() {
        for kind in [
            RelationKind::Calls,
            RelationKind::Implements,
            RelationKind::Uses,
            RelationKind::Defines,
            RelationKind::Extends,
            RelationKind::References,
        ] {
            assert_eq!(kind.inverse().inverse(), kind);
        }
    }
}
