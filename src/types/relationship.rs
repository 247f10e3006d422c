//! Relationship types and edges
//!
//! Edges are stored directionally (`object_id` -> `related_object_id`) but
//! the relationship is semantically undirected; queries must scan both
//! directions. Temporal validity: `current_to == None` means the edge is
//! presently open. Edges are never hard-deleted, only closed.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ids::{IrisObjectId, RelationshipId, RelationshipTypeId};
use crate::types::object::ObjectKind;

/// Well-known relationship type codes
pub mod codes {
    /// Programme <-> Authorisation subject link
    pub const PROGRAMME_SUBJECT: &str = "ProgrammeSubject";
    /// Regime <-> Authorisation subject link
    pub const REGIME_SUBJECT: &str = "RegimeSubject";
    /// Security-delegation link; the related object id is passed through to
    /// the authorization collaborator
    pub const DELEGATION: &str = "Delegation";
}

// ============================================================================
// RelationshipType
// ============================================================================

/// An allowed edge kind between a pair of object types
///
/// The pair is undirected at the type level: a type matches `(from, to)` or
/// `(to, from)`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationshipType {
    pub id: RelationshipTypeId,
    /// Stable code, matched case-insensitively (e.g. "ProgrammeSubject")
    pub code: String,
    /// Human-readable relationship label
    pub relationship: String,
    pub object_type: ObjectKind,
    pub related_object_type: ObjectKind,
    pub is_active: bool,
}

impl RelationshipType {
    /// Create a new active relationship type
    pub fn new(
        code: impl Into<String>,
        relationship: impl Into<String>,
        object_type: ObjectKind,
        related_object_type: ObjectKind,
    ) -> Self {
        Self {
            id: RelationshipTypeId::new(),
            code: code.into(),
            relationship: relationship.into(),
            object_type,
            related_object_type,
            is_active: true,
        }
    }

    /// Mark the type as retired
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Whether this type connects the given object-type pair, in either direction
    pub fn matches_pair(&self, a: ObjectKind, b: ObjectKind) -> bool {
        (self.object_type == a && self.related_object_type == b)
            || (self.object_type == b && self.related_object_type == a)
    }

    /// Whether this type's code equals `code`, case-insensitively
    pub fn matches_code(&self, code: &str) -> bool {
        self.code.eq_ignore_ascii_case(code)
    }
}

// ============================================================================
// Relationship (edge)
// ============================================================================

/// A typed, temporally-scoped edge between two nodes
///
/// State machine: OPEN -> CLOSED, terminal. A closed edge's endpoints, type
/// and `current_to` are never changed again; a replacement always produces a
/// new open edge.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Relationship {
    pub id: RelationshipId,
    pub object_id: IrisObjectId,
    pub related_object_id: IrisObjectId,
    pub relationship_type_id: RelationshipTypeId,
    /// Start of the validity window
    pub current_from: NaiveDate,
    /// End of the validity window; `None` means the edge is open
    pub current_to: Option<NaiveDate>,
    pub created_by: String,
    /// Unix timestamp (milliseconds) when created
    pub date_created: i64,
}

impl Relationship {
    /// Whether the edge is presently open (no end date)
    pub fn is_open(&self) -> bool {
        self.current_to.is_none()
    }

    /// Whether the edge touches the given node, in either position
    pub fn involves(&self, node: &IrisObjectId) -> bool {
        &self.object_id == node || &self.related_object_id == node
    }

    /// The endpoint opposite to `node`, if `node` is an endpoint
    pub fn opposite_of(&self, node: &IrisObjectId) -> Option<&IrisObjectId> {
        if &self.object_id == node {
            Some(&self.related_object_id)
        } else if &self.related_object_id == node {
            Some(&self.object_id)
        } else {
            None
        }
    }
}
