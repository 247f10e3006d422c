//! Error taxonomy for graph operations
//!
//! Fatal errors (`TypeNotFound`, `AmbiguousType`, `ObjectNotFound`, ...)
//! abort the enclosing unit of work. `DuplicateOpenEdge` is a retryable
//! conflict raised by the storage-level uniqueness constraint on open edges.
//! Business-rule skips (closed activity, in-flight inspection, recorded
//! observation) are deliberately *not* errors; they are reported per item in
//! the migration summary.

use crate::ids::{ContactId, IrisObjectId, RelationshipId, RelationshipTypeId};

/// Errors raised by the relationship graph subsystem
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// No relationship type matches the requested object-type pair (and code)
    #[error("no relationship type found for {from} <-> {to} (code: {})", code.as_deref().unwrap_or("any"))]
    TypeNotFound {
        from: String,
        to: String,
        code: Option<String>,
    },

    /// More than one relationship type matched and no code was given to pick one
    #[error("{candidates} relationship types match {from} <-> {to}; a code is required")]
    AmbiguousType {
        from: String,
        to: String,
        candidates: usize,
    },

    /// A required IRIS object row is absent
    #[error("IRIS object {0} not found")]
    ObjectNotFound(IrisObjectId),

    /// A required relationship row is absent
    #[error("relationship {0} not found")]
    RelationshipNotFound(RelationshipId),

    /// A required contact record is absent
    #[error("contact {0} not found")]
    ContactNotFound(ContactId),

    /// An object-type filter named a code outside the known object-type set
    #[error("unknown object type code: {0}")]
    UnknownObjectType(String),

    /// The open-edge uniqueness constraint rejected an insert.
    ///
    /// At most one open edge may exist per unordered node pair and type;
    /// callers should treat this as a retryable collision.
    #[error("an open {relationship_type_id} edge already exists between {object_id} and {related_object_id}")]
    DuplicateOpenEdge {
        object_id: IrisObjectId,
        related_object_id: IrisObjectId,
        relationship_type_id: RelationshipTypeId,
    },

    /// Attempted to mutate an edge that has already been closed
    #[error("relationship {0} is closed and cannot be modified")]
    ClosedEdgeImmutable(RelationshipId),
}

impl GraphError {
    /// Whether retrying the operation may succeed (storage-level collision)
    pub fn is_retryable(&self) -> bool {
        matches!(self, GraphError::DuplicateOpenEdge { .. })
    }
}
