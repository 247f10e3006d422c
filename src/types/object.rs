//! IRIS objects: the nodes of the relationship graph
//!
//! A node identifies a concrete domain record (application, authorisation,
//! contact, programme, ...) by a stable surrogate id plus an object-type tag.
//! Nodes are untyped at the graph layer; type-specific behaviour is resolved
//! through the concrete record named by `link_id`.

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::ids::IrisObjectId;

// ============================================================================
// ObjectKind
// ============================================================================

/// The closed set of domain record types that participate in the graph.
///
/// Subtype-specific behaviour in the migration engine dispatches on this
/// variant exhaustively rather than downcasting concrete records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Application,
    Authorisation,
    Contact,
    Location,
    Programme,
    Regime,
    RegimeActivity,
}

impl ObjectKind {
    /// The persisted object-type code
    pub fn as_code(&self) -> &'static str {
        match self {
            ObjectKind::Application => "Application",
            ObjectKind::Authorisation => "Authorisation",
            ObjectKind::Contact => "Contact",
            ObjectKind::Location => "Location",
            ObjectKind::Programme => "Programme",
            ObjectKind::Regime => "Regime",
            ObjectKind::RegimeActivity => "RegimeActivity",
        }
    }

    /// Parse a persisted object-type code, case-insensitively.
    ///
    /// Codes outside the known set fail with `UnknownObjectType`.
    pub fn parse_code(code: &str) -> Result<Self, GraphError> {
        let kind = match code.to_ascii_lowercase().as_str() {
            "application" => ObjectKind::Application,
            "authorisation" => ObjectKind::Authorisation,
            "contact" => ObjectKind::Contact,
            "location" => ObjectKind::Location,
            "programme" => ObjectKind::Programme,
            "regime" => ObjectKind::Regime,
            "regimeactivity" => ObjectKind::RegimeActivity,
            _ => return Err(GraphError::UnknownObjectType(code.to_string())),
        };
        Ok(kind)
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_code())
    }
}

// ============================================================================
// IrisObject
// ============================================================================

/// A node in the relationship graph
///
/// `link_id` names the concrete typed record this node represents. Nodes are
/// created alongside their concrete record and never physically removed;
/// deletion is a concrete-record concern, not a graph one.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IrisObject {
    pub id: IrisObjectId,
    /// Type of the concrete record behind this node
    pub object_type: ObjectKind,
    /// Optional sub-classification tags
    pub sub_class1: Option<String>,
    pub sub_class2: Option<String>,
    pub sub_class3: Option<String>,
    /// Id of the concrete typed record (contact id, regime id, ...)
    pub link_id: String,
    /// Unix timestamp (milliseconds) when created
    pub date_created: i64,
}

impl IrisObject {
    /// Create a new node for a concrete record
    pub fn new(object_type: ObjectKind, link_id: impl Into<String>) -> Self {
        Self {
            id: IrisObjectId::new(),
            object_type,
            sub_class1: None,
            sub_class2: None,
            sub_class3: None,
            link_id: link_id.into(),
            date_created: 0, // set by store
        }
    }

    /// Set the first sub-classification tag
    pub fn with_sub_class1(mut self, sub_class: impl Into<String>) -> Self {
        self.sub_class1 = Some(sub_class.into());
        self
    }

    /// Set the second sub-classification tag
    pub fn with_sub_class2(mut self, sub_class: impl Into<String>) -> Self {
        self.sub_class2 = Some(sub_class.into());
        self
    }

    /// Set the third sub-classification tag
    pub fn with_sub_class3(mut self, sub_class: impl Into<String>) -> Self {
        self.sub_class3 = Some(sub_class.into());
        self
    }
}
