//! Type-safe ID newtypes for graph and cascade records
//!
//! All IDs are UUIDs wrapped in newtypes for compile-time safety.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Macro to define a type-safe ID newtype
macro_rules! define_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Create from an existing string (for loading from DB)
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Get the inner string value
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner string
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl rusqlite::types::FromSql for $name {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                value.as_str().map(|s| Self(s.to_string()))
            }
        }

        impl rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::Borrowed(
                    rusqlite::types::ValueRef::Text(self.0.as_bytes()),
                ))
            }
        }
    };
}

// Graph layer
define_id!(IrisObjectId, "Unique identifier for an IRIS object (graph node)");
define_id!(RelationshipId, "Unique identifier for an activity-object relationship (edge)");
define_id!(RelationshipTypeId, "Unique identifier for a relationship type");
define_id!(SubLinkId, "Unique identifier for a contact sub-link snapshot");

// Contact components (snapshot targets)
define_id!(ContactId, "Unique identifier for a contact record");
define_id!(NameId, "Unique identifier for a contact name");
define_id!(AddressId, "Unique identifier for a contact address");
define_id!(PhoneNumberId, "Unique identifier for a contact phone number");
define_id!(EmailId, "Unique identifier for a contact email address");
define_id!(WebsiteId, "Unique identifier for a contact website");

// Compliance cascade records
define_id!(RegimeId, "Unique identifier for a regime record");
define_id!(RegimeActivityId, "Unique identifier for a regime activity");
define_id!(ComplianceId, "Unique identifier for a regime-activity compliance record");
define_id!(ComplianceAuthorisationId, "Unique identifier for a regime-activity compliance authorisation link");
define_id!(ConditionId, "Unique identifier for a compliance condition");
define_id!(ResourceAssignmentId, "Unique identifier for a labour/equipment resource assignment");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_creation() {
        let id1 = IrisObjectId::new();
        let id2 = IrisObjectId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_id_from_string() {
        let id = RelationshipId::from_string("rel-123");
        assert_eq!(id.as_str(), "rel-123");
    }

    #[test]
    fn test_id_display() {
        let id = ContactId::from_string("contact-abc");
        assert_eq!(format!("{}", id), "contact-abc");
    }

    #[test]
    fn test_id_serde() {
        let id = RelationshipTypeId::from_string("type-123");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"type-123\"");

        let parsed: RelationshipTypeId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}
