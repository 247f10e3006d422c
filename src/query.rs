//! Relationship query engine
//!
//! Composes the two directional scans over the edge table into an
//! undirected view, filtered by temporal currency, relationship type and
//! the opposite node's object type. Results carry pass-through security
//! fields for the external authorization collaborator; nothing here
//! evaluates access control.

use std::collections::HashSet;

use anyhow::Result;
use rusqlite::{params, Connection};

use crate::error::GraphError;
use crate::ids::IrisObjectId;
use crate::store::sqlite::object::{self, OBJECT_COLS};
use crate::store::sqlite::relationship::{relationship_from_row, type_from_row, REL_COLS, TYPE_COLS};
use crate::store::sqlite::sublink;
use crate::types::object::{IrisObject, ObjectKind};
use crate::types::relationship::{codes, Relationship, RelationshipType};
use crate::types::sublink::ContactSubLink;

// ============================================================================
// Criteria
// ============================================================================

/// Filters over a node's edges
///
/// Type filters match relationship-type codes case-insensitively;
/// object-type filters match the opposite node's object-type code. An
/// `included_object_types` entry outside the known object-type set fails
/// with `UnknownObjectType`.
#[derive(Clone, Debug, Default)]
pub struct RelationshipCriteria {
    pub node_id: IrisObjectId,
    /// Include closed edges as well as open ones
    pub include_expired: bool,
    pub included_types: Option<Vec<String>>,
    pub excluded_types: Option<Vec<String>>,
    pub included_object_types: Option<Vec<String>>,
    pub excluded_object_types: Option<Vec<String>>,
}

impl RelationshipCriteria {
    /// Open edges of a node, unfiltered
    pub fn for_node(node_id: IrisObjectId) -> Self {
        Self {
            node_id,
            ..Self::default()
        }
    }

    /// Include closed edges
    pub fn with_expired(mut self) -> Self {
        self.include_expired = true;
        self
    }

    /// Only edges of these relationship-type codes
    pub fn with_types(mut self, codes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.included_types = Some(codes.into_iter().map(Into::into).collect());
        self
    }

    /// Exclude edges of these relationship-type codes
    pub fn without_types(mut self, codes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.excluded_types = Some(codes.into_iter().map(Into::into).collect());
        self
    }

    /// Only edges whose opposite node has one of these object-type codes
    pub fn with_object_types(
        mut self,
        codes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.included_object_types = Some(codes.into_iter().map(Into::into).collect());
        self
    }

    /// Exclude edges whose opposite node has one of these object-type codes
    pub fn without_object_types(
        mut self,
        codes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.excluded_object_types = Some(codes.into_iter().map(Into::into).collect());
        self
    }
}

// ============================================================================
// Results
// ============================================================================

/// Security fields passed through, unevaluated, to the authorization
/// collaborator
#[derive(Clone, Debug)]
pub struct SecurityContext {
    /// Object type of the queried node
    pub queried_object_type: ObjectKind,
    /// The delegated node when the matched type is a security delegation
    pub delegation_object_id: Option<IrisObjectId>,
}

/// One edge of the undirected view, seen from the queried node
#[derive(Clone, Debug)]
pub struct RelationshipEntry {
    pub relationship: Relationship,
    /// The endpoint opposite the queried node
    pub opposite: IrisObject,
    pub relationship_type: RelationshipType,
    /// Present when the opposite node is a contact
    pub sub_link: Option<ContactSubLink>,
    pub security: SecurityContext,
}

// ============================================================================
// Engine
// ============================================================================

/// Undirected, filtered view over a node's edges.
///
/// Two directional scans are issued, each joined to the opposite node and
/// the relationship type, and the union returned. When the object-type
/// filter includes contacts, results are de-duplicated by contact identity.
pub(crate) fn find_edges_sync(
    conn: &Connection,
    criteria: &RelationshipCriteria,
) -> Result<Vec<RelationshipEntry>> {
    // Validate included object-type codes up front
    let included_kinds: Option<Vec<ObjectKind>> = criteria
        .included_object_types
        .as_ref()
        .map(|codes| {
            codes
                .iter()
                .map(|c| ObjectKind::parse_code(c))
                .collect::<std::result::Result<Vec<_>, GraphError>>()
        })
        .transpose()?;
    // Unknown codes in the exclusion list can never match; drop them
    let excluded_kinds: Option<Vec<ObjectKind>> = criteria.excluded_object_types.as_ref().map(
        |codes| {
            codes
                .iter()
                .filter_map(|c| ObjectKind::parse_code(c).ok())
                .collect()
        },
    );

    let node = object::get_object_sync(conn, &criteria.node_id)?
        .ok_or_else(|| GraphError::ObjectNotFound(criteria.node_id.clone()))?;

    let mut entries = Vec::new();
    scan_direction(conn, criteria, &node, Direction::Forward, &mut entries)?;
    scan_direction(conn, criteria, &node, Direction::Reverse, &mut entries)?;

    // Apply object-type filters on the opposite node
    if let Some(kinds) = &included_kinds {
        entries.retain(|e| kinds.contains(&e.opposite.object_type));
    }
    if let Some(kinds) = &excluded_kinds {
        entries.retain(|e| !kinds.contains(&e.opposite.object_type));
    }

    // A contact reachable via either direction must count once
    let dedup_contacts = included_kinds
        .as_ref()
        .is_some_and(|kinds| kinds.contains(&ObjectKind::Contact));
    if dedup_contacts {
        let mut seen = HashSet::new();
        entries.retain(|e| {
            if e.opposite.object_type != ObjectKind::Contact {
                return true;
            }
            let contact_key = e
                .sub_link
                .as_ref()
                .map(|s| s.snapshot.contact_id.as_str().to_string())
                .unwrap_or_else(|| e.opposite.link_id.clone());
            seen.insert(contact_key)
        });
    }

    Ok(entries)
}

enum Direction {
    /// Queried node in the IRISObjectID column
    Forward,
    /// Queried node in the RelatedIRISObjectID column
    Reverse,
}

fn scan_direction(
    conn: &Connection,
    criteria: &RelationshipCriteria,
    node: &IrisObject,
    direction: Direction,
    entries: &mut Vec<RelationshipEntry>,
) -> Result<()> {
    let (own_col, opposite_col) = match direction {
        Direction::Forward => ("IRISObjectID", "RelatedIRISObjectID"),
        Direction::Reverse => ("RelatedIRISObjectID", "IRISObjectID"),
    };
    let sql = format!(
        "SELECT {rel}, {obj}, {typ}
         FROM ActivityObjectRelationship r
         JOIN IRISObject o ON o.ID = r.{opposite_col}
         JOIN ActivityObjectRelationshipType t
           ON t.ID = r.ActivityObjectRelationshipTypeID
         WHERE r.{own_col} = ?1 AND (?2 OR r.CurrentTo IS NULL)
         ORDER BY r.DateCreated",
        rel = qualified(REL_COLS, "r"),
        obj = qualified(OBJECT_COLS, "o"),
        typ = qualified(TYPE_COLS, "t"),
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![criteria.node_id, criteria.include_expired],
        |row| {
            let relationship = relationship_from_row(row, 0)?;
            let opposite = object::object_from_row(row, 8)?;
            let rel_type = type_from_row(row, 15)?;
            Ok((relationship, opposite, rel_type))
        },
    )?;

    for row in rows {
        let (relationship, opposite, rel_type) = row?;

        if let Some(codes) = &criteria.included_types {
            if !codes.iter().any(|c| rel_type.matches_code(c)) {
                continue;
            }
        }
        if let Some(codes) = &criteria.excluded_types {
            if codes.iter().any(|c| rel_type.matches_code(c)) {
                continue;
            }
        }

        let sub_link = if opposite.object_type == ObjectKind::Contact {
            sublink::get_sub_link_sync(conn, &relationship.id)?
        } else {
            None
        };

        let delegation_object_id = rel_type
            .matches_code(codes::DELEGATION)
            .then(|| opposite.id.clone());

        entries.push(RelationshipEntry {
            relationship,
            opposite,
            relationship_type: rel_type,
            sub_link,
            security: SecurityContext {
                queried_object_type: node.object_type,
                delegation_object_id,
            },
        });
    }
    Ok(())
}

/// Prefix each column in a column list with a table alias
fn qualified(cols: &str, alias: &str) -> String {
    cols.split(',')
        .map(|c| format!("{alias}.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Whether the node has any open edge whose type code matches
pub(crate) fn has_current_link_sync(
    conn: &Connection,
    node: &IrisObjectId,
    type_code: &str,
) -> Result<bool> {
    let criteria = RelationshipCriteria::for_node(node.clone()).with_types([type_code]);
    Ok(!find_edges_sync(conn, &criteria)?.is_empty())
}

/// Nodes of the given type currently related to `node`
pub(crate) fn related_nodes_of_type_sync(
    conn: &Connection,
    node: &IrisObjectId,
    object_type: ObjectKind,
) -> Result<Vec<IrisObject>> {
    let criteria =
        RelationshipCriteria::for_node(node.clone()).with_object_types([object_type.as_code()]);
    Ok(find_edges_sync(conn, &criteria)?
        .into_iter()
        .map(|e| e.opposite)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::NameId;
    use crate::store::sqlite::SqliteStore;
    use crate::store::traits::{ContactStore, LinkRequest, ObjectStore, RelationshipStore};
    use crate::types::relationship::RelationshipType;
    use crate::types::sublink::Contact;
    use chrono::NaiveDate;

    struct Fixture {
        store: SqliteStore,
        programme: IrisObjectId,
        authorisation: IrisObjectId,
        contact_node: IrisObjectId,
    }

    async fn fixture() -> Fixture {
        let store = SqliteStore::in_memory().unwrap();

        let programme = store
            .create_object(IrisObject::new(ObjectKind::Programme, "prog-1"))
            .await
            .unwrap();
        let authorisation = store
            .create_object(IrisObject::new(ObjectKind::Authorisation, "auth-1"))
            .await
            .unwrap();

        let contact = Contact::new(NameId::from_string("name-1"));
        let contact_id = store.create_contact(contact.clone()).await.unwrap();
        let contact_node = store
            .create_object(IrisObject::new(ObjectKind::Contact, contact_id.as_str()))
            .await
            .unwrap();

        let subject_type = store
            .define_type(RelationshipType::new(
                codes::PROGRAMME_SUBJECT,
                "Subject of",
                ObjectKind::Programme,
                ObjectKind::Authorisation,
            ))
            .await
            .unwrap();
        let holder_type = store
            .define_type(RelationshipType::new(
                "ProgrammeContact",
                "Contact for",
                ObjectKind::Programme,
                ObjectKind::Contact,
            ))
            .await
            .unwrap();

        let from = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        store
            .link(LinkRequest {
                object_id: programme.clone(),
                related_object_id: authorisation.clone(),
                relationship_type_id: subject_type.clone(),
                current_from: from,
                sub_link: None,
                created_by: "test".into(),
            })
            .await
            .unwrap();
        store
            .link(LinkRequest {
                object_id: programme.clone(),
                related_object_id: contact_node.clone(),
                relationship_type_id: holder_type.clone(),
                current_from: from,
                sub_link: Some(contact.snapshot()),
                created_by: "test".into(),
            })
            .await
            .unwrap();

        Fixture {
            store,
            programme,
            authorisation,
            contact_node,
        }
    }

    #[tokio::test]
    async fn test_undirected_symmetry() {
        let f = fixture().await;

        let from_programme = f
            .store
            .find_edges(&RelationshipCriteria::for_node(f.programme.clone()))
            .await
            .unwrap();
        let from_authorisation = f
            .store
            .find_edges(&RelationshipCriteria::for_node(f.authorisation.clone()))
            .await
            .unwrap();

        // The programme sees both edges; the authorisation sees the same
        // subject edge from the other side
        assert_eq!(from_programme.len(), 2);
        assert_eq!(from_authorisation.len(), 1);
        assert_eq!(from_authorisation[0].opposite.id, f.programme);
        assert!(from_programme
            .iter()
            .any(|e| e.relationship.id == from_authorisation[0].relationship.id));
    }

    #[tokio::test]
    async fn test_open_only_by_default() {
        let f = fixture().await;

        let edges = f
            .store
            .find_edges(&RelationshipCriteria::for_node(f.authorisation.clone()))
            .await
            .unwrap();
        f.store
            .close(
                &edges[0].relationship.id,
                NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            )
            .await
            .unwrap();

        let open = f
            .store
            .find_edges(&RelationshipCriteria::for_node(f.authorisation.clone()))
            .await
            .unwrap();
        assert!(open.is_empty());

        let with_expired = f
            .store
            .find_edges(&RelationshipCriteria::for_node(f.authorisation.clone()).with_expired())
            .await
            .unwrap();
        assert_eq!(with_expired.len(), 1);
        assert!(!with_expired[0].relationship.is_open());
    }

    #[tokio::test]
    async fn test_type_filters() {
        let f = fixture().await;

        let subject_only = f
            .store
            .find_edges(
                &RelationshipCriteria::for_node(f.programme.clone())
                    .with_types(["programmesubject"]),
            )
            .await
            .unwrap();
        assert_eq!(subject_only.len(), 1);
        assert_eq!(subject_only[0].opposite.id, f.authorisation);

        let no_subject = f
            .store
            .find_edges(
                &RelationshipCriteria::for_node(f.programme.clone())
                    .without_types([codes::PROGRAMME_SUBJECT]),
            )
            .await
            .unwrap();
        assert_eq!(no_subject.len(), 1);
        assert_eq!(no_subject[0].opposite.id, f.contact_node);
    }

    #[tokio::test]
    async fn test_object_type_filter_and_sub_link() {
        let f = fixture().await;

        let contacts = f
            .store
            .find_edges(
                &RelationshipCriteria::for_node(f.programme.clone())
                    .with_object_types(["Contact"]),
            )
            .await
            .unwrap();
        assert_eq!(contacts.len(), 1);
        let entry = &contacts[0];
        assert_eq!(entry.opposite.object_type, ObjectKind::Contact);
        assert!(entry.sub_link.is_some());
        assert_eq!(entry.security.queried_object_type, ObjectKind::Programme);
        assert!(entry.security.delegation_object_id.is_none());
    }

    #[tokio::test]
    async fn test_unknown_object_type_fails() {
        let f = fixture().await;

        let err = f
            .store
            .find_edges(
                &RelationshipCriteria::for_node(f.programme.clone())
                    .with_object_types(["Widget"]),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GraphError>().unwrap(),
            GraphError::UnknownObjectType(_)
        ));
    }

    #[tokio::test]
    async fn test_no_matches_is_empty_not_error() {
        let f = fixture().await;
        let lonely = f
            .store
            .create_object(IrisObject::new(ObjectKind::Location, "loc-1"))
            .await
            .unwrap();

        let edges = f
            .store
            .find_edges(&RelationshipCriteria::for_node(lonely))
            .await
            .unwrap();
        assert!(edges.is_empty());
    }

    #[tokio::test]
    async fn test_contact_deduplicated_across_directions() {
        let f = fixture().await;

        // A second edge to the same contact, stored in the opposite
        // direction and under a different type
        let other_type = f
            .store
            .define_type(RelationshipType::new(
                "ProgrammeBillingContact",
                "Billed to",
                ObjectKind::Contact,
                ObjectKind::Programme,
            ))
            .await
            .unwrap();
        f.store
            .link(LinkRequest {
                object_id: f.contact_node.clone(),
                related_object_id: f.programme.clone(),
                relationship_type_id: other_type,
                current_from: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
                sub_link: None,
                created_by: "test".into(),
            })
            .await
            .unwrap();

        let contacts = f
            .store
            .find_edges(
                &RelationshipCriteria::for_node(f.programme.clone())
                    .with_object_types(["Contact"]),
            )
            .await
            .unwrap();
        assert_eq!(contacts.len(), 1);
    }

    #[tokio::test]
    async fn test_convenience_reads() {
        let f = fixture().await;

        assert!(f
            .store
            .has_current_link(&f.programme, codes::PROGRAMME_SUBJECT)
            .await
            .unwrap());
        assert!(!f
            .store
            .has_current_link(&f.authorisation, "ProgrammeContact")
            .await
            .unwrap());

        let related = f
            .store
            .related_nodes_of_type(&f.programme, ObjectKind::Authorisation)
            .await
            .unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].id, f.authorisation);
    }
}
