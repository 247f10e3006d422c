//! SQLite implementation of RelationshipStore
//!
//! Edges are stored directionally in `ActivityObjectRelationship` but
//! queried undirected. Invariant: at most one open edge per unordered node
//! pair and type, enforced by a partial unique index over the ordered pair
//! where `CurrentTo IS NULL`; the resulting constraint failure is mapped to
//! `GraphError::DuplicateOpenEdge` so callers see a retryable collision
//! instead of a silent duplicate.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};

use super::{date_to_sql, object, sublink, unix_timestamp, SqliteStore};
use crate::error::GraphError;
use crate::ids::{IrisObjectId, RelationshipId, RelationshipTypeId};
use crate::query::{self, RelationshipCriteria, RelationshipEntry};
use crate::store::traits::{LinkRequest, RelationshipStore};
use crate::types::object::{IrisObject, ObjectKind};
use crate::types::relationship::{Relationship, RelationshipType};
use crate::types::sublink::{ContactSubLink, SubLinkSnapshot};

/// Initialize taxonomy and edge tables
pub(crate) fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS ActivityObjectRelationshipType (
            ID TEXT PRIMARY KEY,
            Code TEXT NOT NULL,
            Relationship TEXT NOT NULL,
            ObjectTypeID TEXT NOT NULL,
            RelatedObjectTypeID TEXT NOT NULL,
            IsActive INTEGER NOT NULL DEFAULT 1
        );

        -- Edges; closed by setting CurrentTo, never deleted
        CREATE TABLE IF NOT EXISTS ActivityObjectRelationship (
            ID TEXT PRIMARY KEY,
            IRISObjectID TEXT NOT NULL REFERENCES IRISObject(ID),
            RelatedIRISObjectID TEXT NOT NULL REFERENCES IRISObject(ID),
            ActivityObjectRelationshipTypeID TEXT NOT NULL
                REFERENCES ActivityObjectRelationshipType(ID),
            CurrentFrom TEXT NOT NULL,
            CurrentTo TEXT,
            CreatedBy TEXT NOT NULL,
            DateCreated INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS IX_Relationship_Object
            ON ActivityObjectRelationship(IRISObjectID);
        CREATE INDEX IF NOT EXISTS IX_Relationship_Related
            ON ActivityObjectRelationship(RelatedIRISObjectID);

        -- At most one open edge per unordered pair and type
        CREATE UNIQUE INDEX IF NOT EXISTS UQ_Relationship_Open
            ON ActivityObjectRelationship(
                MIN(IRISObjectID, RelatedIRISObjectID),
                MAX(IRISObjectID, RelatedIRISObjectID),
                ActivityObjectRelationshipTypeID
            )
            WHERE CurrentTo IS NULL;
        "#,
    )?;
    Ok(())
}

pub(crate) const REL_COLS: &str = "ID, IRISObjectID, RelatedIRISObjectID, \
     ActivityObjectRelationshipTypeID, CurrentFrom, CurrentTo, CreatedBy, DateCreated";

/// Map an ActivityObjectRelationship row starting at column `base`
pub(crate) fn relationship_from_row(row: &Row<'_>, base: usize) -> rusqlite::Result<Relationship> {
    let from_text: String = row.get(base + 4)?;
    let to_text: Option<String> = row.get(base + 5)?;
    let date_err = |idx, e: chrono::ParseError| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    };
    let current_from = super::date_from_sql(&from_text).map_err(|e| date_err(base + 4, e))?;
    let current_to = match to_text {
        Some(t) => Some(super::date_from_sql(&t).map_err(|e| date_err(base + 5, e))?),
        None => None,
    };
    Ok(Relationship {
        id: row.get(base)?,
        object_id: row.get(base + 1)?,
        related_object_id: row.get(base + 2)?,
        relationship_type_id: row.get(base + 3)?,
        current_from,
        current_to,
        created_by: row.get(base + 6)?,
        date_created: row.get(base + 7)?,
    })
}

pub(crate) const TYPE_COLS: &str =
    "ID, Code, Relationship, ObjectTypeID, RelatedObjectTypeID, IsActive";

pub(crate) fn type_from_row(row: &Row<'_>, base: usize) -> rusqlite::Result<RelationshipType> {
    let kind_err = |idx, e: GraphError| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    };
    let object_code: String = row.get(base + 3)?;
    let related_code: String = row.get(base + 4)?;
    let is_active: i32 = row.get(base + 5)?;
    Ok(RelationshipType {
        id: row.get(base)?,
        code: row.get(base + 1)?,
        relationship: row.get(base + 2)?,
        object_type: ObjectKind::parse_code(&object_code).map_err(|e| kind_err(base + 3, e))?,
        related_object_type: ObjectKind::parse_code(&related_code)
            .map_err(|e| kind_err(base + 4, e))?,
        is_active: is_active != 0,
    })
}

// ============================================================================
// Taxonomy
// ============================================================================

pub(crate) fn define_type_sync(
    conn: &Connection,
    rel_type: &RelationshipType,
) -> Result<RelationshipTypeId> {
    conn.execute(
        "INSERT INTO ActivityObjectRelationshipType
             (ID, Code, Relationship, ObjectTypeID, RelatedObjectTypeID, IsActive)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            rel_type.id,
            rel_type.code,
            rel_type.relationship,
            rel_type.object_type.as_code(),
            rel_type.related_object_type.as_code(),
            rel_type.is_active as i32
        ],
    )?;
    Ok(rel_type.id.clone())
}

pub(crate) fn list_types_sync(conn: &Connection) -> Result<Vec<RelationshipType>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TYPE_COLS} FROM ActivityObjectRelationshipType ORDER BY Code"
    ))?;
    let rows = stmt.query_map([], |row| type_from_row(row, 0))?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

pub(crate) fn get_type_sync(
    conn: &Connection,
    id: &RelationshipTypeId,
) -> Result<Option<RelationshipType>> {
    let result = conn.query_row(
        &format!("SELECT {TYPE_COLS} FROM ActivityObjectRelationshipType WHERE ID = ?1"),
        params![id],
        |row| type_from_row(row, 0),
    );
    match result {
        Ok(t) => Ok(Some(t)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// Edges
// ============================================================================

/// Insert an open edge row, mapping the open-edge uniqueness constraint to
/// `GraphError::DuplicateOpenEdge`
pub(crate) fn insert_edge_sync(
    conn: &Connection,
    object_id: &IrisObjectId,
    related_object_id: &IrisObjectId,
    relationship_type_id: &RelationshipTypeId,
    current_from: NaiveDate,
    created_by: &str,
) -> Result<RelationshipId> {
    let id = RelationshipId::new();
    let result = conn.execute(
        "INSERT INTO ActivityObjectRelationship
             (ID, IRISObjectID, RelatedIRISObjectID, ActivityObjectRelationshipTypeID,
              CurrentFrom, CurrentTo, CreatedBy, DateCreated)
         VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, ?7)",
        params![
            id,
            object_id,
            related_object_id,
            relationship_type_id,
            date_to_sql(current_from),
            created_by,
            unix_timestamp()
        ],
    );
    match result {
        Ok(_) => Ok(id),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Err(GraphError::DuplicateOpenEdge {
                object_id: object_id.clone(),
                related_object_id: related_object_id.clone(),
                relationship_type_id: relationship_type_id.clone(),
            }
            .into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Create an open edge after validating both nodes and the type pair;
/// stamps a sub-link when a snapshot is supplied
pub(crate) fn link_sync(conn: &Connection, request: &LinkRequest) -> Result<RelationshipId> {
    let a = object::get_object_sync(conn, &request.object_id)?
        .ok_or_else(|| GraphError::ObjectNotFound(request.object_id.clone()))?;
    let b = object::get_object_sync(conn, &request.related_object_id)?
        .ok_or_else(|| GraphError::ObjectNotFound(request.related_object_id.clone()))?;

    let rel_type = get_type_sync(conn, &request.relationship_type_id)?.ok_or_else(|| {
        GraphError::TypeNotFound {
            from: a.object_type.as_code().to_string(),
            to: b.object_type.as_code().to_string(),
            code: None,
        }
    })?;
    if !rel_type.matches_pair(a.object_type, b.object_type) {
        return Err(GraphError::TypeNotFound {
            from: a.object_type.as_code().to_string(),
            to: b.object_type.as_code().to_string(),
            code: Some(rel_type.code),
        }
        .into());
    }

    let edge_id = insert_edge_sync(
        conn,
        &request.object_id,
        &request.related_object_id,
        &request.relationship_type_id,
        request.current_from,
        &request.created_by,
    )?;

    if let Some(snapshot) = &request.sub_link {
        if a.object_type != ObjectKind::Contact && b.object_type != ObjectKind::Contact {
            bail!("sub-link supplied but neither endpoint is a contact");
        }
        sublink::insert_sub_link_sync(conn, &edge_id, snapshot, &request.created_by)?;
    }

    Ok(edge_id)
}

pub(crate) fn get_relationship_sync(
    conn: &Connection,
    id: &RelationshipId,
) -> Result<Option<Relationship>> {
    let result = conn.query_row(
        &format!("SELECT {REL_COLS} FROM ActivityObjectRelationship WHERE ID = ?1"),
        params![id],
        |row| relationship_from_row(row, 0),
    );
    match result {
        Ok(edge) => Ok(Some(edge)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Close an open edge. Closed edges are immutable.
pub(crate) fn close_edge_sync(
    conn: &Connection,
    id: &RelationshipId,
    current_to: NaiveDate,
) -> Result<()> {
    let edge = get_relationship_sync(conn, id)?
        .ok_or_else(|| GraphError::RelationshipNotFound(id.clone()))?;
    if !edge.is_open() {
        return Err(GraphError::ClosedEdgeImmutable(id.clone()).into());
    }
    conn.execute(
        "UPDATE ActivityObjectRelationship SET CurrentTo = ?1 WHERE ID = ?2 AND CurrentTo IS NULL",
        params![date_to_sql(current_to), id],
    )?;
    Ok(())
}

/// The open edge between a pair of nodes under a type, scanning both
/// directions
pub(crate) fn find_open_edge_sync(
    conn: &Connection,
    a: &IrisObjectId,
    b: &IrisObjectId,
    relationship_type_id: &RelationshipTypeId,
) -> Result<Option<Relationship>> {
    let result = conn.query_row(
        &format!(
            "SELECT {REL_COLS} FROM ActivityObjectRelationship
             WHERE ActivityObjectRelationshipTypeID = ?1 AND CurrentTo IS NULL
               AND ((IRISObjectID = ?2 AND RelatedIRISObjectID = ?3)
                 OR (IRISObjectID = ?3 AND RelatedIRISObjectID = ?2))"
        ),
        params![relationship_type_id, a, b],
        |row| relationship_from_row(row, 0),
    );
    match result {
        Ok(edge) => Ok(Some(edge)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// RelationshipStore implementation
// ============================================================================

#[async_trait]
impl RelationshipStore for SqliteStore {
    async fn define_type(&self, rel_type: RelationshipType) -> Result<RelationshipTypeId> {
        let conn = self.conn().lock().unwrap();
        define_type_sync(&conn, &rel_type)
    }

    async fn list_types(&self) -> Result<Vec<RelationshipType>> {
        let conn = self.conn().lock().unwrap();
        list_types_sync(&conn)
    }

    async fn link(&self, request: LinkRequest) -> Result<RelationshipId> {
        let mut conn = self.conn().lock().unwrap();
        let tx = conn.transaction()?;
        let id = link_sync(&tx, &request)?;
        tx.commit()?;
        Ok(id)
    }

    async fn close(&self, id: &RelationshipId, current_to: NaiveDate) -> Result<()> {
        let conn = self.conn().lock().unwrap();
        close_edge_sync(&conn, id, current_to)
    }

    async fn get_relationship(&self, id: &RelationshipId) -> Result<Option<Relationship>> {
        let conn = self.conn().lock().unwrap();
        get_relationship_sync(&conn, id)
    }

    async fn get_sub_link(&self, id: &RelationshipId) -> Result<Option<ContactSubLink>> {
        let conn = self.conn().lock().unwrap();
        sublink::get_sub_link_sync(&conn, id)
    }

    async fn update_sub_link(
        &self,
        id: &RelationshipId,
        snapshot: &SubLinkSnapshot,
        modified_by: &str,
    ) -> Result<()> {
        let conn = self.conn().lock().unwrap();
        sublink::update_sub_link_sync(&conn, id, snapshot, modified_by)
    }

    async fn find_edges(&self, criteria: &RelationshipCriteria) -> Result<Vec<RelationshipEntry>> {
        let conn = self.conn().lock().unwrap();
        query::find_edges_sync(&conn, criteria)
    }

    async fn has_current_link(&self, node: &IrisObjectId, type_code: &str) -> Result<bool> {
        let conn = self.conn().lock().unwrap();
        query::has_current_link_sync(&conn, node, type_code)
    }

    async fn related_nodes_of_type(
        &self,
        node: &IrisObjectId,
        object_type: ObjectKind,
    ) -> Result<Vec<IrisObject>> {
        let conn = self.conn().lock().unwrap();
        query::related_nodes_of_type_sync(&conn, node, object_type)
    }
}
