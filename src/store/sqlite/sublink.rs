//! SQLite implementation of ContactStore and sub-link rows
//!
//! Sub-link snapshots are copied by value: the row stores the component ids
//! that were current at link time, and nothing here follows the canonical
//! contact record afterwards.

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::{params, Connection, Row};

use super::{unix_timestamp, SqliteStore};
use crate::error::GraphError;
use crate::ids::{ContactId, RelationshipId, SubLinkId};
use crate::store::traits::ContactStore;
use crate::types::sublink::{Contact, ContactSubLink, SubLinkSnapshot};

/// Initialize contact and sub-link tables
pub(crate) fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Canonical contact record: the component ids currently in effect
        CREATE TABLE IF NOT EXISTS Contact (
            ID TEXT PRIMARY KEY,
            CurrentNameID TEXT NOT NULL,
            CurrentAddressID TEXT,
            CurrentPhoneID TEXT,
            CurrentEmailID TEXT,
            CurrentWebsiteID TEXT
        );

        -- Point-in-time snapshot owned by exactly one edge
        CREATE TABLE IF NOT EXISTS ContactSubLink (
            ID TEXT PRIMARY KEY,
            ActivityObjectRelationshipID TEXT NOT NULL UNIQUE
                REFERENCES ActivityObjectRelationship(ID),
            ContactID TEXT NOT NULL,
            NameID TEXT NOT NULL,
            ContactAddressID TEXT,
            PhoneNumberID TEXT,
            EmailID TEXT,
            WebsiteID TEXT,
            CreatedBy TEXT NOT NULL,
            DateCreated INTEGER NOT NULL,
            ModifiedBy TEXT,
            LastModified INTEGER
        );

        CREATE INDEX IF NOT EXISTS IX_ContactSubLink_Contact ON ContactSubLink(ContactID);
        "#,
    )?;
    Ok(())
}

fn sub_link_from_row(row: &Row<'_>) -> rusqlite::Result<ContactSubLink> {
    Ok(ContactSubLink {
        id: row.get(0)?,
        relationship_id: row.get(1)?,
        snapshot: SubLinkSnapshot {
            contact_id: row.get(2)?,
            name_id: row.get(3)?,
            contact_address_id: row.get(4)?,
            phone_number_id: row.get(5)?,
            email_id: row.get(6)?,
            website_id: row.get(7)?,
        },
        created_by: row.get(8)?,
        date_created: row.get(9)?,
        modified_by: row.get(10)?,
        last_modified: row.get(11)?,
    })
}

const SUB_LINK_COLS: &str = "ID, ActivityObjectRelationshipID, ContactID, NameID, \
     ContactAddressID, PhoneNumberID, EmailID, WebsiteID, CreatedBy, DateCreated, \
     ModifiedBy, LastModified";

pub(crate) fn insert_sub_link_sync(
    conn: &Connection,
    relationship_id: &RelationshipId,
    snapshot: &SubLinkSnapshot,
    created_by: &str,
) -> Result<SubLinkId> {
    let id = SubLinkId::new();
    conn.execute(
        "INSERT INTO ContactSubLink
             (ID, ActivityObjectRelationshipID, ContactID, NameID, ContactAddressID,
              PhoneNumberID, EmailID, WebsiteID, CreatedBy, DateCreated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            id,
            relationship_id,
            snapshot.contact_id,
            snapshot.name_id,
            snapshot.contact_address_id,
            snapshot.phone_number_id,
            snapshot.email_id,
            snapshot.website_id,
            created_by,
            unix_timestamp()
        ],
    )?;
    Ok(id)
}

pub(crate) fn get_sub_link_sync(
    conn: &Connection,
    relationship_id: &RelationshipId,
) -> Result<Option<ContactSubLink>> {
    let result = conn.query_row(
        &format!(
            "SELECT {SUB_LINK_COLS} FROM ContactSubLink
             WHERE ActivityObjectRelationshipID = ?1"
        ),
        params![relationship_id],
        sub_link_from_row,
    );
    match result {
        Ok(link) => Ok(Some(link)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Overwrite the snapshot component ids of an edge's sub-link in place
pub(crate) fn update_sub_link_sync(
    conn: &Connection,
    relationship_id: &RelationshipId,
    snapshot: &SubLinkSnapshot,
    modified_by: &str,
) -> Result<()> {
    let changed = conn.execute(
        "UPDATE ContactSubLink
         SET ContactID = ?1, NameID = ?2, ContactAddressID = ?3, PhoneNumberID = ?4,
             EmailID = ?5, WebsiteID = ?6, ModifiedBy = ?7, LastModified = ?8
         WHERE ActivityObjectRelationshipID = ?9",
        params![
            snapshot.contact_id,
            snapshot.name_id,
            snapshot.contact_address_id,
            snapshot.phone_number_id,
            snapshot.email_id,
            snapshot.website_id,
            modified_by,
            unix_timestamp(),
            relationship_id
        ],
    )?;
    if changed == 0 {
        return Err(GraphError::RelationshipNotFound(relationship_id.clone()).into());
    }
    Ok(())
}

// ============================================================================
// ContactStore implementation
// ============================================================================

pub(crate) fn get_contact_sync(conn: &Connection, id: &ContactId) -> Result<Option<Contact>> {
    let result = conn.query_row(
        "SELECT ID, CurrentNameID, CurrentAddressID, CurrentPhoneID, CurrentEmailID,
                CurrentWebsiteID
         FROM Contact WHERE ID = ?1",
        params![id],
        |row| {
            Ok(Contact {
                id: row.get(0)?,
                current_name_id: row.get(1)?,
                current_address_id: row.get(2)?,
                current_phone_id: row.get(3)?,
                current_email_id: row.get(4)?,
                current_website_id: row.get(5)?,
            })
        },
    );
    match result {
        Ok(contact) => Ok(Some(contact)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl ContactStore for SqliteStore {
    async fn create_contact(&self, contact: Contact) -> Result<ContactId> {
        let conn = self.conn().lock().unwrap();
        conn.execute(
            "INSERT INTO Contact
                 (ID, CurrentNameID, CurrentAddressID, CurrentPhoneID, CurrentEmailID,
                  CurrentWebsiteID)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                contact.id,
                contact.current_name_id,
                contact.current_address_id,
                contact.current_phone_id,
                contact.current_email_id,
                contact.current_website_id
            ],
        )?;
        Ok(contact.id)
    }

    async fn get_contact(&self, id: &ContactId) -> Result<Option<Contact>> {
        let conn = self.conn().lock().unwrap();
        get_contact_sync(&conn, id)
    }

    async fn update_contact(&self, contact: &Contact) -> Result<()> {
        let conn = self.conn().lock().unwrap();
        let changed = conn.execute(
            "UPDATE Contact
             SET CurrentNameID = ?1, CurrentAddressID = ?2, CurrentPhoneID = ?3,
                 CurrentEmailID = ?4, CurrentWebsiteID = ?5
             WHERE ID = ?6",
            params![
                contact.current_name_id,
                contact.current_address_id,
                contact.current_phone_id,
                contact.current_email_id,
                contact.current_website_id,
                contact.id
            ],
        )?;
        if changed == 0 {
            return Err(GraphError::ContactNotFound(contact.id.clone()).into());
        }
        Ok(())
    }
}
