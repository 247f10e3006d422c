//! SQLite implementation of ObjectStore

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::{params, Connection, Row};

use super::{unix_timestamp, SqliteStore};
use crate::ids::IrisObjectId;
use crate::store::traits::ObjectStore;
use crate::types::object::{IrisObject, ObjectKind};

/// Initialize the IRISObject table
pub(crate) fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Graph nodes; rows are never physically removed
        CREATE TABLE IF NOT EXISTS IRISObject (
            ID TEXT PRIMARY KEY,
            ObjectTypeCode TEXT NOT NULL,
            SubClass1 TEXT,
            SubClass2 TEXT,
            SubClass3 TEXT,
            LinkID TEXT NOT NULL,
            DateCreated INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS IX_IRISObject_Type ON IRISObject(ObjectTypeCode);
        CREATE INDEX IF NOT EXISTS IX_IRISObject_Link ON IRISObject(LinkID);
        "#,
    )?;
    Ok(())
}

pub(crate) const OBJECT_COLS: &str =
    "ID, ObjectTypeCode, SubClass1, SubClass2, SubClass3, LinkID, DateCreated";

/// Map an IRISObject row starting at column `base`
pub(crate) fn object_from_row(row: &Row<'_>, base: usize) -> rusqlite::Result<IrisObject> {
    let type_code: String = row.get(base + 1)?;
    let object_type = ObjectKind::parse_code(&type_code).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            base + 1,
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })?;
    Ok(IrisObject {
        id: row.get(base)?,
        object_type,
        sub_class1: row.get(base + 2)?,
        sub_class2: row.get(base + 3)?,
        sub_class3: row.get(base + 4)?,
        link_id: row.get(base + 5)?,
        date_created: row.get(base + 6)?,
    })
}

pub(crate) fn create_object_sync(conn: &Connection, object: &IrisObject) -> Result<IrisObjectId> {
    let now = unix_timestamp();
    conn.execute(
        "INSERT INTO IRISObject (ID, ObjectTypeCode, SubClass1, SubClass2, SubClass3, LinkID, DateCreated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            object.id,
            object.object_type.as_code(),
            object.sub_class1,
            object.sub_class2,
            object.sub_class3,
            object.link_id,
            now
        ],
    )?;
    Ok(object.id.clone())
}

pub(crate) fn get_object_sync(
    conn: &Connection,
    id: &IrisObjectId,
) -> Result<Option<IrisObject>> {
    let result = conn.query_row(
        &format!("SELECT {OBJECT_COLS} FROM IRISObject WHERE ID = ?1"),
        params![id],
        |row| object_from_row(row, 0),
    );
    match result {
        Ok(object) => Ok(Some(object)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl ObjectStore for SqliteStore {
    async fn create_object(&self, object: IrisObject) -> Result<IrisObjectId> {
        let conn = self.conn().lock().unwrap();
        create_object_sync(&conn, &object)
    }

    async fn get_object(&self, id: &IrisObjectId) -> Result<Option<IrisObject>> {
        let conn = self.conn().lock().unwrap();
        get_object_sync(&conn, id)
    }
}
