//! SQLite implementation of ComplianceStore
//!
//! Cascade targets of edge migration: compliance-authorisation links under
//! regime activities, their condition rows, and labour/equipment resource
//! assignments. Rows are soft-deleted (IsDeleted), never removed, so field
//! work recorded against them stays traceable.

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::{params, Connection, Row};

use super::{unix_timestamp, SqliteStore};
use crate::ids::{
    ComplianceAuthorisationId, ComplianceId, ConditionId, IrisObjectId, RegimeActivityId, RegimeId,
    ResourceAssignmentId,
};
use crate::store::traits::ComplianceStore;
use crate::types::compliance::{
    ComplianceAuthorisation, ComplianceCondition, Regime, RegimeActivity, RegimeActivityCompliance,
    ResourceAssignment, ResourceKind, INSPECTION_STATUS_IN_PROGRESS,
};

/// Initialize regime scaffolding and compliance cascade tables
pub(crate) fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS Regime (
            ID TEXT PRIMARY KEY,
            ScheduleTypeCode TEXT NOT NULL
        );

        -- Which activity status codes carry the open attribute
        CREATE TABLE IF NOT EXISTS RegimeActivityStatus (
            Code TEXT PRIMARY KEY,
            IsOpenStatus INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS RegimeActivity (
            ID TEXT PRIMARY KEY,
            RegimeID TEXT NOT NULL REFERENCES Regime(ID),
            StatusCode TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS IX_RegimeActivity_Regime ON RegimeActivity(RegimeID);

        CREATE TABLE IF NOT EXISTS RegimeActivityCompliance (
            ID TEXT PRIMARY KEY,
            RegimeActivityID TEXT NOT NULL UNIQUE REFERENCES RegimeActivity(ID)
        );

        CREATE TABLE IF NOT EXISTS RegimeActivityComplianceAuthorisation (
            ID TEXT PRIMARY KEY,
            RegimeActivityComplianceID TEXT NOT NULL
                REFERENCES RegimeActivityCompliance(ID),
            AuthorisationID TEXT NOT NULL,
            IsDeleted INTEGER NOT NULL DEFAULT 0,
            MobileInspectionStatus TEXT,
            DateCreated INTEGER NOT NULL,
            LastModified INTEGER
        );

        CREATE INDEX IF NOT EXISTS IX_ComplianceAuth_Compliance
            ON RegimeActivityComplianceAuthorisation(RegimeActivityComplianceID);
        CREATE INDEX IF NOT EXISTS IX_ComplianceAuth_Authorisation
            ON RegimeActivityComplianceAuthorisation(AuthorisationID);

        CREATE TABLE IF NOT EXISTS RegimeActivityComplianceCondition (
            ID TEXT PRIMARY KEY,
            RegimeActivityComplianceAuthorisationID TEXT NOT NULL
                REFERENCES RegimeActivityComplianceAuthorisation(ID),
            Code TEXT NOT NULL,
            ConditionText TEXT NOT NULL,
            IsDeleted INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS EstimationLabourAuthorisation (
            ID TEXT PRIMARY KEY,
            RegimeActivityComplianceID TEXT NOT NULL,
            AuthorisationID TEXT NOT NULL,
            IsDeleted INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS EquipmentMaterialAuthorisation (
            ID TEXT PRIMARY KEY,
            RegimeActivityComplianceID TEXT NOT NULL,
            AuthorisationID TEXT NOT NULL,
            IsDeleted INTEGER NOT NULL DEFAULT 0
        );

        -- Field work recorded against a compliance link
        CREATE TABLE IF NOT EXISTS FieldInspection (
            ID TEXT PRIMARY KEY,
            RegimeActivityComplianceAuthorisationID TEXT NOT NULL,
            Status TEXT NOT NULL,
            DateCreated INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS ComplianceObservation (
            ID TEXT PRIMARY KEY,
            RegimeActivityComplianceAuthorisationID TEXT NOT NULL,
            DateCreated INTEGER NOT NULL
        );
        "#,
    )?;
    Ok(())
}

fn compliance_auth_from_row(row: &Row<'_>) -> rusqlite::Result<ComplianceAuthorisation> {
    let is_deleted: i32 = row.get(3)?;
    Ok(ComplianceAuthorisation {
        id: row.get(0)?,
        compliance_id: row.get(1)?,
        authorisation_object_id: row.get(2)?,
        is_deleted: is_deleted != 0,
        mobile_inspection_status: row.get(4)?,
        date_created: row.get(5)?,
        last_modified: row.get(6)?,
    })
}

const COMPLIANCE_AUTH_COLS: &str = "ID, RegimeActivityComplianceID, AuthorisationID, \
     IsDeleted, MobileInspectionStatus, DateCreated, LastModified";

// ============================================================================
// Sync helpers (composable inside the migration transaction)
// ============================================================================

pub(crate) fn is_open_status_sync(conn: &Connection, code: &str) -> Result<bool> {
    let result = conn.query_row(
        "SELECT IsOpenStatus FROM RegimeActivityStatus WHERE Code = ?1",
        params![code],
        |row| row.get::<_, i32>(0),
    );
    match result {
        Ok(flag) => Ok(flag != 0),
        // Unknown status codes lack the open attribute
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn get_regime_sync(conn: &Connection, id: &RegimeId) -> Result<Option<Regime>> {
    let result = conn.query_row(
        "SELECT ID, ScheduleTypeCode FROM Regime WHERE ID = ?1",
        params![id],
        |row| {
            Ok(Regime {
                id: row.get(0)?,
                schedule_type_code: row.get(1)?,
            })
        },
    );
    match result {
        Ok(regime) => Ok(Some(regime)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn list_activities_sync(
    conn: &Connection,
    regime_id: &RegimeId,
) -> Result<Vec<RegimeActivity>> {
    let mut stmt = conn.prepare(
        "SELECT ID, RegimeID, StatusCode FROM RegimeActivity WHERE RegimeID = ?1 ORDER BY ID",
    )?;
    let rows = stmt.query_map(params![regime_id], |row| {
        Ok(RegimeActivity {
            id: row.get(0)?,
            regime_id: row.get(1)?,
            status_code: row.get(2)?,
        })
    })?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

pub(crate) fn get_compliance_for_activity_sync(
    conn: &Connection,
    activity_id: &RegimeActivityId,
) -> Result<Option<RegimeActivityCompliance>> {
    let result = conn.query_row(
        "SELECT ID, RegimeActivityID FROM RegimeActivityCompliance WHERE RegimeActivityID = ?1",
        params![activity_id],
        |row| {
            Ok(RegimeActivityCompliance {
                id: row.get(0)?,
                regime_activity_id: row.get(1)?,
            })
        },
    );
    match result {
        Ok(compliance) => Ok(Some(compliance)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn find_compliance_authorisation_sync(
    conn: &Connection,
    compliance_id: &ComplianceId,
    authorisation_object_id: &IrisObjectId,
) -> Result<Option<ComplianceAuthorisation>> {
    let result = conn.query_row(
        &format!(
            "SELECT {COMPLIANCE_AUTH_COLS} FROM RegimeActivityComplianceAuthorisation
             WHERE RegimeActivityComplianceID = ?1 AND AuthorisationID = ?2 AND IsDeleted = 0"
        ),
        params![compliance_id, authorisation_object_id],
        compliance_auth_from_row,
    );
    match result {
        Ok(link) => Ok(Some(link)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn create_compliance_authorisation_sync(
    conn: &Connection,
    compliance_id: &ComplianceId,
    authorisation_object_id: &IrisObjectId,
) -> Result<ComplianceAuthorisationId> {
    let id = ComplianceAuthorisationId::new();
    conn.execute(
        "INSERT INTO RegimeActivityComplianceAuthorisation
             (ID, RegimeActivityComplianceID, AuthorisationID, IsDeleted, DateCreated)
         VALUES (?1, ?2, ?3, 0, ?4)",
        params![id, compliance_id, authorisation_object_id, unix_timestamp()],
    )?;
    Ok(id)
}

pub(crate) fn soft_delete_compliance_authorisation_sync(
    conn: &Connection,
    id: &ComplianceAuthorisationId,
) -> Result<()> {
    conn.execute(
        "UPDATE RegimeActivityComplianceAuthorisation
         SET IsDeleted = 1, LastModified = ?1 WHERE ID = ?2",
        params![unix_timestamp(), id],
    )?;
    Ok(())
}

pub(crate) fn list_conditions_sync(
    conn: &Connection,
    compliance_authorisation_id: &ComplianceAuthorisationId,
) -> Result<Vec<ComplianceCondition>> {
    let mut stmt = conn.prepare(
        "SELECT ID, RegimeActivityComplianceAuthorisationID, Code, ConditionText, IsDeleted
         FROM RegimeActivityComplianceCondition
         WHERE RegimeActivityComplianceAuthorisationID = ?1 AND IsDeleted = 0
         ORDER BY Code",
    )?;
    let rows = stmt.query_map(params![compliance_authorisation_id], |row| {
        let is_deleted: i32 = row.get(4)?;
        Ok(ComplianceCondition {
            id: row.get(0)?,
            compliance_authorisation_id: row.get(1)?,
            code: row.get(2)?,
            text: row.get(3)?,
            is_deleted: is_deleted != 0,
        })
    })?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

pub(crate) fn add_condition_sync(
    conn: &Connection,
    compliance_authorisation_id: &ComplianceAuthorisationId,
    code: &str,
    text: &str,
) -> Result<ConditionId> {
    let id = ConditionId::new();
    conn.execute(
        "INSERT INTO RegimeActivityComplianceCondition
             (ID, RegimeActivityComplianceAuthorisationID, Code, ConditionText, IsDeleted)
         VALUES (?1, ?2, ?3, ?4, 0)",
        params![id, compliance_authorisation_id, code, text],
    )?;
    Ok(id)
}

pub(crate) fn list_resources_sync(
    conn: &Connection,
    compliance_id: &ComplianceId,
    authorisation_object_id: Option<&IrisObjectId>,
) -> Result<Vec<ResourceAssignment>> {
    let mut results = Vec::new();
    for kind in [ResourceKind::Labour, ResourceKind::Equipment] {
        let sql = format!(
            "SELECT ID, RegimeActivityComplianceID, AuthorisationID, IsDeleted
             FROM {} WHERE RegimeActivityComplianceID = ?1 AND IsDeleted = 0",
            kind.table()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![compliance_id], move |row| {
            let is_deleted: i32 = row.get(3)?;
            Ok(ResourceAssignment {
                id: row.get(0)?,
                kind,
                compliance_id: row.get(1)?,
                authorisation_object_id: row.get(2)?,
                is_deleted: is_deleted != 0,
            })
        })?;
        results.extend(rows.filter_map(|r| r.ok()));
    }
    if let Some(auth) = authorisation_object_id {
        results.retain(|r| &r.authorisation_object_id == auth);
    }
    Ok(results)
}

pub(crate) fn reassign_resource_sync(
    conn: &Connection,
    kind: ResourceKind,
    id: &ResourceAssignmentId,
    authorisation_object_id: &IrisObjectId,
) -> Result<()> {
    conn.execute(
        &format!("UPDATE {} SET AuthorisationID = ?1 WHERE ID = ?2", kind.table()),
        params![authorisation_object_id, id],
    )?;
    Ok(())
}

pub(crate) fn soft_delete_resource_sync(
    conn: &Connection,
    kind: ResourceKind,
    id: &ResourceAssignmentId,
) -> Result<()> {
    conn.execute(
        &format!("UPDATE {} SET IsDeleted = 1 WHERE ID = ?1", kind.table()),
        params![id],
    )?;
    Ok(())
}

pub(crate) fn has_inspection_in_progress_sync(
    conn: &Connection,
    compliance_authorisation_id: &ComplianceAuthorisationId,
) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM FieldInspection
         WHERE RegimeActivityComplianceAuthorisationID = ?1 AND Status = ?2",
        params![compliance_authorisation_id, INSPECTION_STATUS_IN_PROGRESS],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub(crate) fn has_recorded_observation_sync(
    conn: &Connection,
    compliance_authorisation_id: &ComplianceAuthorisationId,
) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM ComplianceObservation
         WHERE RegimeActivityComplianceAuthorisationID = ?1",
        params![compliance_authorisation_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

// ============================================================================
// ComplianceStore implementation
// ============================================================================

#[async_trait]
impl ComplianceStore for SqliteStore {
    async fn define_activity_status(&self, code: &str, is_open: bool) -> Result<()> {
        let conn = self.conn().lock().unwrap();
        conn.execute(
            "INSERT INTO RegimeActivityStatus (Code, IsOpenStatus) VALUES (?1, ?2)
             ON CONFLICT(Code) DO UPDATE SET IsOpenStatus = ?2",
            params![code, is_open as i32],
        )?;
        Ok(())
    }

    async fn create_regime(&self, regime: Regime) -> Result<RegimeId> {
        let conn = self.conn().lock().unwrap();
        conn.execute(
            "INSERT INTO Regime (ID, ScheduleTypeCode) VALUES (?1, ?2)",
            params![regime.id, regime.schedule_type_code],
        )?;
        Ok(regime.id)
    }

    async fn get_regime(&self, id: &RegimeId) -> Result<Option<Regime>> {
        let conn = self.conn().lock().unwrap();
        get_regime_sync(&conn, id)
    }

    async fn create_activity(&self, activity: RegimeActivity) -> Result<ComplianceId> {
        let mut conn = self.conn().lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO RegimeActivity (ID, RegimeID, StatusCode) VALUES (?1, ?2, ?3)",
            params![activity.id, activity.regime_id, activity.status_code],
        )?;
        let compliance_id = ComplianceId::new();
        tx.execute(
            "INSERT INTO RegimeActivityCompliance (ID, RegimeActivityID) VALUES (?1, ?2)",
            params![compliance_id, activity.id],
        )?;
        tx.commit()?;
        Ok(compliance_id)
    }

    async fn list_activities(&self, regime_id: &RegimeId) -> Result<Vec<RegimeActivity>> {
        let conn = self.conn().lock().unwrap();
        list_activities_sync(&conn, regime_id)
    }

    async fn create_compliance_authorisation(
        &self,
        compliance_id: &ComplianceId,
        authorisation_object_id: &IrisObjectId,
    ) -> Result<ComplianceAuthorisationId> {
        let conn = self.conn().lock().unwrap();
        create_compliance_authorisation_sync(&conn, compliance_id, authorisation_object_id)
    }

    async fn find_compliance_authorisation(
        &self,
        compliance_id: &ComplianceId,
        authorisation_object_id: &IrisObjectId,
    ) -> Result<Option<ComplianceAuthorisation>> {
        let conn = self.conn().lock().unwrap();
        find_compliance_authorisation_sync(&conn, compliance_id, authorisation_object_id)
    }

    async fn add_condition(
        &self,
        compliance_authorisation_id: &ComplianceAuthorisationId,
        code: &str,
        text: &str,
    ) -> Result<ConditionId> {
        let conn = self.conn().lock().unwrap();
        add_condition_sync(&conn, compliance_authorisation_id, code, text)
    }

    async fn list_conditions(
        &self,
        compliance_authorisation_id: &ComplianceAuthorisationId,
    ) -> Result<Vec<ComplianceCondition>> {
        let conn = self.conn().lock().unwrap();
        list_conditions_sync(&conn, compliance_authorisation_id)
    }

    async fn add_resource(
        &self,
        kind: ResourceKind,
        compliance_id: &ComplianceId,
        authorisation_object_id: &IrisObjectId,
    ) -> Result<ResourceAssignmentId> {
        let conn = self.conn().lock().unwrap();
        let id = ResourceAssignmentId::new();
        conn.execute(
            &format!(
                "INSERT INTO {} (ID, RegimeActivityComplianceID, AuthorisationID, IsDeleted)
                 VALUES (?1, ?2, ?3, 0)",
                kind.table()
            ),
            params![id, compliance_id, authorisation_object_id],
        )?;
        Ok(id)
    }

    async fn list_resources(
        &self,
        compliance_id: &ComplianceId,
        authorisation_object_id: Option<&IrisObjectId>,
    ) -> Result<Vec<ResourceAssignment>> {
        let conn = self.conn().lock().unwrap();
        list_resources_sync(&conn, compliance_id, authorisation_object_id)
    }

    async fn record_inspection(
        &self,
        compliance_authorisation_id: &ComplianceAuthorisationId,
        status: &str,
    ) -> Result<()> {
        let conn = self.conn().lock().unwrap();
        conn.execute(
            "INSERT INTO FieldInspection
                 (ID, RegimeActivityComplianceAuthorisationID, Status, DateCreated)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                uuid::Uuid::new_v4().to_string(),
                compliance_authorisation_id,
                status,
                unix_timestamp()
            ],
        )?;
        Ok(())
    }

    async fn has_inspection_in_progress(
        &self,
        compliance_authorisation_id: &ComplianceAuthorisationId,
    ) -> Result<bool> {
        let conn = self.conn().lock().unwrap();
        has_inspection_in_progress_sync(&conn, compliance_authorisation_id)
    }

    async fn record_observation(
        &self,
        compliance_authorisation_id: &ComplianceAuthorisationId,
    ) -> Result<()> {
        let conn = self.conn().lock().unwrap();
        conn.execute(
            "INSERT INTO ComplianceObservation
                 (ID, RegimeActivityComplianceAuthorisationID, DateCreated)
             VALUES (?1, ?2, ?3)",
            params![
                uuid::Uuid::new_v4().to_string(),
                compliance_authorisation_id,
                unix_timestamp()
            ],
        )?;
        Ok(())
    }

    async fn has_recorded_observation(
        &self,
        compliance_authorisation_id: &ComplianceAuthorisationId,
    ) -> Result<bool> {
        let conn = self.conn().lock().unwrap();
        has_recorded_observation_sync(&conn, compliance_authorisation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn activity_with_auth(
        store: &SqliteStore,
    ) -> (ComplianceId, ComplianceAuthorisationId, IrisObjectId) {
        store.define_activity_status("Scheduled", true).await.unwrap();
        let regime = Regime::new("Annual");
        let regime_id = store.create_regime(regime).await.unwrap();
        let compliance_id = store
            .create_activity(RegimeActivity::new(regime_id, "Scheduled"))
            .await
            .unwrap();
        let auth = IrisObjectId::new();
        let link = store
            .create_compliance_authorisation(&compliance_id, &auth)
            .await
            .unwrap();
        (compliance_id, link, auth)
    }

    #[tokio::test]
    async fn test_compliance_authorisation_lifecycle() {
        let store = SqliteStore::in_memory().unwrap();
        let (compliance_id, link_id, auth) = activity_with_auth(&store).await;

        let found = store
            .find_compliance_authorisation(&compliance_id, &auth)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, link_id);
        assert!(!found.is_deleted);

        {
            let conn = store.conn().lock().unwrap();
            soft_delete_compliance_authorisation_sync(&conn, &link_id).unwrap();
        }

        // Soft-deleted rows no longer resolve
        let gone = store
            .find_compliance_authorisation(&compliance_id, &auth)
            .await
            .unwrap();
        assert!(gone.is_none());
    }

    #[tokio::test]
    async fn test_conditions() {
        let store = SqliteStore::in_memory().unwrap();
        let (_, link_id, _) = activity_with_auth(&store).await;

        store
            .add_condition(&link_id, "C1", "Discharge limit 5 m3/day")
            .await
            .unwrap();
        store
            .add_condition(&link_id, "C2", "Annual reporting")
            .await
            .unwrap();

        let conditions = store.list_conditions(&link_id).await.unwrap();
        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[0].code, "C1");
    }

    #[tokio::test]
    async fn test_resources_listed_across_both_tables() {
        let store = SqliteStore::in_memory().unwrap();
        let (compliance_id, _, auth) = activity_with_auth(&store).await;

        store
            .add_resource(ResourceKind::Labour, &compliance_id, &auth)
            .await
            .unwrap();
        store
            .add_resource(ResourceKind::Equipment, &compliance_id, &auth)
            .await
            .unwrap();
        store
            .add_resource(ResourceKind::Labour, &compliance_id, &IrisObjectId::new())
            .await
            .unwrap();

        let all = store.list_resources(&compliance_id, None).await.unwrap();
        assert_eq!(all.len(), 3);

        let for_auth = store
            .list_resources(&compliance_id, Some(&auth))
            .await
            .unwrap();
        assert_eq!(for_auth.len(), 2);
    }

    #[tokio::test]
    async fn test_inspection_and_observation_predicates() {
        let store = SqliteStore::in_memory().unwrap();
        let (_, link_id, _) = activity_with_auth(&store).await;

        assert!(!store.has_inspection_in_progress(&link_id).await.unwrap());
        assert!(!store.has_recorded_observation(&link_id).await.unwrap());

        store
            .record_inspection(&link_id, INSPECTION_STATUS_IN_PROGRESS)
            .await
            .unwrap();
        store.record_observation(&link_id).await.unwrap();

        assert!(store.has_inspection_in_progress(&link_id).await.unwrap());
        assert!(store.has_recorded_observation(&link_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_completed_inspection_is_not_in_progress() {
        let store = SqliteStore::in_memory().unwrap();
        let (_, link_id, _) = activity_with_auth(&store).await;

        store.record_inspection(&link_id, "Completed").await.unwrap();
        assert!(!store.has_inspection_in_progress(&link_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_status_is_not_open() {
        let store = SqliteStore::in_memory().unwrap();
        let conn = store.conn().lock().unwrap();
        assert!(!is_open_status_sync(&conn, "Mystery").unwrap());
    }
}
