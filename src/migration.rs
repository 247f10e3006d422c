//! Edge migration engine
//!
//! Replaces (or detaches) one authorisation across a selection of programme
//! and regime nodes: subject edges are rewired, contact/location edges are
//! carried over or closed, and compliance-authorisation rows under each open
//! regime activity are created, reassigned or soft-deleted. The whole
//! invocation is one transaction with a savepoint per target; a fatal error
//! rolls back everything, while business-rule skips are recorded in the
//! returned [`MigrationSummary`].

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{bail, Result};
use rusqlite::Connection;

use crate::catalog::TypeCatalog;
use crate::error::GraphError;
use crate::ids::{ComplianceAuthorisationId, ComplianceId, IrisObjectId, RegimeId};
use crate::query::{self, RelationshipCriteria};
use crate::store::sqlite::{compliance, object, sublink, SqliteStore};
use crate::store::sqlite::relationship::{close_edge_sync, find_open_edge_sync, insert_edge_sync};
use crate::types::object::{IrisObject, ObjectKind};
use crate::types::options::{BulkReplaceAuthorisationOptions, ConditionCopyMode};
use crate::types::relationship::{codes, RelationshipType};
use crate::types::summary::{MigrationSummary, SkipReason};

/// What to do with the replaced authorisation's links
enum Mode {
    /// Wire in the replacement node alongside the rewiring
    Replace(IrisObjectId),
    /// Pure detach; nothing is wired in
    Detach,
}

/// How the target's edge to the original authorisation is resolved
#[derive(Clone, Copy, PartialEq)]
enum Retention {
    /// Close it with the action date
    Close,
    /// Keep it open: the caller forced add-only mode
    KeepRequested,
    /// Keep it open: an unselected sibling still shares the original
    KeepForSibling,
}

/// Bulk authorisation replacement over the relationship graph
pub struct ReplaceAuthorisationEngine {
    store: Arc<SqliteStore>,
    catalog: Arc<TypeCatalog>,
}

impl ReplaceAuthorisationEngine {
    pub fn new(store: Arc<SqliteStore>, catalog: Arc<TypeCatalog>) -> Self {
        Self { store, catalog }
    }

    /// Run one bulk replacement as a single unit of work.
    ///
    /// Each selected programme/regime is processed under its own savepoint;
    /// any fatal error rolls the entire invocation back. Deliberate no-ops
    /// (unscheduled regimes, closed activities, in-flight field work) are
    /// reported in the summary, not raised.
    pub async fn run(
        &self,
        options: &BulkReplaceAuthorisationOptions,
    ) -> Result<MigrationSummary> {
        let mode = match (options.replace, &options.replacement_authorisation_id) {
            (true, Some(id)) => Mode::Replace(id.clone()),
            (true, None) => bail!("replace requested without a replacement authorisation"),
            (false, _) => Mode::Detach,
        };

        // Resolve subject types before taking the connection; the catalog
        // loads from the same store.
        let mut targets: Vec<(IrisObjectId, ObjectKind, RelationshipType)> = Vec::new();
        if !options.selected_programme_ids.is_empty() {
            let subject = self.catalog.resolve_type(
                ObjectKind::Programme,
                ObjectKind::Authorisation,
                Some(codes::PROGRAMME_SUBJECT),
            )?;
            for id in &options.selected_programme_ids {
                targets.push((id.clone(), ObjectKind::Programme, subject.clone()));
            }
        }
        if !options.selected_regime_ids.is_empty() {
            let subject = self.catalog.resolve_type(
                ObjectKind::Regime,
                ObjectKind::Authorisation,
                Some(codes::REGIME_SUBJECT),
            )?;
            for id in &options.selected_regime_ids {
                targets.push((id.clone(), ObjectKind::Regime, subject.clone()));
            }
        }

        tracing::info!(
            original = %options.original_authorisation_id,
            replace = options.replace,
            targets = targets.len(),
            "starting authorisation replacement"
        );

        let mut conn = self.store.conn().lock().unwrap();
        let mut tx = conn.transaction()?;
        let mut summary = MigrationSummary::default();

        let original = object::get_object_sync(&tx, &options.original_authorisation_id)?
            .ok_or_else(|| GraphError::ObjectNotFound(options.original_authorisation_id.clone()))?;
        if original.object_type != ObjectKind::Authorisation {
            bail!(
                "node {} is a {}, not an authorisation",
                original.id,
                original.object_type.as_code()
            );
        }
        if let Mode::Replace(replacement_id) = &mode {
            let replacement = object::get_object_sync(&tx, replacement_id)?
                .ok_or_else(|| GraphError::ObjectNotFound(replacement_id.clone()))?;
            if replacement.object_type != ObjectKind::Authorisation {
                bail!(
                    "node {} is a {}, not an authorisation",
                    replacement.id,
                    replacement.object_type.as_code()
                );
            }
        }

        let retention = if options.add_only {
            Retention::KeepRequested
        } else if unselected_sibling_remains(&tx, options, &original.id)? {
            Retention::KeepForSibling
        } else {
            Retention::Close
        };

        for (target_id, expected_kind, subject_type) in &targets {
            let sp = tx.savepoint()?;
            migrate_target(
                &sp,
                options,
                &mode,
                retention,
                &original,
                target_id,
                *expected_kind,
                subject_type,
                &mut summary,
            )?;
            sp.commit()?;
        }
        tx.commit()?;

        tracing::info!(
            edges_created = summary.edges_created,
            edges_closed = summary.edges_closed,
            compliance_created = summary.compliance_created,
            compliance_soft_deleted = summary.compliance_soft_deleted,
            skips = summary.skips.len(),
            "authorisation replacement finished"
        );
        Ok(summary)
    }
}

/// Whether some programme/regime outside the selection still shares an open
/// subject edge with the original authorisation
fn unselected_sibling_remains(
    conn: &Connection,
    options: &BulkReplaceAuthorisationOptions,
    original: &IrisObjectId,
) -> Result<bool> {
    let criteria = RelationshipCriteria::for_node(original.clone())
        .with_types([codes::PROGRAMME_SUBJECT, codes::REGIME_SUBJECT]);
    let selected: HashSet<&IrisObjectId> = options.selected_targets().collect();
    Ok(query::find_edges_sync(conn, &criteria)?
        .iter()
        .any(|entry| !selected.contains(&entry.opposite.id)))
}

#[allow(clippy::too_many_arguments)]
fn migrate_target(
    conn: &Connection,
    options: &BulkReplaceAuthorisationOptions,
    mode: &Mode,
    retention: Retention,
    original: &IrisObject,
    target_id: &IrisObjectId,
    expected_kind: ObjectKind,
    subject_type: &RelationshipType,
    summary: &mut MigrationSummary,
) -> Result<()> {
    let target = object::get_object_sync(conn, target_id)?
        .ok_or_else(|| GraphError::ObjectNotFound(target_id.clone()))?;
    if target.object_type != expected_kind {
        bail!(
            "selected node {} is a {}, expected {}",
            target.id,
            target.object_type.as_code(),
            expected_kind.as_code()
        );
    }

    // 1. Wire in the replacement and carry over the chosen contact/location
    //    edges
    if let Mode::Replace(replacement) = mode {
        if find_open_edge_sync(conn, &target.id, replacement, &subject_type.id)?.is_none() {
            insert_edge_sync(
                conn,
                &target.id,
                replacement,
                &subject_type.id,
                options.action_date,
                &options.performed_by,
            )?;
            summary.edges_created += 1;
        }

        for relink in options.contact_relinks.get(&target.id).into_iter().flatten() {
            match find_open_edge_sync(
                conn,
                &target.id,
                &relink.contact_object_id,
                &relink.relationship_type_id,
            )? {
                // The target already holds this contact link; restamp its
                // snapshot rather than duplicating the edge
                Some(edge) => {
                    sublink::update_sub_link_sync(
                        conn,
                        &edge.id,
                        &relink.snapshot,
                        &options.performed_by,
                    )?;
                    summary.sub_links_updated += 1;
                }
                None => {
                    let edge_id = insert_edge_sync(
                        conn,
                        &target.id,
                        &relink.contact_object_id,
                        &relink.relationship_type_id,
                        options.action_date,
                        &options.performed_by,
                    )?;
                    sublink::insert_sub_link_sync(
                        conn,
                        &edge_id,
                        &relink.snapshot,
                        &options.performed_by,
                    )?;
                    summary.edges_created += 1;
                }
            }
        }

        for relink in options.location_relinks.get(&target.id).into_iter().flatten() {
            if find_open_edge_sync(
                conn,
                &target.id,
                &relink.location_object_id,
                &relink.relationship_type_id,
            )?
            .is_none()
            {
                insert_edge_sync(
                    conn,
                    &target.id,
                    &relink.location_object_id,
                    &relink.relationship_type_id,
                    options.action_date,
                    &options.performed_by,
                )?;
                summary.edges_created += 1;
            }
        }
    }

    // 2. Close contact/location edges justified only via the original
    close_orphaned_side_links(conn, options, original, &target, summary)?;

    // 3. Cascade into compliance rows under the target's open activities
    let regime_ids: Vec<RegimeId> = match target.object_type {
        ObjectKind::Regime => vec![RegimeId::from_string(target.link_id.as_str())],
        _ => query::related_nodes_of_type_sync(conn, &target.id, ObjectKind::Regime)?
            .into_iter()
            .map(|node| RegimeId::from_string(node.link_id))
            .collect(),
    };
    for regime_id in &regime_ids {
        cascade_regime(conn, options, mode, original, regime_id, summary)?;
    }

    // 4. Resolve the target's edge to the original
    if let Some(edge) = find_open_edge_sync(conn, &target.id, &original.id, &subject_type.id)? {
        match retention {
            Retention::Close => {
                close_edge_sync(conn, &edge.id, options.action_date)?;
                summary.edges_closed += 1;
            }
            Retention::KeepRequested => {}
            Retention::KeepForSibling => {
                tracing::warn!(
                    target = %target.id,
                    edge = %edge.id,
                    "original authorisation still shared by an unselected sibling; edge kept open"
                );
                summary.skip(SkipReason::SiblingNotSelected, edge.id.as_str());
            }
        }
    }

    Ok(())
}

/// Close the target's open contact/location edges whose only currently-open
/// authorisation justification is the original. Edges named in an explicit
/// re-link choice are left alone.
fn close_orphaned_side_links(
    conn: &Connection,
    options: &BulkReplaceAuthorisationOptions,
    original: &IrisObject,
    target: &IrisObject,
    summary: &mut MigrationSummary,
) -> Result<()> {
    let mut exempt: HashSet<&IrisObjectId> = HashSet::new();
    for relink in options.contact_relinks.get(&target.id).into_iter().flatten() {
        exempt.insert(&relink.contact_object_id);
    }
    for relink in options.location_relinks.get(&target.id).into_iter().flatten() {
        exempt.insert(&relink.location_object_id);
    }

    let criteria = RelationshipCriteria::for_node(target.id.clone());
    for entry in query::find_edges_sync(conn, &criteria)? {
        if !matches!(
            entry.opposite.object_type,
            ObjectKind::Contact | ObjectKind::Location
        ) {
            continue;
        }
        if exempt.contains(&entry.opposite.id) {
            continue;
        }

        let authorisations =
            query::related_nodes_of_type_sync(conn, &entry.opposite.id, ObjectKind::Authorisation)?;
        if !authorisations.iter().any(|a| a.id == original.id) {
            // Not justified via the original at all
            continue;
        }
        if authorisations.iter().any(|a| a.id != original.id) {
            tracing::warn!(
                edge = %entry.relationship.id,
                node = %entry.opposite.id,
                "side link kept open; another authorisation still justifies it"
            );
            summary.skip(
                SkipReason::OtherAuthorisationLink,
                entry.relationship.id.as_str(),
            );
            continue;
        }

        close_edge_sync(conn, &entry.relationship.id, options.action_date)?;
        summary.edges_closed += 1;
    }
    Ok(())
}

fn cascade_regime(
    conn: &Connection,
    options: &BulkReplaceAuthorisationOptions,
    mode: &Mode,
    original: &IrisObject,
    regime_id: &RegimeId,
    summary: &mut MigrationSummary,
) -> Result<()> {
    let Some(regime) = compliance::get_regime_sync(conn, regime_id)? else {
        tracing::warn!(regime = %regime_id, "regime record missing; cascade skipped");
        return Ok(());
    };
    if regime.is_unscheduled() {
        tracing::warn!(regime = %regime.id, "unscheduled regime; cascade skipped");
        summary.skip(SkipReason::UnscheduledRegime, regime.id.as_str());
        return Ok(());
    }

    for activity in compliance::list_activities_sync(conn, &regime.id)? {
        if !compliance::is_open_status_sync(conn, &activity.status_code)? {
            tracing::warn!(
                activity = %activity.id,
                status = %activity.status_code,
                "activity status is not open; left untouched"
            );
            summary.skip(SkipReason::ClosedActivity, activity.id.as_str());
            continue;
        }
        let Some(record) = compliance::get_compliance_for_activity_sync(conn, &activity.id)?
        else {
            tracing::warn!(activity = %activity.id, "activity has no compliance record");
            continue;
        };
        cascade_compliance(conn, options, mode, original, &record.id, summary)?;
    }
    Ok(())
}

fn cascade_compliance(
    conn: &Connection,
    options: &BulkReplaceAuthorisationOptions,
    mode: &Mode,
    original: &IrisObject,
    compliance_id: &ComplianceId,
    summary: &mut MigrationSummary,
) -> Result<()> {
    // a. Compliance-authorisation row for the replacement, conditions copied
    //    only on create
    if let Mode::Replace(replacement) = mode {
        if compliance::find_compliance_authorisation_sync(conn, compliance_id, replacement)?
            .is_none()
        {
            let new_link =
                compliance::create_compliance_authorisation_sync(conn, compliance_id, replacement)?;
            summary.compliance_created += 1;

            if let Some(original_link) =
                compliance::find_compliance_authorisation_sync(conn, compliance_id, &original.id)?
            {
                copy_conditions(
                    conn,
                    &options.condition_copy_mode,
                    &original_link.id,
                    &new_link,
                    summary,
                )?;
            }
        }
    }

    // b. Labour/equipment rows pointing at the original
    for resource in compliance::list_resources_sync(conn, compliance_id, Some(&original.id))? {
        match mode {
            Mode::Replace(replacement) => {
                compliance::reassign_resource_sync(conn, resource.kind, &resource.id, replacement)?;
                summary.resources_reassigned += 1;
            }
            Mode::Detach => {
                compliance::soft_delete_resource_sync(conn, resource.kind, &resource.id)?;
                summary.resources_soft_deleted += 1;
            }
        }
    }

    // c. The original's row goes only if no field work references it
    if let Some(original_link) =
        compliance::find_compliance_authorisation_sync(conn, compliance_id, &original.id)?
    {
        if compliance::has_inspection_in_progress_sync(conn, &original_link.id)? {
            tracing::warn!(
                link = %original_link.id,
                "in-progress inspection references the link; kept"
            );
            summary.skip(SkipReason::InspectionInProgress, original_link.id.as_str());
        } else if compliance::has_recorded_observation_sync(conn, &original_link.id)? {
            tracing::warn!(
                link = %original_link.id,
                "recorded observation references the link; kept"
            );
            summary.skip(SkipReason::ObservationRecorded, original_link.id.as_str());
        } else {
            compliance::soft_delete_compliance_authorisation_sync(conn, &original_link.id)?;
            summary.compliance_soft_deleted += 1;
        }
    }
    Ok(())
}

fn copy_conditions(
    conn: &Connection,
    mode: &ConditionCopyMode,
    from: &ComplianceAuthorisationId,
    to: &ComplianceAuthorisationId,
    summary: &mut MigrationSummary,
) -> Result<()> {
    if matches!(mode, ConditionCopyMode::None) {
        return Ok(());
    }
    for condition in compliance::list_conditions_sync(conn, from)? {
        let wanted = match mode {
            ConditionCopyMode::None => false,
            ConditionCopyMode::All => true,
            ConditionCopyMode::Selected(ids) => ids.contains(&condition.id),
        };
        if wanted {
            compliance::add_condition_sync(conn, to, &condition.code, &condition.text)?;
            summary.conditions_copied += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TypeSource;
    use crate::ids::{ComplianceAuthorisationId, RelationshipTypeId};
    use crate::store::traits::{
        ComplianceStore, LinkRequest, ObjectStore, RelationshipStore,
    };
    use crate::types::compliance::{
        Regime, RegimeActivity, ResourceKind, INSPECTION_STATUS_IN_PROGRESS,
    };
    use chrono::NaiveDate;

    struct Fixture {
        store: Arc<SqliteStore>,
        engine: ReplaceAuthorisationEngine,
        original: IrisObjectId,
        replacement: IrisObjectId,
        regime_subject: RelationshipTypeId,
        action_date: NaiveDate,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let catalog = Arc::new(TypeCatalog::new(store.clone() as Arc<dyn TypeSource>));
        let engine = ReplaceAuthorisationEngine::new(store.clone(), catalog);

        store
            .define_type(RelationshipType::new(
                codes::PROGRAMME_SUBJECT,
                "Subject of",
                ObjectKind::Programme,
                ObjectKind::Authorisation,
            ))
            .await
            .unwrap();
        let regime_subject = store
            .define_type(RelationshipType::new(
                codes::REGIME_SUBJECT,
                "Subject of",
                ObjectKind::Regime,
                ObjectKind::Authorisation,
            ))
            .await
            .unwrap();

        store.define_activity_status("Scheduled", true).await.unwrap();
        store.define_activity_status("Completed", false).await.unwrap();

        let original = store
            .create_object(IrisObject::new(ObjectKind::Authorisation, "auth-a"))
            .await
            .unwrap();
        let replacement = store
            .create_object(IrisObject::new(ObjectKind::Authorisation, "auth-b"))
            .await
            .unwrap();

        Fixture {
            store,
            engine,
            original,
            replacement,
            regime_subject,
            action_date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
        }
    }

    impl Fixture {
        /// A regime node linked to the original, with one activity and a
        /// compliance-authorisation row for the original
        async fn regime_target(
            &self,
            schedule: &str,
            status: &str,
        ) -> (IrisObjectId, ComplianceId, ComplianceAuthorisationId) {
            let regime_record = self
                .store
                .create_regime(Regime::new(schedule))
                .await
                .unwrap();
            let compliance_id = self
                .store
                .create_activity(RegimeActivity::new(regime_record.clone(), status))
                .await
                .unwrap();
            let node = self
                .store
                .create_object(IrisObject::new(ObjectKind::Regime, regime_record.as_str()))
                .await
                .unwrap();
            self.store
                .link(LinkRequest {
                    object_id: node.clone(),
                    related_object_id: self.original.clone(),
                    relationship_type_id: self.regime_subject.clone(),
                    current_from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                    sub_link: None,
                    created_by: "test".into(),
                })
                .await
                .unwrap();
            let link = self
                .store
                .create_compliance_authorisation(&compliance_id, &self.original)
                .await
                .unwrap();
            (node, compliance_id, link)
        }

        fn replace_options(&self) -> BulkReplaceAuthorisationOptions {
            BulkReplaceAuthorisationOptions::replace(
                self.original.clone(),
                self.replacement.clone(),
                self.action_date,
            )
        }

        async fn open_edges(&self, node: &IrisObjectId) -> Vec<crate::query::RelationshipEntry> {
            self.store
                .find_edges(&RelationshipCriteria::for_node(node.clone()))
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_full_replace_on_regime() {
        let f = fixture().await;
        let (node, compliance_id, original_link) = f.regime_target("Annual", "Scheduled").await;
        f.store
            .add_condition(&original_link, "C1", "Discharge limit")
            .await
            .unwrap();
        f.store
            .add_resource(ResourceKind::Labour, &compliance_id, &f.original)
            .await
            .unwrap();

        let summary = f
            .engine
            .run(
                &f.replace_options()
                    .with_regimes([node.clone()])
                    .with_condition_copy(ConditionCopyMode::All),
            )
            .await
            .unwrap();

        assert_eq!(summary.edges_created, 1);
        assert_eq!(summary.edges_closed, 1);
        assert_eq!(summary.compliance_created, 1);
        assert_eq!(summary.compliance_soft_deleted, 1);
        assert_eq!(summary.conditions_copied, 1);
        assert_eq!(summary.resources_reassigned, 1);
        assert!(summary.skips.is_empty());

        // Only the replacement subject edge remains open
        let open = f.open_edges(&node).await;
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].opposite.id, f.replacement);

        // Original's compliance row is gone, the replacement's carries the
        // copied condition
        assert!(f
            .store
            .find_compliance_authorisation(&compliance_id, &f.original)
            .await
            .unwrap()
            .is_none());
        let new_link = f
            .store
            .find_compliance_authorisation(&compliance_id, &f.replacement)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(f.store.list_conditions(&new_link.id).await.unwrap().len(), 1);

        let resources = f
            .store
            .list_resources(&compliance_id, Some(&f.replacement))
            .await
            .unwrap();
        assert_eq!(resources.len(), 1);
    }

    #[tokio::test]
    async fn test_unselected_sibling_keeps_edge_open() {
        let f = fixture().await;
        let (selected, _, _) = f.regime_target("Annual", "Scheduled").await;
        let (_unselected, _, _) = f.regime_target("Annual", "Scheduled").await;

        let summary = f
            .engine
            .run(&f.replace_options().with_regimes([selected.clone()]))
            .await
            .unwrap();

        assert!(summary.skipped_for(SkipReason::SiblingNotSelected));
        assert_eq!(summary.edges_closed, 0);

        // Original and replacement subject edges both open on the selected
        // target
        let open = f.open_edges(&selected).await;
        assert_eq!(open.len(), 2);
        assert!(open.iter().any(|e| e.opposite.id == f.original));
        assert!(open.iter().any(|e| e.opposite.id == f.replacement));
    }

    #[tokio::test]
    async fn test_explicit_add_only_keeps_edge_without_skip() {
        let f = fixture().await;
        let (node, _, _) = f.regime_target("Annual", "Scheduled").await;

        let summary = f
            .engine
            .run(&f.replace_options().with_regimes([node.clone()]).add_only())
            .await
            .unwrap();

        assert_eq!(summary.edges_closed, 0);
        assert!(!summary.skipped_for(SkipReason::SiblingNotSelected));
        assert_eq!(f.open_edges(&node).await.len(), 2);
    }

    #[tokio::test]
    async fn test_closed_activity_untouched() {
        let f = fixture().await;
        let (node, compliance_id, _) = f.regime_target("Annual", "Completed").await;

        let summary = f
            .engine
            .run(&f.replace_options().with_regimes([node.clone()]))
            .await
            .unwrap();

        assert!(summary.skipped_for(SkipReason::ClosedActivity));
        assert_eq!(summary.compliance_created, 0);
        // The original's compliance row survives; the subject edge still
        // moves over
        assert!(f
            .store
            .find_compliance_authorisation(&compliance_id, &f.original)
            .await
            .unwrap()
            .is_some());
        assert_eq!(summary.edges_closed, 1);
    }

    #[tokio::test]
    async fn test_unscheduled_regime_skips_cascade() {
        let f = fixture().await;
        let (node, compliance_id, _) = f.regime_target("Unscheduled", "Scheduled").await;

        let summary = f
            .engine
            .run(&f.replace_options().with_regimes([node.clone()]))
            .await
            .unwrap();

        assert!(summary.skipped_for(SkipReason::UnscheduledRegime));
        assert_eq!(summary.compliance_created, 0);
        assert!(f
            .store
            .find_compliance_authorisation(&compliance_id, &f.original)
            .await
            .unwrap()
            .is_some());
        // Edge rewiring is independent of the cascade gate
        assert_eq!(summary.edges_created, 1);
        assert_eq!(summary.edges_closed, 1);
    }

    #[tokio::test]
    async fn test_inspection_in_progress_preserves_link() {
        let f = fixture().await;
        let (node, compliance_id, original_link) = f.regime_target("Annual", "Scheduled").await;
        f.store
            .record_inspection(&original_link, INSPECTION_STATUS_IN_PROGRESS)
            .await
            .unwrap();

        let summary = f
            .engine
            .run(&f.replace_options().with_regimes([node]))
            .await
            .unwrap();

        assert!(summary.skipped_for(SkipReason::InspectionInProgress));
        assert_eq!(summary.compliance_soft_deleted, 0);
        // The replacement row is still wired in alongside
        assert_eq!(summary.compliance_created, 1);
        assert!(f
            .store
            .find_compliance_authorisation(&compliance_id, &f.original)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_detach_with_inspection_in_progress_preserves_link() {
        let f = fixture().await;
        let (node, compliance_id, original_link) = f.regime_target("Annual", "Scheduled").await;
        f.store
            .record_inspection(&original_link, INSPECTION_STATUS_IN_PROGRESS)
            .await
            .unwrap();

        let summary = f
            .engine
            .run(
                &BulkReplaceAuthorisationOptions::detach(f.original.clone(), f.action_date)
                    .with_regimes([node]),
            )
            .await
            .unwrap();

        // The in-progress inspection guards the row even with no replacement
        assert!(summary.skipped_for(SkipReason::InspectionInProgress));
        assert_eq!(summary.compliance_soft_deleted, 0);
        assert_eq!(summary.compliance_created, 0);
        assert!(f
            .store
            .find_compliance_authorisation(&compliance_id, &f.original)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_recorded_observation_preserves_link() {
        let f = fixture().await;
        let (node, compliance_id, original_link) = f.regime_target("Annual", "Scheduled").await;
        f.store.record_observation(&original_link).await.unwrap();

        let summary = f
            .engine
            .run(&f.replace_options().with_regimes([node]))
            .await
            .unwrap();

        assert!(summary.skipped_for(SkipReason::ObservationRecorded));
        assert_eq!(summary.compliance_soft_deleted, 0);
        assert!(f
            .store
            .find_compliance_authorisation(&compliance_id, &f.original)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_detach_soft_deletes_resources() {
        let f = fixture().await;
        let (node, compliance_id, _) = f.regime_target("Annual", "Scheduled").await;
        f.store
            .add_resource(ResourceKind::Equipment, &compliance_id, &f.original)
            .await
            .unwrap();

        let summary = f
            .engine
            .run(
                &BulkReplaceAuthorisationOptions::detach(f.original.clone(), f.action_date)
                    .with_regimes([node.clone()]),
            )
            .await
            .unwrap();

        assert_eq!(summary.edges_created, 0);
        assert_eq!(summary.edges_closed, 1);
        assert_eq!(summary.resources_soft_deleted, 1);
        assert_eq!(summary.compliance_soft_deleted, 1);
        assert!(f.open_edges(&node).await.is_empty());
        assert!(f
            .store
            .list_resources(&compliance_id, None)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_selected_condition_copy() {
        let f = fixture().await;
        let (node, compliance_id, original_link) = f.regime_target("Annual", "Scheduled").await;
        let keep = f
            .store
            .add_condition(&original_link, "C1", "Discharge limit")
            .await
            .unwrap();
        f.store
            .add_condition(&original_link, "C2", "Annual reporting")
            .await
            .unwrap();

        let summary = f
            .engine
            .run(
                &f.replace_options()
                    .with_regimes([node])
                    .with_condition_copy(ConditionCopyMode::Selected(vec![keep])),
            )
            .await
            .unwrap();

        assert_eq!(summary.conditions_copied, 1);
        let new_link = f
            .store
            .find_compliance_authorisation(&compliance_id, &f.replacement)
            .await
            .unwrap()
            .unwrap();
        let copied = f.store.list_conditions(&new_link.id).await.unwrap();
        assert_eq!(copied.len(), 1);
        assert_eq!(copied[0].code, "C1");
    }

    #[tokio::test]
    async fn test_replace_requires_replacement() {
        let f = fixture().await;
        let mut options =
            BulkReplaceAuthorisationOptions::detach(f.original.clone(), f.action_date);
        options.replace = true;

        assert!(f.engine.run(&options).await.is_err());
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let f = fixture().await;
        let (node, compliance_id, _) = f.regime_target("Annual", "Scheduled").await;

        let options = f.replace_options().with_regimes([node.clone()]);
        f.engine.run(&options).await.unwrap();
        let second = f.engine.run(&options).await.unwrap();

        // Everything was already rewired; nothing is created or closed twice
        assert_eq!(second.edges_created, 0);
        assert_eq!(second.edges_closed, 0);
        assert_eq!(second.compliance_created, 0);
        assert_eq!(f.open_edges(&node).await.len(), 1);
        assert!(f
            .store
            .find_compliance_authorisation(&compliance_id, &f.replacement)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_missing_original_rolls_back() {
        let f = fixture().await;
        let options = BulkReplaceAuthorisationOptions::replace(
            IrisObjectId::from_string("no-such-node"),
            f.replacement.clone(),
            f.action_date,
        );
        let err = f.engine.run(&options).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GraphError>().unwrap(),
            GraphError::ObjectNotFound(_)
        ));
    }
}
