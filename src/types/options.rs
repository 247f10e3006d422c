//! Bulk-replace request shape
//!
//! An external workflow collaborator supplies a fully-resolved request:
//! selected programme/regime nodes, an action date, per-target contact and
//! location re-link choices, a condition-copy mode and the replace/add-only
//! flags. The engine consumes it as-is; no UI resolution happens here.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ids::{ConditionId, IrisObjectId, RelationshipTypeId};
use crate::types::sublink::SubLinkSnapshot;

/// Which condition rows to copy onto a freshly created compliance
/// authorisation for the replacement
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionCopyMode {
    /// Copy no conditions
    None,
    /// Copy every non-deleted condition of the original's link
    All,
    /// Copy only the named condition rows
    Selected(Vec<ConditionId>),
}

/// An explicit choice to carry a contact link over to a target
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContactRelink {
    /// Graph node of the contact
    pub contact_object_id: IrisObjectId,
    pub relationship_type_id: RelationshipTypeId,
    /// Snapshot values to stamp on the new or updated sub-link,
    /// copied verbatim from the original authorisation's sub-link
    pub snapshot: SubLinkSnapshot,
}

/// An explicit choice to carry a location link over to a target
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocationRelink {
    /// Graph node of the location
    pub location_object_id: IrisObjectId,
    pub relationship_type_id: RelationshipTypeId,
}

/// Input to the edge migration engine
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BulkReplaceAuthorisationOptions {
    /// Graph node of the authorisation being replaced
    pub original_authorisation_id: IrisObjectId,
    /// Graph node of the replacement; required when `replace` is set
    pub replacement_authorisation_id: Option<IrisObjectId>,
    /// Whether a replacement is being wired in (false = pure detach)
    pub replace: bool,
    /// Force add-only mode: the original's edges stay open regardless of
    /// the sibling-selection check
    pub add_only: bool,
    /// Date stamped on created edges and on closed edges' end dates
    pub action_date: NaiveDate,
    /// Programme nodes in scope for this invocation
    pub selected_programme_ids: Vec<IrisObjectId>,
    /// Regime nodes in scope for this invocation
    pub selected_regime_ids: Vec<IrisObjectId>,
    /// Contact re-link choices, keyed by target programme/regime node
    pub contact_relinks: HashMap<IrisObjectId, Vec<ContactRelink>>,
    /// Location re-link choices, keyed by target programme/regime node
    pub location_relinks: HashMap<IrisObjectId, Vec<LocationRelink>>,
    pub condition_copy_mode: ConditionCopyMode,
    /// Audit identity stamped on created rows
    pub performed_by: String,
}

impl BulkReplaceAuthorisationOptions {
    /// A replace request with no selections yet
    pub fn replace(
        original: IrisObjectId,
        replacement: IrisObjectId,
        action_date: NaiveDate,
    ) -> Self {
        Self {
            original_authorisation_id: original,
            replacement_authorisation_id: Some(replacement),
            replace: true,
            add_only: false,
            action_date,
            selected_programme_ids: Vec::new(),
            selected_regime_ids: Vec::new(),
            contact_relinks: HashMap::new(),
            location_relinks: HashMap::new(),
            condition_copy_mode: ConditionCopyMode::None,
            performed_by: "system".to_string(),
        }
    }

    /// A detach-only request (no replacement wired in)
    pub fn detach(original: IrisObjectId, action_date: NaiveDate) -> Self {
        Self {
            original_authorisation_id: original,
            replacement_authorisation_id: None,
            replace: false,
            add_only: false,
            action_date,
            selected_programme_ids: Vec::new(),
            selected_regime_ids: Vec::new(),
            contact_relinks: HashMap::new(),
            location_relinks: HashMap::new(),
            condition_copy_mode: ConditionCopyMode::None,
            performed_by: "system".to_string(),
        }
    }

    /// Select programme nodes
    pub fn with_programmes(mut self, ids: impl IntoIterator<Item = IrisObjectId>) -> Self {
        self.selected_programme_ids = ids.into_iter().collect();
        self
    }

    /// Select regime nodes
    pub fn with_regimes(mut self, ids: impl IntoIterator<Item = IrisObjectId>) -> Self {
        self.selected_regime_ids = ids.into_iter().collect();
        self
    }

    /// Add a contact re-link choice for a target
    pub fn with_contact_relink(mut self, target: IrisObjectId, relink: ContactRelink) -> Self {
        self.contact_relinks.entry(target).or_default().push(relink);
        self
    }

    /// Add a location re-link choice for a target
    pub fn with_location_relink(mut self, target: IrisObjectId, relink: LocationRelink) -> Self {
        self.location_relinks
            .entry(target)
            .or_default()
            .push(relink);
        self
    }

    /// Set the condition-copy mode
    pub fn with_condition_copy(mut self, mode: ConditionCopyMode) -> Self {
        self.condition_copy_mode = mode;
        self
    }

    /// Force add-only mode
    pub fn add_only(mut self) -> Self {
        self.add_only = true;
        self
    }

    /// Set the audit identity
    pub fn performed_by(mut self, user: impl Into<String>) -> Self {
        self.performed_by = user.into();
        self
    }

    /// Every selected target, programmes first
    pub fn selected_targets(&self) -> impl Iterator<Item = &IrisObjectId> {
        self.selected_programme_ids
            .iter()
            .chain(self.selected_regime_ids.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{ContactId, NameId};

    #[test]
    fn test_replace_builder() {
        let original = IrisObjectId::from_string("auth-a");
        let replacement = IrisObjectId::from_string("auth-b");
        let programme = IrisObjectId::from_string("prog-1");
        let date = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();

        let options =
            BulkReplaceAuthorisationOptions::replace(original.clone(), replacement, date)
                .with_programmes([programme.clone()])
                .with_condition_copy(ConditionCopyMode::All)
                .performed_by("jsmith");

        assert!(options.replace);
        assert!(!options.add_only);
        assert_eq!(options.performed_by, "jsmith");
        assert_eq!(options.selected_targets().count(), 1);
        assert_eq!(options.selected_targets().next(), Some(&programme));
    }

    #[test]
    fn test_detach_has_no_replacement() {
        let date = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        let options =
            BulkReplaceAuthorisationOptions::detach(IrisObjectId::from_string("auth-a"), date);
        assert!(!options.replace);
        assert!(options.replacement_authorisation_id.is_none());
    }

    #[test]
    fn test_relinks_grouped_by_target() {
        let date = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        let target = IrisObjectId::from_string("prog-1");
        let snapshot = SubLinkSnapshot {
            contact_id: ContactId::from_string("c-1"),
            name_id: NameId::from_string("n-1"),
            contact_address_id: None,
            phone_number_id: None,
            email_id: None,
            website_id: None,
        };

        let options =
            BulkReplaceAuthorisationOptions::detach(IrisObjectId::from_string("auth-a"), date)
                .with_contact_relink(
                    target.clone(),
                    ContactRelink {
                        contact_object_id: IrisObjectId::from_string("contact-node"),
                        relationship_type_id: RelationshipTypeId::from_string("t-1"),
                        snapshot: snapshot.clone(),
                    },
                )
                .with_contact_relink(
                    target.clone(),
                    ContactRelink {
                        contact_object_id: IrisObjectId::from_string("contact-node-2"),
                        relationship_type_id: RelationshipTypeId::from_string("t-1"),
                        snapshot,
                    },
                );

        assert_eq!(options.contact_relinks[&target].len(), 2);
    }
}
