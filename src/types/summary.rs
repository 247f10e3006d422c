//! Migration outcome reporting
//!
//! A migration returns a summary of what was linked, closed, skipped and
//! reassigned rather than a bare success flag, so callers can trace every
//! per-item decision the engine made.

use serde::{Deserialize, Serialize};

/// Why an item was deliberately left untouched
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// The regime's schedule type is "Unscheduled"
    UnscheduledRegime,
    /// The activity's latest status lacks the open attribute
    ClosedActivity,
    /// An in-progress field inspection references the link
    InspectionInProgress,
    /// An observation already recorded compliance against the link
    ObservationRecorded,
    /// A sibling programme/regime outside the selection still needs the
    /// original authorisation, so its edge stays open
    SiblingNotSelected,
    /// A contact/location is still justified by another open authorisation
    /// edge, so its edge stays open
    OtherAuthorisationLink,
}

/// One deliberate no-op, with the id of the item it concerns
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MigrationSkip {
    pub reason: SkipReason,
    /// Id of the skipped item (edge, activity, regime or compliance link)
    pub item: String,
}

/// What a bulk replacement actually did
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MigrationSummary {
    /// Open edges created (subject links and re-links)
    pub edges_created: u32,
    /// Edges closed with the action date
    pub edges_closed: u32,
    /// Sub-link snapshots updated in place on existing open edges
    pub sub_links_updated: u32,
    /// Compliance-authorisation rows created for the replacement
    pub compliance_created: u32,
    /// Original compliance-authorisation rows soft-deleted
    pub compliance_soft_deleted: u32,
    /// Condition rows copied onto new compliance links
    pub conditions_copied: u32,
    /// Labour/equipment rows reassigned to the replacement
    pub resources_reassigned: u32,
    /// Labour/equipment rows soft-deleted (detach mode)
    pub resources_soft_deleted: u32,
    /// Per-item business-rule no-ops
    pub skips: Vec<MigrationSkip>,
}

impl MigrationSummary {
    /// Record a per-item skip
    pub fn skip(&mut self, reason: SkipReason, item: impl Into<String>) {
        self.skips.push(MigrationSkip {
            reason,
            item: item.into(),
        });
    }

    /// Whether any item was skipped for the given reason
    pub fn skipped_for(&self, reason: SkipReason) -> bool {
        self.skips.iter().any(|s| s.reason == reason)
    }
}
