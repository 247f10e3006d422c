//! Compliance cascade records
//!
//! These are not edges in the graph sense but are cascade targets of edge
//! migration: when a programme or regime swaps one authorisation for
//! another, the compliance-authorisation rows and their dependent condition
//! and resource-assignment rows under each open regime activity are created,
//! reassigned or soft-deleted alongside the edge rewiring.

use serde::{Deserialize, Serialize};

use crate::ids::{
    ComplianceAuthorisationId, ComplianceId, ConditionId, IrisObjectId, RegimeActivityId, RegimeId,
    ResourceAssignmentId,
};

/// Schedule type code for regimes whose activities are never cascaded into
pub const SCHEDULE_TYPE_UNSCHEDULED: &str = "Unscheduled";

/// Field inspection status that blocks soft-deletion of a compliance link
pub const INSPECTION_STATUS_IN_PROGRESS: &str = "InProgress";

// ============================================================================
// Regime scaffolding
// ============================================================================

/// A regime record; `schedule_type_code` gates the migration cascade
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Regime {
    pub id: RegimeId,
    pub schedule_type_code: String,
}

impl Regime {
    pub fn new(schedule_type_code: impl Into<String>) -> Self {
        Self {
            id: RegimeId::new(),
            schedule_type_code: schedule_type_code.into(),
        }
    }

    /// Whether migration skips this regime's activities entirely
    pub fn is_unscheduled(&self) -> bool {
        self.schedule_type_code
            .eq_ignore_ascii_case(SCHEDULE_TYPE_UNSCHEDULED)
    }
}

/// A scheduled activity under a regime
///
/// `status_code` is resolved against the status attribute table; activities
/// whose latest status lacks the open attribute are immutable for migration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegimeActivity {
    pub id: RegimeActivityId,
    pub regime_id: RegimeId,
    pub status_code: String,
}

impl RegimeActivity {
    pub fn new(regime_id: RegimeId, status_code: impl Into<String>) -> Self {
        Self {
            id: RegimeActivityId::new(),
            regime_id,
            status_code: status_code.into(),
        }
    }
}

/// The compliance record owned by a regime activity
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegimeActivityCompliance {
    pub id: ComplianceId,
    pub regime_activity_id: RegimeActivityId,
}

// ============================================================================
// Compliance authorisation + dependents
// ============================================================================

/// Links a regime-activity compliance record to an authorisation node
///
/// Soft-deleted (never removed) by migration, and only when no in-progress
/// field inspection and no recorded observation reference it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ComplianceAuthorisation {
    pub id: ComplianceAuthorisationId,
    pub compliance_id: ComplianceId,
    /// Graph node id of the authorisation
    pub authorisation_object_id: IrisObjectId,
    pub is_deleted: bool,
    pub mobile_inspection_status: Option<String>,
    /// Unix timestamp (milliseconds) when created
    pub date_created: i64,
    /// Unix timestamp (milliseconds) of the last change
    pub last_modified: Option<i64>,
}

/// A condition attached to a compliance-authorisation link
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ComplianceCondition {
    pub id: ConditionId,
    pub compliance_authorisation_id: ComplianceAuthorisationId,
    pub code: String,
    pub text: String,
    pub is_deleted: bool,
}

// ============================================================================
// Resource assignments
// ============================================================================

/// The two resource-assignment tables cascaded by migration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceKind {
    /// EstimationLabourAuthorisation rows
    Labour,
    /// EquipmentMaterialAuthorisation rows
    Equipment,
}

impl ResourceKind {
    /// The persisted table for this kind
    pub fn table(&self) -> &'static str {
        match self {
            ResourceKind::Labour => "EstimationLabourAuthorisation",
            ResourceKind::Equipment => "EquipmentMaterialAuthorisation",
        }
    }
}

/// A labour or equipment row pointing at an authorisation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceAssignment {
    pub id: ResourceAssignmentId,
    pub kind: ResourceKind,
    pub compliance_id: ComplianceId,
    /// Graph node id of the authorisation
    pub authorisation_object_id: IrisObjectId,
    pub is_deleted: bool,
}
