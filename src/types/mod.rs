//! Domain model for the relationship graph and its cascade targets

pub mod compliance;
pub mod object;
pub mod options;
pub mod relationship;
pub mod sublink;
pub mod summary;

pub use compliance::{
    ComplianceAuthorisation, ComplianceCondition, Regime, RegimeActivity, RegimeActivityCompliance,
    ResourceAssignment, ResourceKind, SCHEDULE_TYPE_UNSCHEDULED,
};
pub use object::{IrisObject, ObjectKind};
pub use options::{
    BulkReplaceAuthorisationOptions, ConditionCopyMode, ContactRelink, LocationRelink,
};
pub use relationship::{codes, Relationship, RelationshipType};
pub use sublink::{Contact, ContactSubLink, SubLinkSnapshot};
pub use summary::{MigrationSkip, MigrationSummary, SkipReason};
