//! Store trait definitions
//!
//! All storage traits are defined here, with the rusqlite implementation in
//! `sqlite/`. The relationship store owns every edge; nodes do not own
//! their edges.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::ids::{
    ComplianceAuthorisationId, ComplianceId, ConditionId, ContactId, IrisObjectId, RegimeId,
    RelationshipId, RelationshipTypeId, ResourceAssignmentId,
};
use crate::query::{RelationshipCriteria, RelationshipEntry};
use crate::types::compliance::{
    ComplianceAuthorisation, ComplianceCondition, Regime, RegimeActivity, ResourceAssignment,
    ResourceKind,
};
use crate::types::object::{IrisObject, ObjectKind};
use crate::types::relationship::{Relationship, RelationshipType};
use crate::types::sublink::{Contact, ContactSubLink, SubLinkSnapshot};

/// A request to create an open edge between two nodes
#[derive(Clone, Debug)]
pub struct LinkRequest {
    pub object_id: IrisObjectId,
    pub related_object_id: IrisObjectId,
    pub relationship_type_id: RelationshipTypeId,
    pub current_from: NaiveDate,
    /// Snapshot to stamp when one endpoint is a contact
    pub sub_link: Option<SubLinkSnapshot>,
    pub created_by: String,
}

/// Trait for IRIS-object (node) storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Register a node for a concrete record. Sub-class tags come from the
    /// passed template; the store assigns the creation timestamp.
    async fn create_object(&self, object: IrisObject) -> Result<IrisObjectId>;

    /// Get a node by id
    async fn get_object(&self, id: &IrisObjectId) -> Result<Option<IrisObject>>;
}

/// Trait for relationship (edge) storage and queries
#[async_trait]
pub trait RelationshipStore: Send + Sync {
    /// Register a relationship type in the taxonomy
    async fn define_type(&self, rel_type: RelationshipType) -> Result<RelationshipTypeId>;

    /// List the full taxonomy, active and retired
    async fn list_types(&self) -> Result<Vec<RelationshipType>>;

    /// Create an open edge.
    ///
    /// Validates that both nodes exist and the type connects their
    /// object-type pair. A second open edge for the same unordered pair and
    /// type is rejected by the storage-level uniqueness constraint
    /// (`GraphError::DuplicateOpenEdge`).
    async fn link(&self, request: LinkRequest) -> Result<RelationshipId>;

    /// Close an open edge by setting its end date. Closed edges are
    /// immutable; closing one again fails.
    async fn close(&self, id: &RelationshipId, current_to: NaiveDate) -> Result<()>;

    /// Get an edge by id
    async fn get_relationship(&self, id: &RelationshipId) -> Result<Option<Relationship>>;

    /// Get the sub-link owned by an edge, if any
    async fn get_sub_link(&self, id: &RelationshipId) -> Result<Option<ContactSubLink>>;

    /// Overwrite an edge's sub-link snapshot in place — the one sanctioned
    /// mutation of a sub-link after it is written
    async fn update_sub_link(
        &self,
        id: &RelationshipId,
        snapshot: &SubLinkSnapshot,
        modified_by: &str,
    ) -> Result<()>;

    /// Undirected, filtered view over a node's edges
    async fn find_edges(&self, criteria: &RelationshipCriteria) -> Result<Vec<RelationshipEntry>>;

    /// Whether the node has any open edge of the given type code
    async fn has_current_link(&self, node: &IrisObjectId, type_code: &str) -> Result<bool>;

    /// Nodes of the given type currently related to `node`
    async fn related_nodes_of_type(
        &self,
        node: &IrisObjectId,
        object_type: ObjectKind,
    ) -> Result<Vec<IrisObject>>;
}

/// Trait for canonical contact records
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Store a contact record
    async fn create_contact(&self, contact: Contact) -> Result<ContactId>;

    /// Get a contact by id
    async fn get_contact(&self, id: &ContactId) -> Result<Option<Contact>>;

    /// Replace the contact's current component ids. Existing sub-link
    /// snapshots are unaffected.
    async fn update_contact(&self, contact: &Contact) -> Result<()>;
}

/// Trait for compliance cascade records and the regime scaffolding around them
#[async_trait]
pub trait ComplianceStore: Send + Sync {
    /// Declare whether an activity status code carries the open attribute
    async fn define_activity_status(&self, code: &str, is_open: bool) -> Result<()>;

    /// Store a regime record
    async fn create_regime(&self, regime: Regime) -> Result<RegimeId>;

    /// Get a regime by id
    async fn get_regime(&self, id: &RegimeId) -> Result<Option<Regime>>;

    /// Store an activity and its compliance record
    async fn create_activity(&self, activity: RegimeActivity) -> Result<ComplianceId>;

    /// Activities under a regime
    async fn list_activities(&self, regime_id: &RegimeId) -> Result<Vec<RegimeActivity>>;

    /// Create a compliance-authorisation link
    async fn create_compliance_authorisation(
        &self,
        compliance_id: &ComplianceId,
        authorisation_object_id: &IrisObjectId,
    ) -> Result<ComplianceAuthorisationId>;

    /// The non-deleted link between a compliance record and an authorisation
    async fn find_compliance_authorisation(
        &self,
        compliance_id: &ComplianceId,
        authorisation_object_id: &IrisObjectId,
    ) -> Result<Option<ComplianceAuthorisation>>;

    /// Attach a condition to a compliance-authorisation link
    async fn add_condition(
        &self,
        compliance_authorisation_id: &ComplianceAuthorisationId,
        code: &str,
        text: &str,
    ) -> Result<ConditionId>;

    /// Non-deleted conditions of a compliance-authorisation link
    async fn list_conditions(
        &self,
        compliance_authorisation_id: &ComplianceAuthorisationId,
    ) -> Result<Vec<ComplianceCondition>>;

    /// Attach a labour/equipment row to a compliance record
    async fn add_resource(
        &self,
        kind: ResourceKind,
        compliance_id: &ComplianceId,
        authorisation_object_id: &IrisObjectId,
    ) -> Result<ResourceAssignmentId>;

    /// Non-deleted labour and equipment rows for a compliance record,
    /// optionally narrowed to one authorisation
    async fn list_resources(
        &self,
        compliance_id: &ComplianceId,
        authorisation_object_id: Option<&IrisObjectId>,
    ) -> Result<Vec<ResourceAssignment>>;

    /// Record a field inspection against a compliance-authorisation link
    async fn record_inspection(
        &self,
        compliance_authorisation_id: &ComplianceAuthorisationId,
        status: &str,
    ) -> Result<()>;

    /// Whether an in-progress field inspection references the link
    async fn has_inspection_in_progress(
        &self,
        compliance_authorisation_id: &ComplianceAuthorisationId,
    ) -> Result<bool>;

    /// Record a compliance observation against a link
    async fn record_observation(
        &self,
        compliance_authorisation_id: &ComplianceAuthorisationId,
    ) -> Result<()>;

    /// Whether any observation recorded compliance against the link
    async fn has_recorded_observation(
        &self,
        compliance_authorisation_id: &ComplianceAuthorisationId,
    ) -> Result<bool>;
}
