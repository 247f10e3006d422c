//! Relationship graph subsystem for a regulatory case-management store
//!
//! This crate provides:
//! - **Graph**: typed, temporally-scoped edges over heterogeneous domain
//!   nodes (`IrisObject`), stored directionally and queried undirected
//! - **Catalog**: `TypeCatalog`, a cached view of the relationship-type
//!   taxonomy with explicit invalidation
//! - **Query**: `RelationshipCriteria`/`RelationshipEntry`, the undirected
//!   filtered view over a node's edges
//! - **Migration**: `ReplaceAuthorisationEngine`, bulk replacement of one
//!   authorisation across programmes and regimes with compliance cascades
//! - **Storage**: async store traits with a `SqliteStore` backend
//!
//! # Example
//!
//! ```ignore
//! use iris_graph::{ReplaceAuthorisationEngine, BulkReplaceAuthorisationOptions};
//!
//! let engine = ReplaceAuthorisationEngine::new(store, catalog);
//! let summary = engine.run(&options).await?;
//! println!("closed {} edges", summary.edges_closed);
//! ```
pub mod catalog;
pub mod error;
pub mod ids;
pub mod migration;
pub mod query;
pub mod store;
pub mod types;

pub use catalog::{TypeCatalog, TypeSource};
pub use error::GraphError;
pub use migration::ReplaceAuthorisationEngine;
pub use query::{RelationshipCriteria, RelationshipEntry, SecurityContext};
pub use store::{
    ComplianceStore, ContactStore, LinkRequest, ObjectStore, RelationshipStore, SqliteStore,
};
pub use types::{
    BulkReplaceAuthorisationOptions, ConditionCopyMode, ContactRelink, IrisObject, LocationRelink,
    MigrationSkip, MigrationSummary, ObjectKind, Relationship, RelationshipType, SkipReason,
};
