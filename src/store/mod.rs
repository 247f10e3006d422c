//! Storage abstractions for the relationship graph
//!
//! Trait seams are defined in `traits`; the rusqlite backend lives in
//! `sqlite`. One `SqliteStore` implements every trait; share it via `Arc`.

pub mod sqlite;
pub mod traits;

pub use sqlite::SqliteStore;
pub use traits::{ComplianceStore, ContactStore, LinkRequest, ObjectStore, RelationshipStore};
