//! Relationship-type catalog cache
//!
//! The type taxonomy is loaded once and held process-wide. Invalidation is
//! an explicit `get/invalidate` abstraction decoupled from any particular
//! change-notification transport: whatever feed observes taxonomy changes
//! simply calls `invalidate` (or `eager_reload`). A reload holds the write
//! lock for its whole duration, so readers block rather than observe a
//! half-populated cache.

use std::sync::{Arc, RwLock};

use anyhow::Result;

use crate::error::GraphError;
use crate::types::object::ObjectKind;
use crate::types::relationship::RelationshipType;

/// Source of truth for the relationship-type taxonomy
pub trait TypeSource: Send + Sync {
    /// Load the full taxonomy
    fn load_types(&self) -> Result<Vec<RelationshipType>>;
}

/// Process-wide cache over a [`TypeSource`]
pub struct TypeCatalog {
    source: Arc<dyn TypeSource>,
    cache: RwLock<Option<Arc<Vec<RelationshipType>>>>,
}

impl TypeCatalog {
    /// Create an empty catalog over a source; the first read loads it
    pub fn new(source: Arc<dyn TypeSource>) -> Self {
        Self {
            source,
            cache: RwLock::new(None),
        }
    }

    /// Get the cached taxonomy, loading it if necessary
    pub fn get_types(&self) -> Result<Arc<Vec<RelationshipType>>> {
        if let Some(types) = self.cache.read().unwrap().as_ref() {
            return Ok(Arc::clone(types));
        }

        // Load under the write lock; concurrent readers block until the
        // reload completes. Re-check after acquiring in case another
        // writer got there first.
        let mut guard = self.cache.write().unwrap();
        if let Some(types) = guard.as_ref() {
            return Ok(Arc::clone(types));
        }
        let types = Arc::new(self.source.load_types()?);
        *guard = Some(Arc::clone(&types));
        tracing::debug!("relationship type catalog loaded ({} types)", types.len());
        Ok(types)
    }

    /// Resolve the single active type connecting a pair of object types.
    ///
    /// The pair matches in either direction. Without a `code`, exactly one
    /// candidate must exist; otherwise the resolution is ambiguous.
    pub fn resolve_type(
        &self,
        from: ObjectKind,
        to: ObjectKind,
        code: Option<&str>,
    ) -> Result<RelationshipType> {
        let types = self.get_types()?;
        let mut candidates = types
            .iter()
            .filter(|t| t.is_active && t.matches_pair(from, to))
            .filter(|t| code.map_or(true, |c| t.matches_code(c)));

        let first = candidates.next();
        let rest = candidates.count();
        match (first, rest) {
            (Some(t), 0) => Ok(t.clone()),
            (Some(_), n) => Err(GraphError::AmbiguousType {
                from: from.as_code().to_string(),
                to: to.as_code().to_string(),
                candidates: n + 1,
            }
            .into()),
            (None, _) => Err(GraphError::TypeNotFound {
                from: from.as_code().to_string(),
                to: to.as_code().to_string(),
                code: code.map(str::to_string),
            }
            .into()),
        }
    }

    /// Resolve from raw object-type codes (case-insensitive)
    pub fn resolve_codes(
        &self,
        from_code: &str,
        to_code: &str,
        code: Option<&str>,
    ) -> Result<RelationshipType> {
        let from = ObjectKind::parse_code(from_code)?;
        let to = ObjectKind::parse_code(to_code)?;
        self.resolve_type(from, to, code)
    }

    /// Drop the cached taxonomy; the next reader reloads it
    pub fn invalidate(&self) {
        let mut guard = self.cache.write().unwrap();
        *guard = None;
        tracing::debug!("relationship type catalog invalidated");
    }

    /// Clear and repopulate under one write-lock hold
    pub fn eager_reload(&self) -> Result<()> {
        let mut guard = self.cache.write().unwrap();
        let types = Arc::new(self.source.load_types()?);
        *guard = Some(types);
        Ok(())
    }
}
