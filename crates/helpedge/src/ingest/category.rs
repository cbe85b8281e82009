//! Resolution of the fallback category assigned to mail-originated tickets.

use once_cell::sync::OnceCell;
use tracing::{debug, info};

use crate::db::{category_repo, Database, DatabaseError};
use crate::model::{Category, NewCategory};

use super::{DEFAULT_CATEGORY_COLOR, DEFAULT_CATEGORY_DESCRIPTION, DEFAULT_CATEGORY_NAME};

/// Finds or creates the default category, remembering it once known.
///
/// A resolver lives for one ingestion run, so a category removed between
/// runs is recreated rather than served stale.
pub struct CategoryResolver {
    db: Database,
    created_by: String,
    cached: OnceCell<Category>,
}

impl CategoryResolver {
    pub fn new(db: Database, created_by: impl Into<String>) -> Self {
        Self {
            db,
            created_by: created_by.into(),
            cached: OnceCell::new(),
        }
    }

    /// Fields used when the default category has to be created.
    pub fn default_category(&self) -> NewCategory {
        NewCategory {
            name: DEFAULT_CATEGORY_NAME.to_string(),
            description: Some(DEFAULT_CATEGORY_DESCRIPTION.to_string()),
            color: DEFAULT_CATEGORY_COLOR.to_string(),
            is_active: true,
            sort_order: 0,
            created_by: self.created_by.clone(),
        }
    }

    /// Returns the default category, creating it on first use.
    ///
    /// Concurrent resolvers racing to create it all end up with the same row.
    pub fn resolve_default(&self) -> Result<Category, DatabaseError> {
        if let Some(category) = self.cached.get() {
            return Ok(category.clone());
        }

        let lookup = category_repo::find_or_create(&self.db, &self.default_category())?;
        if lookup.was_created() {
            info!(category_id = %lookup.category().id, "Created default category '{}'", DEFAULT_CATEGORY_NAME);
        } else {
            debug!(category_id = %lookup.category().id, "Using existing default category");
        }

        let category = self.cached.get_or_init(|| lookup.into_category());
        Ok(category.clone())
    }

    pub fn is_cached(&self) -> bool {
        self.cached.get().is_some()
    }
}
