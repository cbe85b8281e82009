//! Category repository: CRUD operations for the `categories` table.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::model::{is_valid_hex_color, Category, NewCategory};

use super::{Database, DatabaseError};

/// Outcome of [`find_or_create`]: both variants carry a usable category.
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryLookup {
    /// This call inserted the row.
    Created(Category),
    /// The row already existed, either before the call or because a
    /// concurrent caller inserted it first.
    Existing(Category),
}

impl CategoryLookup {
    pub fn category(&self) -> &Category {
        match self {
            CategoryLookup::Created(c) | CategoryLookup::Existing(c) => c,
        }
    }

    pub fn into_category(self) -> Category {
        match self {
            CategoryLookup::Created(c) | CategoryLookup::Existing(c) => c,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, CategoryLookup::Created(_))
    }
}

pub(crate) fn parse_timestamp(
    column: &'static str,
    value: String,
) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| DatabaseError::InvalidColumn { column, value })
}

struct CategoryRow {
    id: String,
    name: String,
    description: Option<String>,
    color: String,
    is_active: bool,
    sort_order: i64,
    created_by: String,
    created_at: String,
    updated_at: String,
}

impl CategoryRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            color: row.get("color")?,
            is_active: row.get("is_active")?,
            sort_order: row.get("sort_order")?,
            created_by: row.get("created_by")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn into_category(self) -> Result<Category, DatabaseError> {
        Ok(Category {
            id: self.id,
            name: self.name,
            description: self.description,
            color: self.color,
            is_active: self.is_active,
            sort_order: self.sort_order,
            created_by: self.created_by,
            created_at: parse_timestamp("created_at", self.created_at)?,
            updated_at: parse_timestamp("updated_at", self.updated_at)?,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT id, name, description, color, is_active, sort_order,
     created_by, created_at, updated_at FROM categories";

fn validate(new: &NewCategory) -> Result<(), DatabaseError> {
    let name_len = new.name.trim().chars().count();
    if !(2..=100).contains(&name_len) {
        return Err(DatabaseError::Validation(format!(
            "category name must be 2-100 characters, got {}",
            name_len
        )));
    }
    if !is_valid_hex_color(&new.color) {
        return Err(DatabaseError::Validation(format!(
            "invalid hex color '{}'",
            new.color
        )));
    }
    if let Some(description) = &new.description {
        if description.chars().count() > 500 {
            return Err(DatabaseError::Validation(
                "category description cannot exceed 500 characters".to_string(),
            ));
        }
    }
    Ok(())
}

/// Inserts a new category and returns the stored record.
///
/// Fails with a UNIQUE violation (see [`DatabaseError::is_unique_violation`])
/// if the name is taken.
pub fn insert(db: &Database, new: &NewCategory) -> Result<Category, DatabaseError> {
    validate(new)?;

    let now = Utc::now();
    let category = Category {
        id: uuid::Uuid::new_v4().to_string(),
        name: new.name.trim().to_string(),
        description: new.description.clone(),
        color: new.color.clone(),
        is_active: new.is_active,
        sort_order: new.sort_order,
        created_by: new.created_by.clone(),
        created_at: now,
        updated_at: now,
    };

    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO categories (id, name, description, color, is_active, sort_order,
             created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                category.id,
                category.name,
                category.description,
                category.color,
                category.is_active,
                category.sort_order,
                category.created_by,
                category.created_at.to_rfc3339(),
                category.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    })?;

    Ok(category)
}

/// Finds a category by its unique name.
pub fn find_by_name(db: &Database, name: &str) -> Result<Option<Category>, DatabaseError> {
    let row = db.with_conn(|conn| {
        let row = conn
            .query_row(
                &format!("{} WHERE name = ?1", SELECT_COLUMNS),
                params![name.trim()],
                CategoryRow::from_row,
            )
            .optional()?;
        Ok(row)
    })?;
    row.map(CategoryRow::into_category).transpose()
}

/// Finds a category by id.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<Category>, DatabaseError> {
    let row = db.with_conn(|conn| {
        let row = conn
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                params![id],
                CategoryRow::from_row,
            )
            .optional()?;
        Ok(row)
    })?;
    row.map(CategoryRow::into_category).transpose()
}

/// Lists active categories ordered by sort order, then name.
pub fn list_active(db: &Database) -> Result<Vec<Category>, DatabaseError> {
    let rows = db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE is_active = 1 ORDER BY sort_order ASC, name ASC",
            SELECT_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], CategoryRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })?;
    rows.into_iter().map(CategoryRow::into_category).collect()
}

/// Counts categories with the given name (0 or 1 given the UNIQUE constraint).
pub fn count_by_name(db: &Database, name: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM categories WHERE name = ?1",
            params![name.trim()],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Looks the category up by name and creates it if absent.
pub fn find_or_create(db: &Database, new: &NewCategory) -> Result<CategoryLookup, DatabaseError> {
    if let Some(existing) = find_by_name(db, &new.name)? {
        return Ok(CategoryLookup::Existing(existing));
    }
    create_or_existing(db, new)
}

/// Inserts the category; if the name is already taken, returns the stored row
/// instead of the conflict.
///
/// The UNIQUE constraint on `name` arbitrates between concurrent creators.
pub fn create_or_existing(db: &Database, new: &NewCategory) -> Result<CategoryLookup, DatabaseError> {
    match insert(db, new) {
        Ok(created) => {
            log::info!("Created category '{}' ({})", created.name, created.id);
            Ok(CategoryLookup::Created(created))
        }
        Err(e) if e.is_unique_violation() => {
            log::debug!(
                "Category '{}' was created concurrently, using the stored record",
                new.name
            );
            find_by_name(db, &new.name)?
                .map(CategoryLookup::Existing)
                .ok_or(e)
        }
        Err(e) => Err(e),
    }
}
