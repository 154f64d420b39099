use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::models::{
    ChartType, Entry, EntryUpdate, Field, FieldType, FieldUpdate, FieldValue, GoalDirection,
    StoredImage, ViewConfigUpdate, ViewConfiguration,
};

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
    #[error("Failed to create database directory: {0}")]
    DirectoryError(String),
    #[error("{kind} with id {id} not found")]
    NotFound { kind: &'static str, id: String },
    #[error("Failed to encode column: {0}")]
    EncodeError(#[from] serde_json::Error),
}

/// Row counts per entity collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DbStats {
    pub fields: i64,
    pub entries: i64,
    pub images: i64,
}

pub struct Database {
    conn: Connection,
}

const FIELD_COLUMNS: &str = "id, name, unit, field_type, \"order\", goal_direction, created_at";
const ENTRY_COLUMNS: &str = "id, date, field_values, image_id, notes, created_at, updated_at";
const IMAGE_COLUMNS: &str = "id, entry_id, data, mime_type, size, uploaded_at";
const VIEW_CONFIG_COLUMNS: &str =
    "id, name, description, field_ids, icon, chart_type, \"order\", is_default, created_at, updated_at";

fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

fn read_timestamp(row: &rusqlite::Row, idx: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn read_date(row: &rusqlite::Row, idx: usize) -> Result<NaiveDate, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| conversion_error(idx, e))
}

fn read_json<T: serde::de::DeserializeOwned>(row: &rusqlite::Row, idx: usize) -> Result<T, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

impl Database {
    /// Create a new database connection and initialize the schema
    pub fn new(path: &str) -> Result<Self, DatabaseError> {
        let db_path = PathBuf::from(path);

        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DatabaseError::DirectoryError(e.to_string()))?;
            }
        }

        let conn = Connection::open(&db_path)?;

        let db = Database { conn };
        db.initialize_schema()?;

        Ok(db)
    }

    /// Open a throwaway database that lives only as long as the handle
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let db = Database { conn: Connection::open_in_memory()? };
        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize the database schema (tables and indexes)
    fn initialize_schema(&self) -> Result<(), DatabaseError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS fields (
                id              TEXT PRIMARY KEY,
                name            TEXT NOT NULL,
                unit            TEXT NOT NULL,
                field_type      TEXT NOT NULL DEFAULT 'number',
                \"order\"        INTEGER NOT NULL DEFAULT 0,
                goal_direction  TEXT,
                created_at      TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS entries (
                id              TEXT PRIMARY KEY,
                date            TEXT NOT NULL,
                field_values    TEXT NOT NULL DEFAULT '{}',
                image_id        TEXT,
                notes           TEXT,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS images (
                id              TEXT PRIMARY KEY,
                entry_id        TEXT NOT NULL,
                data            BLOB NOT NULL,
                mime_type       TEXT NOT NULL,
                size            INTEGER NOT NULL,
                uploaded_at     TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS view_configs (
                id              TEXT PRIMARY KEY,
                name            TEXT NOT NULL,
                description     TEXT,
                field_ids       TEXT NOT NULL DEFAULT '[]',
                icon            TEXT,
                chart_type      TEXT,
                \"order\"        INTEGER NOT NULL DEFAULT 0,
                is_default      INTEGER DEFAULT 0,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            )",
            [],
        )?;

        // One row per start-up task that has completed
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS migrations (
                name            TEXT PRIMARY KEY,
                applied_at      TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_fields_order ON fields(\"order\")",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_entries_date ON entries(date)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_images_entry_id ON images(entry_id)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_view_configs_order ON view_configs(\"order\")",
            [],
        )?;

        Ok(())
    }

    // ==================== FIELDS ====================

    /// Helper function to map a row to a Field
    fn row_to_field(row: &rusqlite::Row) -> Result<Field, rusqlite::Error> {
        let field_type: String = row.get(3)?;
        let goal_direction: Option<String> = row.get(5)?;
        Ok(Field {
            id: row.get(0)?,
            name: row.get(1)?,
            unit: row.get(2)?,
            field_type: FieldType::parse(&field_type).unwrap_or(FieldType::Number),
            order: row.get(4)?,
            goal_direction: goal_direction.as_deref().and_then(GoalDirection::parse),
            created_at: read_timestamp(row, 6)?,
        })
    }

    /// Insert a field; fails if a field with the same id already exists
    pub fn insert_field(&self, field: &Field) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO fields (id, name, unit, field_type, \"order\", goal_direction, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                field.id,
                field.name,
                field.unit,
                field.field_type.as_str(),
                field.order,
                field.goal_direction.map(|g| g.as_str()),
                timestamp(&field.created_at),
            ],
        )?;
        Ok(())
    }

    /// Get all fields ordered by order ASC
    pub fn get_all_fields(&self) -> Result<Vec<Field>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FIELD_COLUMNS} FROM fields ORDER BY \"order\" ASC, created_at ASC"
        ))?;
        let fields = stmt.query_map([], Self::row_to_field)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(fields)
    }

    /// Get a single field by ID
    pub fn get_field(&self, id: &str) -> Result<Option<Field>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!("SELECT {FIELD_COLUMNS} FROM fields WHERE id = ?1"))?;
        let field = stmt.query_row(rusqlite::params![id], Self::row_to_field).optional()?;
        Ok(field)
    }

    /// Apply a partial update to a field
    pub fn update_field(&self, id: &str, update: &FieldUpdate) -> Result<Field, DatabaseError> {
        let mut field = self.get_field(id)?
            .ok_or_else(|| DatabaseError::NotFound { kind: "Field", id: id.to_string() })?;

        if let Some(name) = &update.name {
            field.name = name.clone();
        }
        if let Some(unit) = &update.unit {
            field.unit = unit.clone();
        }
        if let Some(field_type) = update.field_type {
            field.field_type = field_type;
        }
        if let Some(order) = update.order {
            field.order = order;
        }
        if let Some(goal) = update.goal_direction {
            field.goal_direction = Some(goal);
        }

        self.conn.execute(
            "UPDATE fields SET name = ?1, unit = ?2, field_type = ?3, \"order\" = ?4, goal_direction = ?5
             WHERE id = ?6",
            rusqlite::params![
                field.name,
                field.unit,
                field.field_type.as_str(),
                field.order,
                field.goal_direction.map(|g| g.as_str()),
                id
            ],
        )?;
        Ok(field)
    }

    /// Delete a field by ID.
    /// The id is also removed from every view configuration that lists it;
    /// entry values keyed by the field are left in place.
    pub fn delete_field(&self, id: &str) -> Result<(), DatabaseError> {
        let affected_configs = self.get_view_configs_using_field(id)?;

        let tx = self.conn.unchecked_transaction()?;
        let deleted = tx.execute("DELETE FROM fields WHERE id = ?1", rusqlite::params![id])?;
        if deleted == 0 {
            return Err(DatabaseError::NotFound { kind: "Field", id: id.to_string() });
        }

        let now = timestamp(&Utc::now());
        for config in affected_configs {
            let remaining: Vec<&String> = config.field_ids.iter().filter(|f| *f != id).collect();
            tx.execute(
                "UPDATE view_configs SET field_ids = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![serde_json::to_string(&remaining)?, now, config.id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Assign `order = position` to each listed field in one transaction.
    /// Unknown ids are ignored.
    pub fn reorder_fields(&self, field_ids: &[String]) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        for (index, id) in field_ids.iter().enumerate() {
            tx.execute(
                "UPDATE fields SET \"order\" = ?1 WHERE id = ?2",
                rusqlite::params![index as i64, id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Get the maximum order value from all fields
    pub fn get_max_field_order(&self) -> Result<i64, DatabaseError> {
        let max_order: Option<i64> = self.conn.query_row(
            "SELECT MAX(\"order\") FROM fields",
            [],
            |row| row.get(0),
        )?;
        Ok(max_order.unwrap_or(-1))
    }

    pub fn count_fields(&self) -> Result<i64, DatabaseError> {
        Ok(self.conn.query_row("SELECT COUNT(*) FROM fields", [], |row| row.get(0))?)
    }

    // ==================== ENTRIES ====================

    /// Helper function to map a row to an Entry
    fn row_to_entry(row: &rusqlite::Row) -> Result<Entry, rusqlite::Error> {
        let values: BTreeMap<String, FieldValue> = read_json(row, 2)?;
        Ok(Entry {
            id: row.get(0)?,
            date: read_date(row, 1)?,
            values,
            image_id: row.get(3)?,
            notes: row.get(4)?,
            created_at: read_timestamp(row, 5)?,
            updated_at: read_timestamp(row, 6)?,
        })
    }

    /// Insert an entry; fails if an entry with the same id already exists
    pub fn insert_entry(&self, entry: &Entry) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO entries (id, date, field_values, image_id, notes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                entry.id,
                entry.date.format("%Y-%m-%d").to_string(),
                serde_json::to_string(&entry.values)?,
                entry.image_id,
                entry.notes,
                timestamp(&entry.created_at),
                timestamp(&entry.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Insert an entry together with its photo. Either both rows are written
    /// or neither is; the stored entry points at the image.
    pub fn insert_entry_with_image(&self, entry: &Entry, image: &StoredImage) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        let mut linked = entry.clone();
        linked.image_id = Some(image.id.clone());
        self.insert_entry(&linked)?;
        self.insert_image(image)?;
        tx.commit()?;
        Ok(())
    }

    /// Get all entries ordered by date ASC
    pub fn get_all_entries(&self) -> Result<Vec<Entry>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries ORDER BY date ASC, created_at ASC"
        ))?;
        let entries = stmt.query_map([], Self::row_to_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Get entries whose date lies within `start..=end`
    pub fn get_entries_in_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Entry>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE date >= ?1 AND date <= ?2
             ORDER BY date ASC, created_at ASC"
        ))?;
        let entries = stmt
            .query_map(
                rusqlite::params![start.format("%Y-%m-%d").to_string(), end.format("%Y-%m-%d").to_string()],
                Self::row_to_entry,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Get a single entry by ID
    pub fn get_entry(&self, id: &str) -> Result<Option<Entry>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?1"))?;
        let entry = stmt.query_row(rusqlite::params![id], Self::row_to_entry).optional()?;
        Ok(entry)
    }

    /// Apply a partial update to an entry and refresh `updated_at`
    pub fn update_entry(&self, id: &str, update: &EntryUpdate) -> Result<Entry, DatabaseError> {
        let mut entry = self.get_entry(id)?
            .ok_or_else(|| DatabaseError::NotFound { kind: "Entry", id: id.to_string() })?;

        if let Some(date) = update.date {
            entry.date = date;
        }
        if let Some(values) = &update.values {
            entry.values = values.clone();
        }
        if let Some(image_id) = &update.image_id {
            entry.image_id = image_id.clone();
        }
        if let Some(notes) = &update.notes {
            entry.notes = notes.clone();
        }
        entry.updated_at = Utc::now();

        self.conn.execute(
            "UPDATE entries SET date = ?1, field_values = ?2, image_id = ?3, notes = ?4, updated_at = ?5
             WHERE id = ?6",
            rusqlite::params![
                entry.date.format("%Y-%m-%d").to_string(),
                serde_json::to_string(&entry.values)?,
                entry.image_id,
                entry.notes,
                timestamp(&entry.updated_at),
                id
            ],
        )?;
        Ok(entry)
    }

    /// Delete an entry by ID together with its image
    pub fn delete_entry(&self, id: &str) -> Result<(), DatabaseError> {
        let entry = self.get_entry(id)?
            .ok_or_else(|| DatabaseError::NotFound { kind: "Entry", id: id.to_string() })?;

        let tx = self.conn.unchecked_transaction()?;
        if let Some(image_id) = &entry.image_id {
            tx.execute("DELETE FROM images WHERE id = ?1", rusqlite::params![image_id])?;
        }
        tx.execute("DELETE FROM images WHERE entry_id = ?1", rusqlite::params![id])?;
        tx.execute("DELETE FROM entries WHERE id = ?1", rusqlite::params![id])?;
        tx.commit()?;
        Ok(())
    }

    pub fn count_entries(&self) -> Result<i64, DatabaseError> {
        Ok(self.conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?)
    }

    // ==================== IMAGES ====================

    /// Helper function to map a row to a StoredImage
    fn row_to_image(row: &rusqlite::Row) -> Result<StoredImage, rusqlite::Error> {
        Ok(StoredImage {
            id: row.get(0)?,
            entry_id: row.get(1)?,
            data: row.get(2)?,
            mime_type: row.get(3)?,
            size: row.get(4)?,
            uploaded_at: read_timestamp(row, 5)?,
        })
    }

    /// Insert an image; fails if an image with the same id already exists
    pub fn insert_image(&self, image: &StoredImage) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO images (id, entry_id, data, mime_type, size, uploaded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                image.id,
                image.entry_id,
                image.data,
                image.mime_type,
                image.size,
                timestamp(&image.uploaded_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_image(&self, id: &str) -> Result<Option<StoredImage>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!("SELECT {IMAGE_COLUMNS} FROM images WHERE id = ?1"))?;
        let image = stmt.query_row(rusqlite::params![id], Self::row_to_image).optional()?;
        Ok(image)
    }

    /// Get the (first) image attached to an entry
    pub fn get_image_by_entry(&self, entry_id: &str) -> Result<Option<StoredImage>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {IMAGE_COLUMNS} FROM images WHERE entry_id = ?1 ORDER BY uploaded_at ASC LIMIT 1"
        ))?;
        let image = stmt.query_row(rusqlite::params![entry_id], Self::row_to_image).optional()?;
        Ok(image)
    }

    pub fn get_all_images(&self) -> Result<Vec<StoredImage>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!("SELECT {IMAGE_COLUMNS} FROM images ORDER BY uploaded_at ASC"))?;
        let images = stmt.query_map([], Self::row_to_image)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(images)
    }

    /// Delete an image and clear the link on the entry that pointed at it
    pub fn delete_image(&self, id: &str) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        let deleted = tx.execute("DELETE FROM images WHERE id = ?1", rusqlite::params![id])?;
        if deleted == 0 {
            return Err(DatabaseError::NotFound { kind: "Image", id: id.to_string() });
        }
        tx.execute(
            "UPDATE entries SET image_id = NULL, updated_at = ?1 WHERE image_id = ?2",
            rusqlite::params![timestamp(&Utc::now()), id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Store `image` for its entry, dropping whatever image the entry had before
    pub fn replace_entry_image(&self, image: &StoredImage) -> Result<(), DatabaseError> {
        let entry = self.get_entry(&image.entry_id)?
            .ok_or_else(|| DatabaseError::NotFound { kind: "Entry", id: image.entry_id.clone() })?;

        let tx = self.conn.unchecked_transaction()?;
        if let Some(old_id) = &entry.image_id {
            tx.execute("DELETE FROM images WHERE id = ?1", rusqlite::params![old_id])?;
        }
        tx.execute(
            "INSERT INTO images (id, entry_id, data, mime_type, size, uploaded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                image.id,
                image.entry_id,
                image.data,
                image.mime_type,
                image.size,
                timestamp(&image.uploaded_at),
            ],
        )?;
        tx.execute(
            "UPDATE entries SET image_id = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![image.id, timestamp(&Utc::now()), entry.id],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn count_images(&self) -> Result<i64, DatabaseError> {
        Ok(self.conn.query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))?)
    }

    // ==================== VIEW CONFIGURATIONS ====================

    /// Helper function to map a row to a ViewConfiguration
    fn row_to_view_config(row: &rusqlite::Row) -> Result<ViewConfiguration, rusqlite::Error> {
        let chart_type: Option<String> = row.get(5)?;
        Ok(ViewConfiguration {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            field_ids: read_json(row, 3)?,
            icon: row.get(4)?,
            chart_type: chart_type.as_deref().and_then(ChartType::parse),
            order: row.get(6)?,
            is_default: row.get::<_, i64>(7)? != 0,
            created_at: read_timestamp(row, 8)?,
            updated_at: read_timestamp(row, 9)?,
        })
    }

    pub fn insert_view_config(&self, config: &ViewConfiguration) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO view_configs (id, name, description, field_ids, icon, chart_type, \"order\", is_default, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            rusqlite::params![
                config.id,
                config.name,
                config.description,
                serde_json::to_string(&config.field_ids)?,
                config.icon,
                config.chart_type.map(|c| c.as_str()),
                config.order,
                if config.is_default { 1 } else { 0 },
                timestamp(&config.created_at),
                timestamp(&config.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Get all view configurations ordered by order ASC
    pub fn get_all_view_configs(&self) -> Result<Vec<ViewConfiguration>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {VIEW_CONFIG_COLUMNS} FROM view_configs ORDER BY \"order\" ASC"
        ))?;
        let configs = stmt.query_map([], Self::row_to_view_config)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(configs)
    }

    pub fn get_view_config(&self, id: &str) -> Result<Option<ViewConfiguration>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {VIEW_CONFIG_COLUMNS} FROM view_configs WHERE id = ?1"
        ))?;
        let config = stmt.query_row(rusqlite::params![id], Self::row_to_view_config).optional()?;
        Ok(config)
    }

    /// Apply a partial update to a view configuration and refresh `updated_at`
    pub fn update_view_config(&self, id: &str, update: &ViewConfigUpdate) -> Result<ViewConfiguration, DatabaseError> {
        let mut config = self.get_view_config(id)?
            .ok_or_else(|| DatabaseError::NotFound { kind: "View configuration", id: id.to_string() })?;

        if let Some(name) = &update.name {
            config.name = name.clone();
        }
        if let Some(description) = &update.description {
            config.description = description.clone();
        }
        if let Some(field_ids) = &update.field_ids {
            config.field_ids = field_ids.clone();
        }
        if let Some(icon) = &update.icon {
            config.icon = icon.clone();
        }
        if let Some(chart_type) = update.chart_type {
            config.chart_type = chart_type;
        }
        if let Some(order) = update.order {
            config.order = order;
        }
        config.updated_at = Utc::now();

        self.conn.execute(
            "UPDATE view_configs SET name = ?1, description = ?2, field_ids = ?3, icon = ?4,
             chart_type = ?5, \"order\" = ?6, updated_at = ?7 WHERE id = ?8",
            rusqlite::params![
                config.name,
                config.description,
                serde_json::to_string(&config.field_ids)?,
                config.icon,
                config.chart_type.map(|c| c.as_str()),
                config.order,
                timestamp(&config.updated_at),
                id
            ],
        )?;
        Ok(config)
    }

    pub fn delete_view_config(&self, id: &str) -> Result<(), DatabaseError> {
        let deleted = self.conn.execute("DELETE FROM view_configs WHERE id = ?1", rusqlite::params![id])?;
        if deleted == 0 {
            return Err(DatabaseError::NotFound { kind: "View configuration", id: id.to_string() });
        }
        Ok(())
    }

    /// View configurations whose field list contains `field_id`
    pub fn get_view_configs_using_field(&self, field_id: &str) -> Result<Vec<ViewConfiguration>, DatabaseError> {
        Ok(self
            .get_all_view_configs()?
            .into_iter()
            .filter(|config| config.field_ids.iter().any(|id| id == field_id))
            .collect())
    }

    pub fn get_max_view_config_order(&self) -> Result<i64, DatabaseError> {
        let max_order: Option<i64> = self.conn.query_row(
            "SELECT MAX(\"order\") FROM view_configs",
            [],
            |row| row.get(0),
        )?;
        Ok(max_order.unwrap_or(-1))
    }

    // ==================== UTILITY ====================

    /// Remove every field, entry, image and view configuration.
    /// Migration records are kept.
    pub fn clear_all_data(&self) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM fields", [])?;
        tx.execute("DELETE FROM entries", [])?;
        tx.execute("DELETE FROM images", [])?;
        tx.execute("DELETE FROM view_configs", [])?;
        tx.commit()?;
        Ok(())
    }

    pub fn stats(&self) -> Result<DbStats, DatabaseError> {
        Ok(DbStats {
            fields: self.count_fields()?,
            entries: self.count_entries()?,
            images: self.count_images()?,
        })
    }

    pub fn is_migration_applied(&self, name: &str) -> Result<bool, DatabaseError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM migrations WHERE name = ?1",
            rusqlite::params![name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn mark_migration_applied(&self, name: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO migrations (name, applied_at) VALUES (?1, ?2)",
            rusqlite::params![name, timestamp(&Utc::now())],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn field(name: &str, order: i64) -> Field {
        let mut field = Field::new(name.to_string(), "kg".to_string(), FieldType::Number);
        field.order = order;
        field
    }

    fn entry_on(date: &str) -> Entry {
        Entry::new(NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap())
    }

    #[test]
    fn test_field_roundtrip_and_order() {
        let db = Database::open_in_memory().unwrap();
        let b = field("Bauch", 1);
        let a = field("Gewicht", 0);
        db.insert_field(&b).unwrap();
        db.insert_field(&a).unwrap();

        let fields = db.get_all_fields().unwrap();
        assert_eq!(fields.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(), vec!["Gewicht", "Bauch"]);
        assert_eq!(db.get_field(&a.id).unwrap().unwrap().name, "Gewicht");
        assert!(db.get_field("missing").unwrap().is_none());
        assert_eq!(db.get_max_field_order().unwrap(), 1);
    }

    #[test]
    fn test_duplicate_field_id_rejected() {
        let db = Database::open_in_memory().unwrap();
        let f = field("Gewicht", 0);
        db.insert_field(&f).unwrap();
        assert_matches!(db.insert_field(&f), Err(DatabaseError::SqliteError(_)));
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert_matches!(
            db.update_field("nope", &FieldUpdate::default()),
            Err(DatabaseError::NotFound { kind: "Field", .. })
        );
        assert_matches!(
            db.update_entry("nope", &EntryUpdate::default()),
            Err(DatabaseError::NotFound { kind: "Entry", .. })
        );
        assert_matches!(db.delete_entry("nope"), Err(DatabaseError::NotFound { .. }));
        assert_matches!(db.delete_field("nope"), Err(DatabaseError::NotFound { .. }));
    }

    #[test]
    fn test_reorder_fields_is_dense() {
        let db = Database::open_in_memory().unwrap();
        let a = field("A", 5);
        let b = field("B", 9);
        let c = field("C", 2);
        for f in [&a, &b, &c] {
            db.insert_field(f).unwrap();
        }
        db.reorder_fields(&[b.id.clone(), c.id.clone(), a.id.clone()]).unwrap();

        let fields = db.get_all_fields().unwrap();
        let names: Vec<_> = fields.iter().map(|f| (f.name.as_str(), f.order)).collect();
        assert_eq!(names, vec![("B", 0), ("C", 1), ("A", 2)]);
    }

    #[test]
    fn test_update_entry_refreshes_updated_at() {
        let db = Database::open_in_memory().unwrap();
        let mut entry = entry_on("2025-10-01");
        entry.updated_at = DateTime::parse_from_rfc3339("2020-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        db.insert_entry(&entry).unwrap();

        let updated = db
            .update_entry(&entry.id, &EntryUpdate { notes: Some(Some("fasted".to_string())), ..Default::default() })
            .unwrap();
        assert_eq!(updated.notes.as_deref(), Some("fasted"));
        assert!(updated.updated_at > entry.updated_at);
        assert_eq!(db.get_entry(&entry.id).unwrap().unwrap().notes.as_deref(), Some("fasted"));
    }

    #[test]
    fn test_delete_entry_cascades_to_image() {
        let db = Database::open_in_memory().unwrap();
        let entry = entry_on("2025-10-01");
        db.insert_entry(&entry).unwrap();
        let image = StoredImage::new(entry.id.clone(), vec![0xff, 0xd8], "image/jpeg".to_string());
        db.replace_entry_image(&image).unwrap();
        assert_eq!(db.get_entry(&entry.id).unwrap().unwrap().image_id, Some(image.id.clone()));

        db.delete_entry(&entry.id).unwrap();
        assert_eq!(db.count_images().unwrap(), 0);
        assert_eq!(db.count_entries().unwrap(), 0);
    }

    #[test]
    fn test_replace_entry_image_drops_previous() {
        let db = Database::open_in_memory().unwrap();
        let entry = entry_on("2025-10-01");
        db.insert_entry(&entry).unwrap();
        let first = StoredImage::new(entry.id.clone(), vec![1], "image/png".to_string());
        let second = StoredImage::new(entry.id.clone(), vec![2], "image/png".to_string());
        db.replace_entry_image(&first).unwrap();
        db.replace_entry_image(&second).unwrap();

        assert!(db.get_image(&first.id).unwrap().is_none());
        assert_eq!(db.get_image_by_entry(&entry.id).unwrap().unwrap().data, vec![2]);
    }

    #[test]
    fn test_insert_entry_with_image_is_atomic() {
        let db = Database::open_in_memory().unwrap();
        let entry = entry_on("2025-10-01");
        let image = StoredImage::new(entry.id.clone(), vec![1, 2, 3], "image/png".to_string());
        db.insert_entry_with_image(&entry, &image).unwrap();
        assert_eq!(db.get_entry(&entry.id).unwrap().unwrap().image_id, Some(image.id.clone()));

        // a second photo reusing the image id fails, and the new entry is rolled back
        let other = entry_on("2025-10-08");
        let mut clash = StoredImage::new(other.id.clone(), vec![4], "image/png".to_string());
        clash.id = image.id.clone();
        assert_matches!(db.insert_entry_with_image(&other, &clash), Err(DatabaseError::SqliteError(_)));
        assert!(db.get_entry(&other.id).unwrap().is_none());
        assert_eq!(db.count_entries().unwrap(), 1);
        assert_eq!(db.count_images().unwrap(), 1);
    }

    #[test]
    fn test_delete_image_unlinks_entry() {
        let db = Database::open_in_memory().unwrap();
        let entry = entry_on("2025-10-01");
        db.insert_entry(&entry).unwrap();
        let image = StoredImage::new(entry.id.clone(), vec![1], "image/png".to_string());
        db.replace_entry_image(&image).unwrap();

        db.delete_image(&image.id).unwrap();
        assert!(db.get_entry(&entry.id).unwrap().unwrap().image_id.is_none());
        assert_matches!(db.delete_image(&image.id), Err(DatabaseError::NotFound { kind: "Image", .. }));
    }

    #[test]
    fn test_delete_field_prunes_view_configs() {
        let db = Database::open_in_memory().unwrap();
        let a = field("Gewicht", 0);
        let b = field("KFA", 1);
        db.insert_field(&a).unwrap();
        db.insert_field(&b).unwrap();
        let config = ViewConfiguration::new("Body".to_string(), vec![a.id.clone(), b.id.clone()]);
        db.insert_view_config(&config).unwrap();

        let mut entry = entry_on("2025-10-01");
        entry.values.insert(a.id.clone(), FieldValue::Number(75.0));
        db.insert_entry(&entry).unwrap();

        db.delete_field(&a.id).unwrap();

        let config = db.get_view_config(&config.id).unwrap().unwrap();
        assert_eq!(config.field_ids, vec![b.id.clone()]);
        // entry values referencing the deleted field stay as orphans
        let entry = db.get_entry(&entry.id).unwrap().unwrap();
        assert!(entry.values.contains_key(&a.id));
    }

    #[test]
    fn test_entries_in_range_and_clear() {
        let db = Database::open_in_memory().unwrap();
        for date in ["2025-09-30", "2025-10-01", "2025-10-15", "2025-10-16"] {
            db.insert_entry(&entry_on(date)).unwrap();
        }
        let start = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 10, 15).unwrap();
        assert_eq!(db.get_entries_in_range(start, end).unwrap().len(), 2);

        db.insert_field(&field("Gewicht", 0)).unwrap();
        db.mark_migration_applied("default-fields").unwrap();
        db.clear_all_data().unwrap();
        assert_eq!(db.stats().unwrap(), DbStats::default());
        assert!(db.is_migration_applied("default-fields").unwrap());
    }
}
