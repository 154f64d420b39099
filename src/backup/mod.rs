//! Portable backups: a ZIP archive holding `metadata.json`, a denormalized
//! `data.csv`, and one `images/<entryId>.<ext>` file per entry photo.

mod csv;
mod export;
mod import;


use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::database::DatabaseError;
use crate::models::{Entry, Field};

pub use csv::generate_csv;
pub use export::{export_as_zip, export_csv, export_to_writer};
pub use import::{import_from_reader, import_from_zip, inspect_backup};

/// The only metadata version this build reads or writes
pub const DATA_FORMAT_VERSION: &str = "1.0";

pub const METADATA_FILE: &str = "metadata.json";
pub const CSV_FILE: &str = "data.csv";
pub const IMAGES_DIR: &str = "images/";

/// How an import treats data already in the database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Keep existing data; imported items get fresh ids
    #[default]
    Merge,
    /// Wipe existing data first; imported items keep their ids
    Overwrite,
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportMode::Merge => write!(f, "merge"),
            ImportMode::Overwrite => write!(f, "overwrite"),
        }
    }
}

/// Contents of `metadata.json`. Images travel as separate archive files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    pub version: String,
    #[serde(default = "Utc::now")]
    pub export_date: DateTime<Utc>,
    pub fields: Vec<Field>,
    pub entries: Vec<Entry>,
}

/// Outcome of an import, rendered directly to the user
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImportResult {
    pub success: bool,
    pub message: String,
    pub fields_imported: usize,
    pub entries_imported: usize,
    pub images_imported: usize,
    pub warnings: Vec<String>,
}

impl ImportResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Default::default()
        }
    }
}

/// Summary of an archive, read without importing anything
#[derive(Debug, Clone, PartialEq)]
pub struct BackupMetadata {
    pub version: String,
    pub export_date: DateTime<Utc>,
    pub fields_count: usize,
    pub entries_count: usize,
    pub images_count: usize,
}

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Invalid backup file: metadata.json not found")]
    MissingMetadata,
    #[error("Incompatible version: {found}. Current version: {expected}")]
    IncompatibleVersion { found: String, expected: &'static str },
    #[error("Invalid backup data: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}
