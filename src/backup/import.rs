use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use zip::ZipArchive;
use zip::result::ZipError;

use super::{
    BackupError, BackupMetadata, ExportData, ImportMode, ImportResult, DATA_FORMAT_VERSION,
    IMAGES_DIR, METADATA_FILE,
};
use crate::database::Database;
use crate::models::{new_id, mime_type_for_extension, Entry, EntryUpdate, Field, StoredImage};

/// Warnings spelled out in the result message; the rest are only counted
const MAX_LISTED_WARNINGS: usize = 5;

/// Image stem used for photos that never got attached to an entry
const UNATTACHED_IMAGE_STEM: &str = "temp";

/// Import a backup archive from disk. Never fails: every problem ends up in
/// the returned result.
pub fn import_from_zip(db: &Database, path: &Path, mode: ImportMode) -> ImportResult {
    match File::open(path) {
        Ok(file) => import_from_reader(db, file, mode),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "cannot open backup file");
            ImportResult::failure(format!("Import failed: {}", e))
        }
    }
}

/// Import a backup archive from any seekable reader.
///
/// A missing `metadata.json`, a version mismatch or a structural problem
/// aborts before anything is written. Once writing starts, items that fail
/// are skipped and reported as warnings.
pub fn import_from_reader<R: Read + Seek>(db: &Database, reader: R, mode: ImportMode) -> ImportResult {
    match run_import(db, reader, mode) {
        Ok(result) => result,
        Err(err) => {
            tracing::error!(error = %err, %mode, "import aborted");
            match err {
                BackupError::MissingMetadata
                | BackupError::IncompatibleVersion { .. }
                | BackupError::Validation(_) => ImportResult::failure(err.to_string()),
                other => ImportResult::failure(format!("Import failed: {}", other)),
            }
        }
    }
}

/// Read the summary of a backup archive without touching the database
pub fn inspect_backup<R: Read + Seek>(reader: R) -> Result<BackupMetadata, BackupError> {
    let mut archive = ZipArchive::new(reader)?;
    let data = read_metadata(&mut archive)?;
    let images_count = image_file_names(&archive).len();

    Ok(BackupMetadata {
        version: data.version,
        export_date: data.export_date,
        fields_count: data.fields.len(),
        entries_count: data.entries.len(),
        images_count,
    })
}

fn run_import<R: Read + Seek>(db: &Database, reader: R, mode: ImportMode) -> Result<ImportResult, BackupError> {
    let mut archive = ZipArchive::new(reader)?;
    let data = read_metadata(&mut archive)?;

    if mode == ImportMode::Overwrite {
        db.clear_all_data()?;
        tracing::info!("cleared existing data for overwrite import");
    }

    let mut warnings: Vec<String> = Vec::new();

    // Fields. Merged fields go after the existing ones so `order` stays unique.
    let mut field_ids: HashMap<String, String> = HashMap::new();
    let order_base = match mode {
        ImportMode::Merge => db.get_max_field_order()? + 1,
        ImportMode::Overwrite => 0,
    };
    for (index, field) in data.fields.iter().enumerate() {
        let mut imported = field.clone();
        if mode == ImportMode::Merge {
            imported.id = new_id();
            imported.order = order_base + index as i64;
        }
        match db.insert_field(&imported) {
            Ok(()) => {
                field_ids.insert(field.id.clone(), imported.id);
            }
            Err(e) => {
                tracing::warn!(field = %field.name, error = %e, "skipping field");
                warnings.push(format!("Field '{}' could not be imported: {}", field.name, e));
            }
        }
    }
    let fields_imported = field_ids.len();

    // Entries, written without images; the image link is restored below.
    let mut entry_ids: HashMap<String, String> = HashMap::new();
    for entry in &data.entries {
        let mut imported = entry.clone();
        if mode == ImportMode::Merge {
            imported.id = new_id();
        }
        imported.image_id = None;

        let mut dropped = 0usize;
        imported.values = entry
            .values
            .iter()
            .filter_map(|(field_id, value)| match field_ids.get(field_id) {
                Some(new_field_id) => Some((new_field_id.clone(), value.clone())),
                None => {
                    dropped += 1;
                    None
                }
            })
            .collect();
        if dropped > 0 {
            warnings.push(format!(
                "Entry {}: {} value(s) dropped because their field was not imported",
                entry.id, dropped
            ));
        }

        match db.insert_entry(&imported) {
            Ok(()) => {
                entry_ids.insert(entry.id.clone(), imported.id);
            }
            Err(e) => {
                tracing::warn!(entry_id = %entry.id, error = %e, "skipping entry");
                warnings.push(format!("Entry {} could not be imported: {}", entry.id, e));
            }
        }
    }
    let entries_imported = entry_ids.len();

    // Images are named after the entry they belonged to in the source data.
    let mut images_by_entry: HashMap<String, String> = HashMap::new();
    for name in image_file_names(&archive) {
        let filename = name.rsplit('/').next().unwrap_or(name.as_str());
        let stem = filename.split('.').next().unwrap_or(filename);
        let extension = filename.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");

        let new_entry_id = match entry_ids.get(stem) {
            Some(id) if stem != UNATTACHED_IMAGE_STEM => id.clone(),
            _ => {
                tracing::warn!(image = %name, "skipping image without matching entry");
                warnings.push(format!("Image {} has no matching entry and was skipped", filename));
                continue;
            }
        };

        let bytes = match read_archive_file(&mut archive, &name) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(image = %name, error = %e, "cannot read image from archive");
                warnings.push(format!("Image {} could not be read: {}", filename, e));
                continue;
            }
        };

        let image = StoredImage::new(new_entry_id.clone(), bytes, mime_type_for_extension(extension).to_string());
        match db.insert_image(&image) {
            Ok(()) => {
                images_by_entry.insert(new_entry_id, image.id);
            }
            Err(e) => {
                tracing::warn!(image = %name, error = %e, "skipping image");
                warnings.push(format!("Image {} could not be imported: {}", filename, e));
            }
        }
    }
    let images_imported = images_by_entry.len();

    // Point entries that had a photo at their newly stored image
    for entry in &data.entries {
        if entry.image_id.is_none() {
            continue;
        }
        let Some(new_entry_id) = entry_ids.get(&entry.id) else {
            continue;
        };
        let Some(new_image_id) = images_by_entry.get(new_entry_id) else {
            continue;
        };
        let update = EntryUpdate {
            image_id: Some(Some(new_image_id.clone())),
            ..Default::default()
        };
        if let Err(e) = db.update_entry(new_entry_id, &update) {
            tracing::warn!(entry_id = %new_entry_id, error = %e, "cannot link image to entry");
            warnings.push(format!("Image for entry {} could not be linked: {}", entry.id, e));
        }
    }

    let success = fields_imported + entries_imported + images_imported > 0;
    let headline = if success {
        "Import completed successfully."
    } else {
        "Nothing was imported."
    };
    let message = with_warnings(headline, &warnings);

    tracing::info!(
        %mode,
        success,
        fields = fields_imported,
        entries = entries_imported,
        images = images_imported,
        warnings = warnings.len(),
        "import finished"
    );

    Ok(ImportResult {
        success,
        message,
        fields_imported,
        entries_imported,
        images_imported,
        warnings,
    })
}

fn with_warnings(headline: &str, warnings: &[String]) -> String {
    if warnings.is_empty() {
        return headline.to_string();
    }
    let listed = warnings
        .iter()
        .take(MAX_LISTED_WARNINGS)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("; ");
    let mut message = format!("{} {} warning(s): {}", headline, warnings.len(), listed);
    if warnings.len() > MAX_LISTED_WARNINGS {
        message.push_str(&format!(" (and {} more)", warnings.len() - MAX_LISTED_WARNINGS));
    }
    message
}

/// Locate, version-check and validate `metadata.json`
fn read_metadata<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<ExportData, BackupError> {
    let raw = match read_archive_file(archive, METADATA_FILE) {
        Ok(bytes) => String::from_utf8(bytes)
            .map_err(|e| BackupError::Validation(vec![format!("{} is not UTF-8: {}", METADATA_FILE, e)]))?,
        Err(BackupError::Archive(ZipError::FileNotFound)) => return Err(BackupError::MissingMetadata),
        Err(e) => return Err(e),
    };

    let value: Value = serde_json::from_str(&raw)?;

    let version = value.get("version").and_then(Value::as_str).unwrap_or_default();
    if version != DATA_FORMAT_VERSION {
        return Err(BackupError::IncompatibleVersion {
            found: if version.is_empty() { "(missing)".to_string() } else { version.to_string() },
            expected: DATA_FORMAT_VERSION,
        });
    }

    let problems = validate_structure(&value);
    if !problems.is_empty() {
        return Err(BackupError::Validation(problems));
    }

    decode_export_data(&value)
}

/// Decode fields and entries one at a time so every malformed item is
/// reported, not only the first
fn decode_export_data(value: &Value) -> Result<ExportData, BackupError> {
    let mut problems = Vec::new();

    let export_date = match value.get("exportDate") {
        None => Utc::now(),
        Some(raw) => serde_json::from_value(raw.clone()).unwrap_or_else(|e| {
            problems.push(format!("exportDate is invalid: {}", e));
            Utc::now()
        }),
    };
    let fields: Vec<Field> = decode_items(value, "fields", &mut problems);
    let entries: Vec<Entry> = decode_items(value, "entries", &mut problems);

    if !problems.is_empty() {
        return Err(BackupError::Validation(problems));
    }
    Ok(ExportData {
        version: DATA_FORMAT_VERSION.to_string(),
        export_date,
        fields,
        entries,
    })
}

fn decode_items<T: DeserializeOwned>(value: &Value, key: &str, problems: &mut Vec<String>) -> Vec<T> {
    let Some(items) = value.get(key).and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut decoded = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match serde_json::from_value(item.clone()) {
            Ok(parsed) => decoded.push(parsed),
            Err(e) => {
                let label = match item.get("id").and_then(Value::as_str) {
                    Some(id) => format!("{}[{}] ({})", key, index, id),
                    None => format!("{}[{}]", key, index),
                };
                problems.push(format!("{} is invalid: {}", label, e));
            }
        }
    }
    decoded
}

/// Every structural problem in the metadata document, not just the first
fn validate_structure(value: &Value) -> Vec<String> {
    let mut problems = Vec::new();
    let mut field_ids: HashSet<&str> = HashSet::new();

    match value.get("fields") {
        Some(Value::Array(fields)) => {
            for (index, field) in fields.iter().enumerate() {
                match field.get("id").and_then(Value::as_str) {
                    Some(id) => {
                        field_ids.insert(id);
                    }
                    None => problems.push(format!("fields[{}] has no id", index)),
                }
            }
        }
        Some(_) => problems.push("'fields' is not a list".to_string()),
        None => problems.push("'fields' is missing".to_string()),
    }

    match value.get("entries") {
        Some(Value::Array(entries)) => {
            for (index, entry) in entries.iter().enumerate() {
                let label = match entry.get("id").and_then(Value::as_str) {
                    Some(id) => format!("entry {}", id),
                    None => {
                        problems.push(format!("entries[{}] has no id", index));
                        format!("entries[{}]", index)
                    }
                };
                match entry.get("values") {
                    Some(Value::Object(values)) => {
                        for field_id in values.keys() {
                            if !field_ids.contains(field_id.as_str()) {
                                problems.push(format!("{} references unknown field {}", label, field_id));
                            }
                        }
                    }
                    Some(_) => problems.push(format!("{} has malformed values", label)),
                    None => {}
                }
            }
        }
        Some(_) => problems.push("'entries' is not a list".to_string()),
        None => problems.push("'entries' is missing".to_string()),
    }

    problems
}

fn image_file_names<R: Read + Seek>(archive: &ZipArchive<R>) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|name| name.starts_with(IMAGES_DIR) && !name.ends_with('/'))
        .map(String::from)
        .collect();
    names.sort();
    names
}

fn read_archive_file<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>, BackupError> {
    let mut file = archive.by_name(name)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validation_collects_every_problem() {
        let value = json!({
            "version": "1.0",
            "fields": [{ "id": "f1" }, { "name": "no id" }],
            "entries": [
                { "id": "e1", "values": { "f1": 1, "f9": 2 } },
                { "values": { "f8": 3 } },
                { "id": "e3", "values": [] }
            ]
        });
        let problems = validate_structure(&value);
        assert_eq!(problems.len(), 5, "{:?}", problems);
        assert!(problems.contains(&"fields[1] has no id".to_string()));
        assert!(problems.contains(&"entry e1 references unknown field f9".to_string()));
        assert!(problems.contains(&"entries[1] has no id".to_string()));
        assert!(problems.contains(&"entries[1] references unknown field f8".to_string()));
        assert!(problems.contains(&"entry e3 has malformed values".to_string()));
    }

    #[test]
    fn test_validation_requires_lists() {
        let problems = validate_structure(&json!({ "version": "1.0", "fields": {} }));
        assert_eq!(problems, vec!["'fields' is not a list".to_string(), "'entries' is missing".to_string()]);
    }

    #[test]
    fn test_decode_lists_every_malformed_item() {
        let value = json!({
            "version": "1.0",
            "fields": [
                { "id": "f1", "name": "Gewicht", "unit": "kg", "type": "number", "order": 0 },
                { "id": "f2", "name": "Laune", "unit": "-", "type": "emoji", "order": 1 }
            ],
            "entries": [
                { "id": "e1", "date": "gestern", "values": { "f1": 75 } },
                { "id": "e2", "date": "2025-10-02", "values": { "f1": 74 } },
                { "id": "e3", "date": "2025-10-03", "values": { "f1": [1] } }
            ]
        });
        let problems = match decode_export_data(&value) {
            Err(BackupError::Validation(problems)) => problems,
            other => panic!("expected validation error, got {:?}", other),
        };
        assert_eq!(problems.len(), 3, "{:?}", problems);
        assert!(problems[0].starts_with("fields[1] (f2) is invalid"));
        assert!(problems[1].starts_with("entries[0] (e1) is invalid"));
        assert!(problems[2].starts_with("entries[2] (e3) is invalid"));
    }

    #[test]
    fn test_decode_well_formed_data() {
        let value = json!({
            "version": "1.0",
            "exportDate": "2025-10-16T08:00:00.000Z",
            "fields": [{ "id": "f1", "name": "Gewicht", "unit": "kg", "type": "number", "order": 0 }],
            "entries": [{ "id": "e1", "date": "2025-10-01", "values": { "f1": 75 } }]
        });
        let data = decode_export_data(&value).unwrap();
        assert_eq!(data.export_date.to_rfc3339(), "2025-10-16T08:00:00+00:00");
        assert_eq!(data.fields.len(), 1);
        assert_eq!(data.entries[0].id, "e1");
    }

    #[test]
    fn test_warning_message_is_capped() {
        let warnings: Vec<String> = (1..=7).map(|i| format!("w{}", i)).collect();
        let message = with_warnings("Import completed successfully.", &warnings);
        assert_eq!(
            message,
            "Import completed successfully. 7 warning(s): w1; w2; w3; w4; w5 (and 2 more)"
        );
        assert_eq!(with_warnings("Done.", &[]), "Done.");
    }
}
