use chrono::{NaiveDate, Utc};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{BackupError, ExportData, CSV_FILE, DATA_FORMAT_VERSION, IMAGES_DIR, METADATA_FILE};
use crate::database::Database;
use crate::utils::{format_date, sanitize_filename};

/// Write a full backup archive of the database into `writer`.
///
/// Entry values keyed by fields that no longer exist are left out of the
/// metadata so the archive always passes the importer's structural check.
pub fn export_to_writer<W: Write + Seek>(db: &Database, writer: W) -> Result<W, BackupError> {
    let fields = db.get_all_fields()?;
    let mut entries = db.get_all_entries()?;
    let images = db.get_all_images()?;

    let field_ids: HashSet<&str> = fields.iter().map(|f| f.id.as_str()).collect();
    let mut pruned = 0usize;
    for entry in &mut entries {
        let before = entry.values.len();
        entry.values.retain(|field_id, _| field_ids.contains(field_id.as_str()));
        pruned += before - entry.values.len();
    }
    if pruned > 0 {
        tracing::debug!(pruned, "left orphaned entry values out of export");
    }

    let csv = super::generate_csv(&fields, &entries)?;
    let data = ExportData {
        version: DATA_FORMAT_VERSION.to_string(),
        export_date: Utc::now(),
        fields,
        entries,
    };

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(writer);

    zip.start_file(METADATA_FILE, options)?;
    zip.write_all(serde_json::to_string_pretty(&data)?.as_bytes())?;

    zip.start_file(CSV_FILE, options)?;
    zip.write_all(csv.as_bytes())?;

    let mut written = HashSet::new();
    for image in &images {
        let name = format!("{}{}.{}", IMAGES_DIR, image.entry_id, image.extension());
        // one image per entry; later duplicates would collide in the archive
        if !written.insert(name.clone()) {
            tracing::warn!(image_id = %image.id, entry_id = %image.entry_id, "skipping second image for entry");
            continue;
        }
        zip.start_file(name, options)?;
        zip.write_all(&image.data)?;
    }

    let writer = zip.finish()?;
    tracing::info!(
        fields = data.fields.len(),
        entries = data.entries.len(),
        images = written.len(),
        "backup archive written"
    );
    Ok(writer)
}

/// Write a full backup archive into `dir` and return its path
pub fn export_as_zip(db: &Database, dir: &Path, app_name: &str, today: NaiveDate) -> Result<PathBuf, BackupError> {
    fs::create_dir_all(dir)?;
    let filename = sanitize_filename(&format!("{}_Backup_{}.zip", app_name, format_date(today)));
    let path = dir.join(filename);

    let file = File::create(&path)?;
    let mut file = export_to_writer(db, file)?;
    file.flush()?;

    Ok(path)
}

/// Write only the CSV table (no images) into `dir` and return its path
pub fn export_csv(db: &Database, dir: &Path, app_name: &str, today: NaiveDate) -> Result<PathBuf, BackupError> {
    let fields = db.get_all_fields()?;
    let entries = db.get_all_entries()?;
    let csv = super::generate_csv(&fields, &entries)?;

    fs::create_dir_all(dir)?;
    let filename = sanitize_filename(&format!("{}_Export_{}.csv", app_name, format_date(today)));
    let path = dir.join(filename);
    fs::write(&path, csv)?;

    tracing::info!(path = %path.display(), entries = entries.len(), "csv export written");
    Ok(path)
}
