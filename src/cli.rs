use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::app::App;
use crate::backup::{self, BackupError, ImportMode};
use crate::database::{Database, DatabaseError};
use crate::models::{
    mime_type_for_extension, ChartType, Entry, EntryUpdate, Field, FieldType, FieldUpdate, FieldValue,
    GoalDirection, StoredImage, ViewConfigUpdate, ViewConfiguration,
};
use crate::stats::{compute_field_statistics, format_change_value, format_stat_value};
use crate::utils::{format_date, format_file_size, parse_date, sanitize_filename, today};
use crate::validation::{self, ValidationError};

#[derive(Parser)]
#[command(name = "traqit")]
#[command(about = "TraqIt - track body measurements, trends and progress photos")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Use development mode (uses separate dev config/database)
    #[arg(long)]
    pub dev: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage measurement fields
    #[command(subcommand)]
    Field(FieldCommand),
    /// Manage dated entries
    #[command(subcommand)]
    Entry(EntryCommand),
    /// Manage saved dashboard views
    #[command(subcommand)]
    View(ViewCommand),
    /// Show current/min/max/average and recent change per numeric field
    Stats {
        /// Only this field (id or name)
        #[arg(long)]
        field: Option<String>,
    },
    /// Write a backup archive (or only the CSV table)
    Export {
        /// Export only data.csv, without metadata or images
        #[arg(long)]
        csv: bool,
        /// Target directory (defaults to the configured export_dir)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Restore a backup archive
    Import {
        /// Path to the .zip backup
        file: PathBuf,
        /// merge keeps existing data, overwrite replaces it
        #[arg(long, value_enum)]
        mode: Option<ImportMode>,
    },
    /// Show what a backup archive contains without importing it
    Inspect {
        file: PathBuf,
    },
    /// Show how much data is stored
    Info,
}

#[derive(Subcommand)]
pub enum FieldCommand {
    /// List fields in display order
    List,
    /// Create a field
    Add {
        name: String,
        #[arg(long)]
        unit: String,
        #[arg(long = "type", value_enum, default_value = "number")]
        field_type: FieldType,
        #[arg(long, value_enum)]
        goal: Option<GoalDirection>,
    },
    /// Change a field
    Update {
        /// Field id or name
        field: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        unit: Option<String>,
        #[arg(long = "type", value_enum)]
        field_type: Option<FieldType>,
        #[arg(long, value_enum)]
        goal: Option<GoalDirection>,
    },
    /// Delete a field (its values stay on existing entries)
    Delete {
        field: String,
    },
    /// Set the display order; fields are numbered in the given sequence
    Reorder {
        #[arg(required = true)]
        fields: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum EntryCommand {
    /// List entries, oldest first
    List {
        /// From date (YYYY-MM-DD), inclusive
        #[arg(long)]
        from: Option<String>,
        /// To date (YYYY-MM-DD), inclusive
        #[arg(long)]
        to: Option<String>,
    },
    /// Record a measurement
    Add {
        /// Measurement date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
        /// FIELD=VALUE, repeatable; FIELD is an id or name
        #[arg(long = "value", required = true)]
        values: Vec<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Progress photo to attach
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Change an entry; given values are merged into the existing ones
    Update {
        id: String,
        #[arg(long)]
        date: Option<String>,
        #[arg(long = "value")]
        values: Vec<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Delete an entry and its photo
    Delete {
        id: String,
    },
    /// Attach or replace the photo of an entry
    AttachImage {
        id: String,
        path: PathBuf,
    },
    /// Remove the photo of an entry
    DetachImage {
        id: String,
    },
    /// Save the photo of an entry to a file
    Image {
        id: String,
        /// Target file (extension follows the stored type) or directory
        #[arg(long)]
        out: PathBuf,
    },
    /// Save the photos of two entries side by side as before/after
    Compare {
        first: String,
        second: String,
        /// Directory the two photos are written to
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum ViewCommand {
    List,
    Add {
        name: String,
        /// Field id or name, repeatable
        #[arg(long = "field", required = true)]
        fields: Vec<String>,
        #[arg(long, value_enum)]
        chart: Option<ChartType>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Rename a view or change its fields or chart
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        /// Replaces the field list when given; repeatable
        #[arg(long = "field")]
        fields: Vec<String>,
        #[arg(long, value_enum)]
        chart: Option<ChartType>,
    },
    Delete {
        id: String,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
    #[error("{0}")]
    ValidationError(#[from] ValidationError),
    #[error("Backup error: {0}")]
    BackupError(#[from] BackupError),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse date: {0}")]
    DateParseError(String),
    #[error("Unknown field: {0}")]
    UnknownField(String),
    #[error("Expected FIELD=VALUE, got '{0}'")]
    MalformedValue(String),
    #[error("Entry {0} has no image")]
    NoImage(String),
    #[error("{0}")]
    ImportFailed(String),
}

fn parse_date_arg(date_str: &str) -> Result<chrono::NaiveDate, CliError> {
    parse_date(date_str)
        .map_err(|e| CliError::DateParseError(format!("Invalid date format '{}': {}", date_str, e)))
}

/// Find a field by exact id, falling back to a case-insensitive name match
pub fn resolve_field<'a>(fields: &'a [Field], key: &str) -> Result<&'a Field, CliError> {
    fields
        .iter()
        .find(|f| f.id == key)
        .or_else(|| fields.iter().find(|f| f.name.to_lowercase() == key.to_lowercase()))
        .ok_or_else(|| CliError::UnknownField(key.to_string()))
}

/// Turn `FIELD=VALUE` arguments into typed values keyed by field id
pub fn parse_value_assignments(
    fields: &[Field],
    assignments: &[String],
) -> Result<BTreeMap<String, FieldValue>, CliError> {
    let mut values = BTreeMap::new();
    for assignment in assignments {
        let (key, raw) = assignment
            .split_once('=')
            .ok_or_else(|| CliError::MalformedValue(assignment.clone()))?;
        let field = resolve_field(fields, key.trim())?;
        let value = match field.field_type {
            FieldType::Number => FieldValue::Number(validation::validate_numeric_value(raw)?),
            FieldType::Text => {
                validation::validate_text_value(raw)?;
                FieldValue::Text(raw.to_string())
            }
        };
        values.insert(field.id.clone(), value);
    }
    Ok(values)
}

fn load_image(entry_id: &str, path: &Path) -> Result<StoredImage, CliError> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let mime_type = match extension.to_lowercase().as_str() {
        "png" | "webp" | "jpg" | "jpeg" => mime_type_for_extension(extension),
        other => return Err(ValidationError::InvalidImageType(format!("image/{}", other)).into()),
    };
    let data = std::fs::read(path)?;
    validation::validate_image(mime_type, data.len())?;
    Ok(StoredImage::new(entry_id.to_string(), data, mime_type.to_string()))
}

fn get_entry(db: &Database, id: &str) -> Result<Entry, CliError> {
    Ok(db
        .get_entry(id)?
        .ok_or_else(|| DatabaseError::NotFound { kind: "Entry", id: id.to_string() })?)
}

/// The photo of an entry, following `image_id` first and falling back to
/// images stored for the entry without a link
fn find_entry_image(db: &Database, entry: &Entry) -> Result<StoredImage, CliError> {
    if let Some(image_id) = &entry.image_id {
        if let Some(image) = db.get_image(image_id)? {
            return Ok(image);
        }
    }
    db.get_image_by_entry(&entry.id)?
        .ok_or_else(|| CliError::NoImage(entry.id.clone()))
}

/// Write the photo of an entry to `out` and return the written path.
/// A directory gets `<entryId>.<ext>`; a file path gets its extension set
/// from the stored mime type.
pub fn save_entry_image(db: &Database, entry_id: &str, out: &Path) -> Result<PathBuf, CliError> {
    let entry = get_entry(db, entry_id)?;
    let image = find_entry_image(db, &entry)?;
    let path = if out.is_dir() {
        out.join(format!("{}.{}", entry.id, image.extension()))
    } else {
        out.with_extension(image.extension())
    };
    std::fs::write(&path, &image.data)?;
    Ok(path)
}

/// Before/after photos written by `compare_entry_images`
#[derive(Debug)]
pub struct PhotoComparison {
    pub before: Entry,
    pub before_path: PathBuf,
    pub after: Entry,
    pub after_path: PathBuf,
}

/// Write the photos of two entries into `dir`, the older one as "before"
pub fn compare_entry_images(db: &Database, first: &str, second: &str, dir: &Path) -> Result<PhotoComparison, CliError> {
    let mut before = get_entry(db, first)?;
    let mut after = get_entry(db, second)?;
    if after.date < before.date {
        std::mem::swap(&mut before, &mut after);
    }
    let before_image = find_entry_image(db, &before)?;
    let after_image = find_entry_image(db, &after)?;

    std::fs::create_dir_all(dir)?;
    let before_path = dir.join(sanitize_filename(&format!(
        "before_{}.{}",
        format_date(before.date),
        before_image.extension()
    )));
    let after_path = dir.join(sanitize_filename(&format!(
        "after_{}.{}",
        format_date(after.date),
        after_image.extension()
    )));
    std::fs::write(&before_path, &before_image.data)?;
    std::fs::write(&after_path, &after_image.data)?;

    Ok(PhotoComparison { before, before_path, after, after_path })
}

// ==================== FIELDS ====================

pub fn handle_field(command: FieldCommand, app: &App) -> Result<(), CliError> {
    let db = &app.db;
    match command {
        FieldCommand::List => {
            for field in db.get_all_fields()? {
                println!(
                    "{:>3}  {:<20} {:<6} {:<7} {:<9} {}",
                    field.order,
                    field.name,
                    field.unit,
                    field.field_type.as_str(),
                    field.goal().as_str(),
                    field.id
                );
            }
        }
        FieldCommand::Add { name, unit, field_type, goal } => {
            validation::validate_field_name(&name)?;
            validation::validate_field_unit(&unit)?;

            let mut field = Field::new(name, unit, field_type);
            field.goal_direction = Some(goal.unwrap_or_default());
            field.order = db.get_max_field_order()? + 1;
            db.insert_field(&field)?;
            println!("Field created successfully (ID: {})", field.id);
        }
        FieldCommand::Update { field, name, unit, field_type, goal } => {
            if let Some(name) = &name {
                validation::validate_field_name(name)?;
            }
            if let Some(unit) = &unit {
                validation::validate_field_unit(unit)?;
            }
            let fields = db.get_all_fields()?;
            let id = resolve_field(&fields, &field)?.id.clone();
            let update = FieldUpdate {
                name,
                unit,
                field_type,
                order: None,
                goal_direction: goal,
            };
            let updated = db.update_field(&id, &update)?;
            println!("Field '{}' updated", updated.name);
        }
        FieldCommand::Delete { field } => {
            let fields = db.get_all_fields()?;
            let target = resolve_field(&fields, &field)?;
            let views = db.get_view_configs_using_field(&target.id)?;
            db.delete_field(&target.id)?;
            println!("Field '{}' deleted", target.name);
            if !views.is_empty() {
                println!("Removed from {} view(s)", views.len());
            }
        }
        FieldCommand::Reorder { fields: keys } => {
            let fields = db.get_all_fields()?;
            let ids = keys
                .iter()
                .map(|key| resolve_field(&fields, key).map(|f| f.id.clone()))
                .collect::<Result<Vec<_>, _>>()?;
            db.reorder_fields(&ids)?;
            println!("Reordered {} field(s)", ids.len());
        }
    }
    Ok(())
}

// ==================== ENTRIES ====================

pub fn handle_entry(command: EntryCommand, app: &App) -> Result<(), CliError> {
    let db = &app.db;
    match command {
        EntryCommand::List { from, to } => {
            let fields = db.get_all_fields()?;
            let from = from.as_deref().map(parse_date_arg).transpose()?;
            let to = to.as_deref().map(parse_date_arg).transpose()?;
            let entries = match (from, to) {
                (None, None) => db.get_all_entries()?,
                (Some(start), Some(end)) => db.get_entries_in_range(start, end)?,
                (start, end) => db
                    .get_all_entries()?
                    .into_iter()
                    .filter(|e| start.is_none_or(|s| e.date >= s) && end.is_none_or(|d| e.date <= d))
                    .collect(),
            };
            for entry in &entries {
                print_entry(entry, &fields);
            }
        }
        EntryCommand::Add { date, values, notes, image } => {
            let date = match date {
                Some(s) => parse_date_arg(&s)?,
                None => today(),
            };
            if let Some(notes) = &notes {
                validation::validate_notes(notes)?;
            }
            let fields = db.get_all_fields()?;

            let mut entry = Entry::new(date);
            entry.values = parse_value_assignments(&fields, &values)?;
            entry.notes = notes;

            // load the photo before writing anything so a bad file adds nothing
            let image = match &image {
                Some(path) => Some(load_image(&entry.id, path)?),
                None => None,
            };
            match image {
                Some(image) => db.insert_entry_with_image(&entry, &image)?,
                None => db.insert_entry(&entry)?,
            }
            println!("Entry created successfully (ID: {})", entry.id);
        }
        EntryCommand::Update { id, date, values, notes } => {
            let existing = db
                .get_entry(&id)?
                .ok_or_else(|| DatabaseError::NotFound { kind: "Entry", id: id.clone() })?;
            if let Some(notes) = &notes {
                validation::validate_notes(notes)?;
            }
            let fields = db.get_all_fields()?;

            let update = EntryUpdate {
                date: date.as_deref().map(parse_date_arg).transpose()?,
                values: if values.is_empty() {
                    None
                } else {
                    let mut merged = existing.values.clone();
                    merged.extend(parse_value_assignments(&fields, &values)?);
                    Some(merged)
                },
                image_id: None,
                notes: notes.map(Some),
            };
            db.update_entry(&id, &update)?;
            println!("Entry {} updated", id);
        }
        EntryCommand::Delete { id } => {
            db.delete_entry(&id)?;
            println!("Entry {} deleted", id);
        }
        EntryCommand::AttachImage { id, path } => {
            let image = load_image(&id, &path)?;
            let size = image.data.len() as u64;
            db.replace_entry_image(&image)?;
            println!("Image attached to entry {} ({})", id, format_file_size(size));
        }
        EntryCommand::Image { id, out } => {
            let path = save_entry_image(db, &id, &out)?;
            println!("Image saved to {}", path.display());
        }
        EntryCommand::Compare { first, second, out } => {
            let comparison = compare_entry_images(db, &first, &second, &out)?;
            let days = (comparison.after.date - comparison.before.date).num_days();
            println!("Before: {}  {}", format_date(comparison.before.date), comparison.before_path.display());
            println!("After:  {}  {}", format_date(comparison.after.date), comparison.after_path.display());
            println!("{} day(s) apart", days);
        }
        EntryCommand::DetachImage { id } => {
            let entry = get_entry(db, &id)?;
            match entry.image_id {
                Some(image_id) => {
                    db.delete_image(&image_id)?;
                    println!("Image removed from entry {}", id);
                }
                None => println!("Entry {} has no image", id),
            }
        }
    }
    Ok(())
}

fn print_entry(entry: &Entry, fields: &[Field]) {
    let mut cells = Vec::new();
    for field in fields {
        if let Some(value) = entry.values.get(&field.id) {
            cells.push(format!("{}={} {}", field.name, value, field.unit));
        }
    }
    let photo = if entry.image_id.is_some() { " [photo]" } else { "" };
    println!("{}  {}{}  ({})", format_date(entry.date), cells.join(", "), photo, entry.id);
    if let Some(notes) = &entry.notes {
        println!("            {}", notes);
    }
}

// ==================== VIEWS ====================

pub fn handle_view(command: ViewCommand, app: &App) -> Result<(), CliError> {
    let db = &app.db;
    match command {
        ViewCommand::List => {
            let fields = db.get_all_fields()?;
            for config in db.get_all_view_configs()? {
                // dangling ids are possible and simply not shown
                let names: Vec<&str> = config
                    .field_ids
                    .iter()
                    .filter_map(|id| fields.iter().find(|f| &f.id == id).map(|f| f.name.as_str()))
                    .collect();
                let chart = config.chart_type.map(|c| c.as_str()).unwrap_or("-");
                println!("{}  [{}] {}  ({})", config.name, chart, names.join(", "), config.id);
            }
        }
        ViewCommand::Add { name, fields: keys, chart, description } => {
            validation::validate_field_name(&name)?;
            let fields = db.get_all_fields()?;
            let field_ids = keys
                .iter()
                .map(|key| resolve_field(&fields, key).map(|f| f.id.clone()))
                .collect::<Result<Vec<_>, _>>()?;

            let mut config = ViewConfiguration::new(name, field_ids);
            config.chart_type = chart;
            config.description = description;
            config.order = db.get_max_view_config_order()? + 1;
            db.insert_view_config(&config)?;
            println!("View created successfully (ID: {})", config.id);
        }
        ViewCommand::Update { id, name, fields: keys, chart } => {
            if let Some(name) = &name {
                validation::validate_field_name(name)?;
            }
            let fields = db.get_all_fields()?;
            let field_ids = if keys.is_empty() {
                None
            } else {
                Some(
                    keys.iter()
                        .map(|key| resolve_field(&fields, key).map(|f| f.id.clone()))
                        .collect::<Result<Vec<_>, _>>()?,
                )
            };
            let update = ViewConfigUpdate {
                name,
                field_ids,
                chart_type: chart.map(Some),
                ..Default::default()
            };
            let config = db.update_view_config(&id, &update)?;
            println!("View '{}' updated", config.name);
        }
        ViewCommand::Delete { id } => {
            db.delete_view_config(&id)?;
            println!("View {} deleted", id);
        }
    }
    Ok(())
}

// ==================== STATS / BACKUP ====================

pub fn handle_stats(field: Option<String>, app: &App) -> Result<(), CliError> {
    let fields = app.db.get_all_fields()?;
    let entries = app.db.get_all_entries()?;

    let selected: Vec<&Field> = match &field {
        Some(key) => vec![resolve_field(&fields, key)?],
        None => fields.iter().filter(|f| f.field_type == FieldType::Number).collect(),
    };

    let mut shown = 0;
    for field in selected {
        let Some(stats) = compute_field_statistics(&entries, field) else {
            continue;
        };
        let framing = match stats.trend.is_favorable(field.goal()) {
            Some(true) => "on track",
            Some(false) => "off track",
            None => "stable",
        };
        println!(
            "{:<16} {:>10}  min {:>10}  max {:>10}  avg {:>10}  7d {:>10}  30d {:>10}  {} {} ({} values)",
            stats.field_name,
            format_stat_value(Some(stats.current), &field.unit, 1),
            format_stat_value(Some(stats.min), &field.unit, 1),
            format_stat_value(Some(stats.max), &field.unit, 1),
            format_stat_value(Some(stats.average), &field.unit, 1),
            format_change_value(stats.change_7d, &field.unit, 1),
            format_change_value(stats.change_30d, &field.unit, 1),
            stats.trend.symbol(),
            framing,
            stats.data_points
        );
        shown += 1;
    }
    if shown == 0 {
        println!("No numeric data recorded yet");
    }
    Ok(())
}

pub fn handle_export(csv: bool, out: Option<PathBuf>, app: &App) -> Result<(), CliError> {
    let dir = out.unwrap_or_else(|| app.config.get_export_dir());
    let path = if csv {
        backup::export_csv(&app.db, &dir, &app.config.app_name, today())?
    } else {
        backup::export_as_zip(&app.db, &dir, &app.config.app_name, today())?
    };
    println!("Exported to {}", path.display());
    Ok(())
}

pub fn handle_import(file: &Path, mode: Option<ImportMode>, app: &App) -> Result<(), CliError> {
    let mode = mode.unwrap_or(app.config.default_import_mode);
    let result = backup::import_from_zip(&app.db, file, mode);
    if !result.success {
        return Err(CliError::ImportFailed(result.message));
    }
    println!("{}", result.message);
    println!(
        "Imported {} field(s), {} entr(y/ies), {} image(s) ({} mode)",
        result.fields_imported, result.entries_imported, result.images_imported, mode
    );
    Ok(())
}

pub fn handle_inspect(file: &Path) -> Result<(), CliError> {
    let reader = std::fs::File::open(file)?;
    let meta = backup::inspect_backup(reader)?;
    println!("Version:  {}", meta.version);
    println!("Exported: {}", meta.export_date.format("%d.%m.%Y %H:%M"));
    println!("Fields:   {}", meta.fields_count);
    println!("Entries:  {}", meta.entries_count);
    println!("Images:   {}", meta.images_count);
    Ok(())
}

pub fn handle_info(app: &App) -> Result<(), CliError> {
    let stats = app.db.stats()?;
    println!("Database: {}", app.config.get_database_path().display());
    println!("Fields:   {}", stats.fields);
    println!("Entries:  {}", stats.entries);
    println!("Images:   {}", stats.images);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn fields() -> Vec<Field> {
        vec![
            Field::new("Gewicht".to_string(), "kg".to_string(), FieldType::Number),
            Field::new("Stimmung".to_string(), "-".to_string(), FieldType::Text),
        ]
    }

    #[test]
    fn test_resolve_field_by_name_or_id() {
        let fields = fields();
        assert_eq!(resolve_field(&fields, "gewicht").unwrap().name, "Gewicht");
        assert_eq!(resolve_field(&fields, &fields[1].id).unwrap().name, "Stimmung");
        assert_matches!(resolve_field(&fields, "Bauch"), Err(CliError::UnknownField(_)));
    }

    #[test]
    fn test_parse_value_assignments() {
        let fields = fields();
        let values = parse_value_assignments(
            &fields,
            &["Gewicht=74,5".to_string(), "stimmung=gut".to_string()],
        )
        .unwrap();
        assert_eq!(values.get(&fields[0].id), Some(&FieldValue::Number(74.5)));
        assert_eq!(values.get(&fields[1].id), Some(&FieldValue::Text("gut".to_string())));

        assert_matches!(
            parse_value_assignments(&fields, &["Gewicht".to_string()]),
            Err(CliError::MalformedValue(_))
        );
        assert_matches!(
            parse_value_assignments(&fields, &["Gewicht=schwer".to_string()]),
            Err(CliError::ValidationError(ValidationError::InvalidNumber(_)))
        );
    }

    fn entry_with_photo(db: &Database, date: &str, data: Vec<u8>, mime: &str) -> Entry {
        let entry = Entry::new(parse_date(date).unwrap());
        let image = StoredImage::new(entry.id.clone(), data, mime.to_string());
        db.insert_entry_with_image(&entry, &image).unwrap();
        entry
    }

    #[test]
    fn test_save_entry_image() {
        let db = Database::open_in_memory().unwrap();
        let entry = entry_with_photo(&db, "2025-10-01", vec![0x89, 0x50], "image/png");
        let dir = tempfile::tempdir().unwrap();

        let into_dir = save_entry_image(&db, &entry.id, dir.path()).unwrap();
        assert_eq!(into_dir, dir.path().join(format!("{}.png", entry.id)));
        assert_eq!(std::fs::read(&into_dir).unwrap(), vec![0x89, 0x50]);

        let named = save_entry_image(&db, &entry.id, &dir.path().join("foto.jpg")).unwrap();
        assert_eq!(named, dir.path().join("foto.png"));

        let bare = Entry::new(parse_date("2025-10-02").unwrap());
        db.insert_entry(&bare).unwrap();
        assert_matches!(save_entry_image(&db, &bare.id, dir.path()), Err(CliError::NoImage(_)));
        assert_matches!(
            save_entry_image(&db, "missing", dir.path()),
            Err(CliError::DatabaseError(DatabaseError::NotFound { .. }))
        );
    }

    #[test]
    fn test_compare_orders_photos_by_date() {
        let db = Database::open_in_memory().unwrap();
        let later = entry_with_photo(&db, "2025-10-15", vec![2], "image/jpeg");
        let earlier = entry_with_photo(&db, "2025-10-01", vec![1], "image/webp");
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("vergleich");

        let comparison = compare_entry_images(&db, &later.id, &earlier.id, &out).unwrap();
        assert_eq!(comparison.before.id, earlier.id);
        assert_eq!(comparison.after.id, later.id);
        assert_eq!(comparison.before_path, out.join("before_01.10.2025.webp"));
        assert_eq!(comparison.after_path, out.join("after_15.10.2025.jpeg"));
        assert_eq!(std::fs::read(&comparison.before_path).unwrap(), vec![1]);
        assert_eq!(std::fs::read(&comparison.after_path).unwrap(), vec![2]);
    }
}
