use ::csv::{QuoteStyle, Terminator, WriterBuilder};

use super::BackupError;
use crate::models::{Entry, Field};
use crate::utils::format_date;

/// One row per entry: date, notes, then one column per field.
/// Returns an empty string when there are no entries.
pub fn generate_csv(fields: &[Field], entries: &[Entry]) -> Result<String, BackupError> {
    if entries.is_empty() {
        return Ok(String::new());
    }

    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    let mut headers = vec!["Datum".to_string(), "Notizen".to_string()];
    headers.extend(fields.iter().map(|field| format!("{} ({})", field.name, field.unit)));
    writer.write_record(&headers)?;

    for entry in entries {
        let mut row = vec![format_date(entry.date), entry.notes.clone().unwrap_or_default()];
        row.extend(fields.iter().map(|field| {
            entry
                .values
                .get(&field.id)
                .map(|value| value.to_string())
                .unwrap_or_default()
        }));
        writer.write_record(&row)?;
    }

    let data = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}
