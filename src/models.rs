use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Generate a fresh opaque identifier
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Number,
    Text,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Number => "number",
            FieldType::Text => "text",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "number" => Some(FieldType::Number),
            "text" => Some(FieldType::Text),
            _ => None,
        }
    }
}

/// Whether a rising or falling value counts as progress for a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GoalDirection {
    #[default]
    Increase,
    Decrease,
}

impl GoalDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalDirection::Increase => "increase",
            GoalDirection::Decrease => "decrease",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "increase" => Some(GoalDirection::Increase),
            "decrease" => Some(GoalDirection::Decrease),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Line,
    Bar,
    Pie,
}

impl ChartType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Line => "line",
            ChartType::Bar => "bar",
            ChartType::Pie => "pie",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "line" => Some(ChartType::Line),
            "bar" => Some(ChartType::Bar),
            "pie" => Some(ChartType::Pie),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: String,
    pub name: String,
    pub unit: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub order: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_direction: Option<GoalDirection>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Field {
    pub fn new(name: String, unit: String, field_type: FieldType) -> Self {
        Self {
            id: new_id(),
            name,
            unit,
            field_type,
            order: 0,
            goal_direction: None,
            created_at: Utc::now(),
        }
    }

    /// Effective goal direction, `Increase` when none was set
    pub fn goal(&self) -> GoalDirection {
        self.goal_direction.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FieldUpdate {
    pub name: Option<String>,
    pub unit: Option<String>,
    pub field_type: Option<FieldType>,
    pub order: Option<i64>,
    pub goal_direction: Option<GoalDirection>,
}

/// A single recorded value; numeric or free text depending on the field type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    #[serde(with = "entry_date")]
    pub date: NaiveDate,
    #[serde(default)]
    pub values: BTreeMap<String, FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Entry {
    pub fn new(date: NaiveDate) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            date,
            values: BTreeMap::new(),
            image_id: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EntryUpdate {
    pub date: Option<NaiveDate>,
    pub values: Option<BTreeMap<String, FieldValue>>,
    pub image_id: Option<Option<String>>,
    pub notes: Option<Option<String>>,
}

/// Entry dates are plain calendar dates, but older archives carry full
/// RFC 3339 timestamps of local midnight; those are read back as the local
/// calendar day.
mod entry_date {
    use chrono::{DateTime, Local, NaiveDate};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format("%Y-%m-%d").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if let Ok(date) = NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
            return Ok(date);
        }
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Local).date_naive())
            .map_err(|e| serde::de::Error::custom(format!("invalid date '{}': {}", raw, e)))
    }
}

/// Binary image attached to an entry. The payload never goes into JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredImage {
    pub id: String,
    pub entry_id: String,
    pub data: Vec<u8>,
    pub mime_type: String,
    pub size: i64,
    pub uploaded_at: DateTime<Utc>,
}

impl StoredImage {
    pub fn new(entry_id: String, data: Vec<u8>, mime_type: String) -> Self {
        let size = data.len() as i64;
        Self {
            id: new_id(),
            entry_id,
            data,
            mime_type,
            size,
            uploaded_at: Utc::now(),
        }
    }

    /// File extension derived from the mime subtype, `jpg` when there is none
    pub fn extension(&self) -> &str {
        match self.mime_type.split('/').nth(1) {
            Some(ext) if !ext.is_empty() => ext,
            _ => "jpg",
        }
    }
}

/// Mime type implied by an image file extension
pub fn mime_type_for_extension(ext: &str) -> &'static str {
    match ext.to_lowercase().as_str() {
        "png" => "image/png",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewConfiguration {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub field_ids: Vec<String>,
    pub icon: Option<String>,
    pub chart_type: Option<ChartType>,
    pub order: i64,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ViewConfiguration {
    pub fn new(name: String, field_ids: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            name,
            description: None,
            field_ids,
            icon: None,
            chart_type: None,
            order: 0,
            is_default: false,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ViewConfigUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub field_ids: Option<Vec<String>>,
    pub icon: Option<Option<String>>,
    pub chart_type: Option<Option<ChartType>>,
    pub order: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_date_accepts_timestamp() {
        let json = r#"{"id":"e1","date":"2025-10-01T22:00:00.000Z","values":{"f1":75,"f2":"ok"}}"#;
        let entry: Entry = serde_json::from_str(json).expect("entry should parse");
        // the day the user picked, in their own time zone (2025-10-02 in Berlin)
        let local_day = DateTime::parse_from_rfc3339("2025-10-01T22:00:00.000Z")
            .unwrap()
            .with_timezone(&chrono::Local)
            .date_naive();
        assert_eq!(entry.date, local_day);
        assert_eq!(entry.values.get("f1"), Some(&FieldValue::Number(75.0)));
        assert_eq!(entry.values.get("f2"), Some(&FieldValue::Text("ok".to_string())));
        assert!(entry.image_id.is_none());
    }

    #[test]
    fn test_entry_date_plain_and_offset() {
        let plain: Entry = serde_json::from_str(r#"{"id":"e1","date":"2025-10-02"}"#).unwrap();
        assert_eq!(plain.date, NaiveDate::from_ymd_opt(2025, 10, 2).unwrap());

        // an explicit offset is converted like a UTC timestamp
        let offset: Entry = serde_json::from_str(r#"{"id":"e2","date":"2025-10-02T00:00:00+02:00"}"#).unwrap();
        let expected = DateTime::parse_from_rfc3339("2025-10-02T00:00:00+02:00")
            .unwrap()
            .with_timezone(&chrono::Local)
            .date_naive();
        assert_eq!(offset.date, expected);
        assert_eq!(serde_json::to_value(&plain).unwrap()["date"], "2025-10-02");
    }

    #[test]
    fn test_field_wire_format() {
        let mut field = Field::new("Gewicht".to_string(), "kg".to_string(), FieldType::Number);
        field.goal_direction = Some(GoalDirection::Decrease);
        let value = serde_json::to_value(&field).unwrap();
        assert_eq!(value["type"], "number");
        assert_eq!(value["goalDirection"], "decrease");
        assert!(value.get("createdAt").is_some());
    }

    #[test]
    fn test_image_extension() {
        let png = StoredImage::new("e1".to_string(), vec![1, 2], "image/png".to_string());
        assert_eq!(png.extension(), "png");
        assert_eq!(png.size, 2);
        let bare = StoredImage::new("e1".to_string(), vec![], "image".to_string());
        assert_eq!(bare.extension(), "jpg");
        assert_eq!(mime_type_for_extension("PNG"), "image/png");
        assert_eq!(mime_type_for_extension("webp"), "image/webp");
        assert_eq!(mime_type_for_extension("gif"), "image/jpeg");
    }
}
