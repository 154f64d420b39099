//! Per-field summary statistics over dated entries.
//!
//! Nothing here fails: a field without usable numeric values simply has no
//! statistics.

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::models::{Entry, Field, FieldValue, GoalDirection};
use crate::utils::{self, parse_localized_number};

/// Changes smaller than this count as no movement
pub const STABLE_THRESHOLD: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

impl Trend {
    fn from_change(change: f64) -> Self {
        if change.abs() < STABLE_THRESHOLD {
            Trend::Stable
        } else if change > 0.0 {
            Trend::Up
        } else {
            Trend::Down
        }
    }

    /// Whether the movement is progress for a field with the given goal.
    /// `None` for a stable trend.
    pub fn is_favorable(&self, goal: GoalDirection) -> Option<bool> {
        match (self, goal) {
            (Trend::Stable, _) => None,
            (Trend::Up, GoalDirection::Increase) | (Trend::Down, GoalDirection::Decrease) => Some(true),
            _ => Some(false),
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Trend::Up => "↑",
            Trend::Down => "↓",
            Trend::Stable => "→",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldStatistics {
    pub field_id: String,
    pub field_name: String,
    pub current: f64,
    pub min: f64,
    pub max: f64,
    pub average: f64,
    pub change_7d: Option<f64>,
    pub change_30d: Option<f64>,
    pub trend: Trend,
    pub data_points: usize,
}

fn numeric_value(value: &FieldValue) -> Option<f64> {
    match value {
        FieldValue::Number(n) if n.is_finite() => Some(*n),
        FieldValue::Number(_) => None,
        FieldValue::Text(s) => parse_localized_number(s),
    }
}

/// Statistics for one field as of today (local time)
pub fn compute_field_statistics(entries: &[Entry], field: &Field) -> Option<FieldStatistics> {
    compute_field_statistics_at(entries, field, utils::today())
}

/// Statistics for every field that has data, as of today
pub fn compute_all_statistics(entries: &[Entry], fields: &[Field]) -> Vec<FieldStatistics> {
    compute_all_statistics_at(entries, fields, utils::today())
}

pub fn compute_all_statistics_at(entries: &[Entry], fields: &[Field], today: NaiveDate) -> Vec<FieldStatistics> {
    fields
        .iter()
        .filter_map(|field| compute_field_statistics_at(entries, field, today))
        .collect()
}

/// Statistics for one field evaluated on `today`.
///
/// The N-day change compares the most recent value against the most recent
/// value dated strictly before `today - N days`.
pub fn compute_field_statistics_at(entries: &[Entry], field: &Field, today: NaiveDate) -> Option<FieldStatistics> {
    let mut points: Vec<(&Entry, f64)> = entries
        .iter()
        .filter_map(|entry| {
            let value = entry.values.get(&field.id)?;
            numeric_value(value).map(|n| (entry, n))
        })
        .collect();

    if points.is_empty() {
        return None;
    }

    // newest first; same-day ties resolved by creation time then id
    points.sort_by(|(a, _), (b, _)| {
        b.date
            .cmp(&a.date)
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| b.id.cmp(&a.id))
    });

    let values: Vec<f64> = points.iter().map(|(_, v)| *v).collect();
    let current = values[0];
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let average = values.iter().sum::<f64>() / values.len() as f64;

    let change_since = |days: u64| -> Option<f64> {
        let cutoff = today.checked_sub_days(Days::new(days))?;
        points
            .iter()
            .find(|(entry, _)| entry.date < cutoff)
            .map(|(_, value)| current - value)
    };
    let change_7d = change_since(7);
    let change_30d = change_since(30);

    let trend = Trend::from_change(change_7d.or(change_30d).unwrap_or(0.0));

    Some(FieldStatistics {
        field_id: field.id.clone(),
        field_name: field.name.clone(),
        current,
        min,
        max,
        average,
        change_7d,
        change_30d,
        trend,
        data_points: values.len(),
    })
}

/// Relative change in percent; 0 when the old value is 0
pub fn percentage_change(old_value: f64, new_value: f64) -> f64 {
    if old_value == 0.0 {
        return 0.0;
    }
    (new_value - old_value) / old_value.abs() * 100.0
}

/// Entries dated strictly between `start` and `end`
pub fn entries_in_range(entries: &[Entry], start: NaiveDate, end: NaiveDate) -> Vec<&Entry> {
    entries
        .iter()
        .filter(|entry| entry.date > start && entry.date < end)
        .collect()
}

pub fn format_stat_value(value: Option<f64>, unit: &str, decimals: usize) -> String {
    match value {
        Some(v) => format!("{:.*} {}", decimals, v, unit),
        None => "-".to_string(),
    }
}

/// Like `format_stat_value`, with an explicit `+` on positive changes
pub fn format_change_value(change: Option<f64>, unit: &str, decimals: usize) -> String {
    match change {
        Some(c) => {
            let sign = if c > 0.0 { "+" } else { "" };
            format!("{}{:.*} {}", sign, decimals, c, unit)
        }
        None => "-".to_string(),
    }
}
