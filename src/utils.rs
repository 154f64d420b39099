use directories::{ProjectDirs, BaseDirs};
use std::path::PathBuf;

/// Profile mode for the application (dev or prod)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Dev,
    Prod,
}

impl Profile {
    fn app_name(&self) -> &'static str {
        match self {
            Profile::Dev => "traqit-dev",
            Profile::Prod => "traqit",
        }
    }
}

/// Get the configuration directory path for TraqIt
/// If profile is Dev, uses "traqit-dev" instead of "traqit"
pub fn get_config_dir(profile: Profile) -> Option<PathBuf> {
    ProjectDirs::from("com", "traqit", profile.app_name())
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the data directory path for TraqIt
/// If profile is Dev, uses "traqit-dev" instead of "traqit"
pub fn get_data_dir(profile: Profile) -> Option<PathBuf> {
    ProjectDirs::from("com", "traqit", profile.app_name())
        .map(|dirs| dirs.data_dir().to_path_buf())
}

/// Expand `~` in a path string to the user's home directory
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Parse a date string in ISO 8601 format (YYYY-MM-DD)
pub fn parse_date(date_str: &str) -> Result<chrono::NaiveDate, chrono::ParseError> {
    chrono::NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
}

/// Today's date in local time
pub fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}

/// Format a date for display and CSV output (dd.MM.yyyy)
pub fn format_date(date: chrono::NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

/// Parse a number that may use either `,` or `.` as decimal separator.
/// Returns None for empty input or anything that is not a finite number.
pub fn parse_localized_number(value: &str) -> Option<f64> {
    let normalized = value.trim().replace(',', ".");
    if normalized.is_empty() {
        return None;
    }
    normalized.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Make a string safe to use as a filename.
/// Anything outside ASCII alphanumerics, German umlauts/ß, `.`, `_` and `-`
/// becomes `_`; runs of `_` collapse and are trimmed from both ends.
pub fn sanitize_filename(filename: &str) -> String {
    let mut out = String::with_capacity(filename.len());
    for c in filename.chars() {
        let keep = c.is_ascii_alphanumeric()
            || matches!(c, 'ä' | 'ö' | 'ü' | 'ß' | 'Ä' | 'Ö' | 'Ü' | '.' | '_' | '-');
        let c = if keep { c } else { '_' };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches('_').to_string()
}

/// Human readable byte size (B, KB, MB, GB)
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    let rounded = (size * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_localized_number() {
        assert_eq!(parse_localized_number("74,5"), Some(74.5));
        assert_eq!(parse_localized_number("74.5"), Some(74.5));
        assert_eq!(parse_localized_number(" 80 "), Some(80.0));
        assert_eq!(parse_localized_number(""), None);
        assert_eq!(parse_localized_number("abc"), None);
        assert_eq!(parse_localized_number("NaN"), None);
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("TraqIt_Backup_16.10.2025.zip"), "TraqIt_Backup_16.10.2025.zip");
        assert_eq!(sanitize_filename("Mein Körper / Backup?.zip"), "Mein_Körper_Backup_.zip");
        assert_eq!(sanitize_filename("  leading"), "leading");
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(10 * 1024 * 1024), "10 MB");
    }
}
