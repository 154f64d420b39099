use thiserror::Error;

use crate::utils::parse_localized_number;

pub const MAX_FIELD_NAME_LEN: usize = 50;
pub const MAX_FIELD_UNIT_LEN: usize = 20;
pub const MAX_TEXT_VALUE_LEN: usize = 500;
pub const MAX_NOTES_LEN: usize = 1000;
pub const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;
pub const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/webp"];

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Field name must not be empty")]
    EmptyFieldName,
    #[error("Field name must be at most {max} characters", max = MAX_FIELD_NAME_LEN)]
    FieldNameTooLong,
    #[error("Unit must not be empty")]
    EmptyUnit,
    #[error("Unit must be at most {max} characters", max = MAX_FIELD_UNIT_LEN)]
    UnitTooLong,
    #[error("Value must not be empty")]
    EmptyValue,
    #[error("Invalid number: {0}")]
    InvalidNumber(String),
    #[error("Text must be at most {max} characters", max = MAX_TEXT_VALUE_LEN)]
    TextTooLong,
    #[error("Notes must be at most {max} characters", max = MAX_NOTES_LEN)]
    NotesTooLong,
    #[error("Invalid image type {0}; allowed: {allowed}", allowed = ALLOWED_IMAGE_TYPES.join(", "))]
    InvalidImageType(String),
    #[error("Image too large ({0} bytes); at most {max} MB allowed", max = MAX_IMAGE_SIZE / 1024 / 1024)]
    ImageTooLarge(usize),
}

pub fn validate_field_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyFieldName);
    }
    if name.chars().count() > MAX_FIELD_NAME_LEN {
        return Err(ValidationError::FieldNameTooLong);
    }
    Ok(())
}

pub fn validate_field_unit(unit: &str) -> Result<(), ValidationError> {
    if unit.trim().is_empty() {
        return Err(ValidationError::EmptyUnit);
    }
    if unit.chars().count() > MAX_FIELD_UNIT_LEN {
        return Err(ValidationError::UnitTooLong);
    }
    Ok(())
}

/// Validate and parse a numeric input, accepting `,` or `.` decimals
pub fn validate_numeric_value(value: &str) -> Result<f64, ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyValue);
    }
    parse_localized_number(value).ok_or_else(|| ValidationError::InvalidNumber(value.to_string()))
}

pub fn validate_text_value(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyValue);
    }
    if value.chars().count() > MAX_TEXT_VALUE_LEN {
        return Err(ValidationError::TextTooLong);
    }
    Ok(())
}

pub fn validate_notes(notes: &str) -> Result<(), ValidationError> {
    if notes.chars().count() > MAX_NOTES_LEN {
        return Err(ValidationError::NotesTooLong);
    }
    Ok(())
}

pub fn validate_image(mime_type: &str, size: usize) -> Result<(), ValidationError> {
    if !ALLOWED_IMAGE_TYPES.contains(&mime_type) {
        return Err(ValidationError::InvalidImageType(mime_type.to_string()));
    }
    if size > MAX_IMAGE_SIZE {
        return Err(ValidationError::ImageTooLarge(size));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_name_bounds() {
        assert_eq!(validate_field_name("  "), Err(ValidationError::EmptyFieldName));
        assert!(validate_field_name("Gewicht").is_ok());
        assert_eq!(validate_field_name(&"x".repeat(51)), Err(ValidationError::FieldNameTooLong));
        // umlauts count as one character each
        assert!(validate_field_name(&"ö".repeat(50)).is_ok());
    }

    #[test]
    fn test_unit_bounds() {
        assert_eq!(validate_field_unit(""), Err(ValidationError::EmptyUnit));
        assert!(validate_field_unit("kg").is_ok());
        assert_eq!(validate_field_unit(&"x".repeat(21)), Err(ValidationError::UnitTooLong));
    }

    #[test]
    fn test_numeric_value() {
        assert_eq!(validate_numeric_value("74,5"), Ok(74.5));
        assert_eq!(validate_numeric_value(""), Err(ValidationError::EmptyValue));
        assert_eq!(
            validate_numeric_value("viel"),
            Err(ValidationError::InvalidNumber("viel".to_string()))
        );
    }

    #[test]
    fn test_notes_and_text() {
        assert!(validate_notes(&"n".repeat(1000)).is_ok());
        assert_eq!(validate_notes(&"n".repeat(1001)), Err(ValidationError::NotesTooLong));
        assert_eq!(validate_text_value(&"t".repeat(501)), Err(ValidationError::TextTooLong));
    }

    #[test]
    fn test_image() {
        assert!(validate_image("image/png", 1024).is_ok());
        assert_eq!(
            validate_image("image/gif", 10),
            Err(ValidationError::InvalidImageType("image/gif".to_string()))
        );
        assert_eq!(
            validate_image("image/jpeg", MAX_IMAGE_SIZE + 1),
            Err(ValidationError::ImageTooLarge(MAX_IMAGE_SIZE + 1))
        );
    }
}
