//! Validation utilities.

use crate::FieldError;
use validator::ValidationErrors;

/// Flattens `validator` output into field errors.
#[must_use]
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| FieldError {
                field: (*field).to_string(),
                message: error
                    .message
                    .as_ref()
                    .map_or_else(|| error.code.to_string(), |m| m.to_string()),
                code: error.code.to_string(),
            })
        })
        .collect()
}

/// Common validation functions.
pub mod rules {
    use validator::ValidationError;

    /// Validates that a string is not blank (not empty after trimming).
    pub fn not_blank(value: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::new("not_blank"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Debug, Validate)]
    struct KeyRequest {
        #[validate(custom(function = "rules::not_blank"))]
        ticket: String,
        #[validate(custom(function = "rules::not_blank"))]
        plate: String,
    }

    #[test]
    fn test_not_blank() {
        assert!(rules::not_blank("PM451052").is_ok());
        assert!(rules::not_blank("").is_err());
        assert!(rules::not_blank("   ").is_err());
    }

    #[test]
    fn test_field_errors_lists_each_field() {
        let req = KeyRequest {
            ticket: " ".to_string(),
            plate: String::new(),
        };
        let mut fields: Vec<String> = field_errors(&req.validate().unwrap_err())
            .into_iter()
            .map(|e| {
                assert_eq!(e.code, "not_blank");
                e.field
            })
            .collect();
        fields.sort();
        assert_eq!(fields, vec!["plate", "ticket"]);
    }

    #[test]
    fn test_valid_request_passes() {
        let req = KeyRequest {
            ticket: "PM1".to_string(),
            plate: "AAA111".to_string(),
        };
        assert!(req.validate().is_ok());
    }
}
