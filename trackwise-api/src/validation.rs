//! Validation Rules
//!
//! Field-level checks shared by the request validators. Each check returns
//! the single `FieldError` it found, so the pipeline can run every rule and
//! report all failures together.

use chrono::Utc;
use trackwise_core::{EntityId, FieldError, Timestamp};

pub const PROJECT_NAME_MIN: usize = 3;
pub const PROJECT_NAME_MAX: usize = 120;
pub const PROJECT_DESCRIPTION_MAX: usize = 2000;
pub const TASK_TITLE_MIN: usize = 3;
pub const TASK_TITLE_MAX: usize = 160;
pub const TASK_DESCRIPTION_MAX: usize = 4000;
pub const TASK_TAGS_MAX: usize = 10;
pub const TASK_TAG_LENGTH_MAX: usize = 50;

pub type FieldResult = Result<(), FieldError>;

/// Checks on free-text fields. Lengths count characters of the trimmed value.
pub trait ValidateText {
    /// Present and not whitespace-only.
    fn validate_non_blank(&self, field: &str) -> FieldResult;

    /// Present, not blank, and between `min` and `max` characters.
    fn validate_length(&self, field: &str, min: usize, max: usize) -> FieldResult;

    /// At most `max` characters. Absent values pass.
    fn validate_max_length(&self, field: &str, max: usize) -> FieldResult;
}

impl ValidateText for str {
    fn validate_non_blank(&self, field: &str) -> FieldResult {
        if self.trim().is_empty() {
            return Err(FieldError::new(field, format!("{} is required", field)));
        }
        Ok(())
    }

    fn validate_length(&self, field: &str, min: usize, max: usize) -> FieldResult {
        self.validate_non_blank(field)?;
        let len = self.trim().chars().count();
        if len < min || len > max {
            return Err(FieldError::new(
                field,
                format!("{} must be between {} and {} characters", field, min, max),
            ));
        }
        Ok(())
    }

    fn validate_max_length(&self, field: &str, max: usize) -> FieldResult {
        if self.trim().chars().count() > max {
            return Err(FieldError::new(
                field,
                format!("{} must be at most {} characters", field, max),
            ));
        }
        Ok(())
    }
}

impl ValidateText for String {
    fn validate_non_blank(&self, field: &str) -> FieldResult {
        self.as_str().validate_non_blank(field)
    }

    fn validate_length(&self, field: &str, min: usize, max: usize) -> FieldResult {
        self.as_str().validate_length(field, min, max)
    }

    fn validate_max_length(&self, field: &str, max: usize) -> FieldResult {
        self.as_str().validate_max_length(field, max)
    }
}

impl<T: ValidateText> ValidateText for Option<T> {
    fn validate_non_blank(&self, field: &str) -> FieldResult {
        match self {
            Some(value) => value.validate_non_blank(field),
            None => Err(FieldError::new(field, format!("{} is required", field))),
        }
    }

    fn validate_length(&self, field: &str, min: usize, max: usize) -> FieldResult {
        match self {
            Some(value) => value.validate_length(field, min, max),
            None => Err(FieldError::new(field, format!("{} is required", field))),
        }
    }

    fn validate_max_length(&self, field: &str, max: usize) -> FieldResult {
        match self {
            Some(value) => value.validate_max_length(field, max),
            None => Ok(()),
        }
    }
}

/// Inclusive numeric bounds.
pub trait ValidateRange {
    fn validate_range(&self, field: &str, min: Self, max: Self) -> FieldResult
    where
        Self: Sized;
}

macro_rules! impl_validate_range {
    ($($t:ty),*) => {
        $(
            impl ValidateRange for $t {
                fn validate_range(&self, field: &str, min: Self, max: Self) -> FieldResult {
                    if *self < min || *self > max {
                        return Err(FieldError::new(
                            field,
                            format!("{} must be between {} and {}", field, min, max),
                        ));
                    }
                    Ok(())
                }
            }
        )*
    };
}

impl_validate_range!(u32, u64, usize);

pub fn validate_id(id: &EntityId, field: &str) -> FieldResult {
    if id.is_nil() {
        return Err(FieldError::new(field, format!("{} must not be empty", field)));
    }
    Ok(())
}

pub fn validate_tags(tags: &[String]) -> FieldResult {
    if tags.len() > TASK_TAGS_MAX {
        return Err(FieldError::new(
            "tags",
            format!("at most {} tags are allowed", TASK_TAGS_MAX),
        ));
    }
    for tag in tags {
        let len = tag.trim().chars().count();
        if len == 0 || len > TASK_TAG_LENGTH_MAX {
            return Err(FieldError::new(
                "tags",
                format!("each tag must be between 1 and {} characters", TASK_TAG_LENGTH_MAX),
            ));
        }
    }
    Ok(())
}

/// Due dates may be today but not earlier (UTC calendar days).
pub fn validate_due_date(due_date: Option<Timestamp>) -> FieldResult {
    match due_date {
        Some(due) if due.date_naive() < Utc::now().date_naive() => Err(FieldError::new(
            "due_date",
            "due_date must not be in the past",
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    #[test]
    fn test_length_counts_trimmed_characters() {
        assert!("  ab  ".validate_length("name", 3, 10).is_err());
        assert!("abc".validate_length("name", 3, 10).is_ok());
        assert!("ñññ".validate_length("name", 3, 3).is_ok());

        let err = "".validate_length("title", 3, 160).unwrap_err();
        assert_eq!(err.message, "title is required");
        let err = "AB".validate_length("title", 3, 160).unwrap_err();
        assert!(err.message.contains("between 3 and 160 characters"));
    }

    #[test]
    fn test_optional_text() {
        let absent: Option<String> = None;
        assert!(absent.validate_max_length("description", 5).is_ok());
        assert!(absent.validate_non_blank("owner_id").is_err());
        assert!(Some("toolong".to_string())
            .validate_max_length("description", 5)
            .is_err());
    }

    #[test]
    fn test_range() {
        assert!(0u32.validate_range("page_number", 1, u32::MAX).is_err());
        assert!(100u32.validate_range("page_size", 1, 100).is_ok());
        assert!(101u32.validate_range("page_size", 1, 100).is_err());
    }

    #[test]
    fn test_ids_and_tags() {
        assert!(validate_id(&Uuid::nil(), "project_id").is_err());
        assert!(validate_id(&Uuid::now_v7(), "project_id").is_ok());

        assert!(validate_tags(&["a".into(), "b".into()]).is_ok());
        assert!(validate_tags(&["".into()]).is_err());
        assert!(validate_tags(&["x".repeat(51)]).is_err());
        let many: Vec<String> = (0..11).map(|i| format!("t{}", i)).collect();
        assert!(validate_tags(&many).is_err());
    }

    #[test]
    fn test_due_date() {
        assert!(validate_due_date(None).is_ok());
        assert!(validate_due_date(Some(Utc::now())).is_ok());
        assert!(validate_due_date(Some(Utc::now() + Duration::days(7))).is_ok());
        assert!(validate_due_date(Some(Utc::now() - Duration::days(2))).is_err());
    }
}
