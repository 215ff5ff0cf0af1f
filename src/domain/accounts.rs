//! Validation rules for provisioned identities and group routing keys.

use slug::slugify;

use crate::domain::error::DomainError;

pub const MAX_USERNAME_LENGTH: usize = 150;

/// Usernames double as profile routing keys, so the accepted alphabet is
/// restricted to characters that need no URL escaping.
pub fn validate_username(candidate: &str) -> Result<String, DomainError> {
    let trimmed = candidate.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("username must not be empty"));
    }
    if trimmed.len() > MAX_USERNAME_LENGTH {
        return Err(DomainError::validation(format!(
            "username must be at most {MAX_USERNAME_LENGTH} characters"
        )));
    }
    if !trimmed
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-'))
    {
        return Err(DomainError::validation(
            "username may contain only letters, digits, `_`, `.` and `-`",
        ));
    }

    Ok(trimmed.to_string())
}

/// A supplied group slug must already be in canonical slug form; otherwise
/// the slug is derived from the title.
pub fn resolve_group_slug(title: &str, supplied: Option<&str>) -> Result<String, DomainError> {
    match supplied {
        Some(candidate) => {
            let trimmed = candidate.trim();
            if trimmed.is_empty() || slugify(trimmed) != trimmed {
                return Err(DomainError::validation(format!(
                    "`{trimmed}` is not a lowercase dash-separated slug"
                )));
            }
            Ok(trimmed.to_string())
        }
        None => {
            let derived = slugify(title);
            if derived.is_empty() {
                return Err(DomainError::validation(
                    "could not derive a slug from the title",
                ));
            }
            Ok(derived)
        }
    }
}
