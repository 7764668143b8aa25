//! Input rules shared by all aggregates.

use crate::error::DomainError;

/// Stable business violation codes.
pub mod codes {
    pub const CODE_REQUIRED: &str = "CODE_REQUIRED";
    pub const CODE_TOO_LONG: &str = "CODE_TOO_LONG";
    pub const CODE_INVALID: &str = "CODE_INVALID";
    pub const NAME_REQUIRED: &str = "NAME_REQUIRED";
    pub const NAME_TOO_LONG: &str = "NAME_TOO_LONG";
    pub const NAME_UNCHANGED: &str = "NAME_UNCHANGED";
    pub const ALREADY_REGISTERED: &str = "ALREADY_REGISTERED";
    pub const ALREADY_DELETED: &str = "ALREADY_DELETED";
    pub const ENTITY_DELETED: &str = "ENTITY_DELETED";
    pub const NOT_REGISTERED: &str = "NOT_REGISTERED";
    pub const PARENT_DELETED: &str = "PARENT_DELETED";
    pub const ADDRESS_INCOMPLETE: &str = "ADDRESS_INCOMPLETE";
    pub const ADDRESS_UNCHANGED: &str = "ADDRESS_UNCHANGED";
    pub const FLOORS_OUT_OF_RANGE: &str = "FLOORS_OUT_OF_RANGE";
    pub const FLOORS_UNCHANGED: &str = "FLOORS_UNCHANGED";
    pub const AREA_INVALID: &str = "AREA_INVALID";
    pub const DETAILS_UNCHANGED: &str = "DETAILS_UNCHANGED";
}

/// Maximum length of an entity code.
pub const CODE_MAX_LEN: usize = 20;

/// Maximum length of an entity name.
pub const NAME_MAX_LEN: usize = 200;

/// Validates and normalizes an entity code (trimmed, upper case).
pub fn code(raw: &str) -> Result<String, DomainError> {
    let code = raw.trim();
    if code.is_empty() {
        return Err(DomainError::violation(
            codes::CODE_REQUIRED,
            "Code is required",
        ));
    }
    if code.chars().count() > CODE_MAX_LEN {
        return Err(DomainError::violation(
            codes::CODE_TOO_LONG,
            format!("Code must be at most {CODE_MAX_LEN} characters"),
        ));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(DomainError::violation(
            codes::CODE_INVALID,
            "Code may only contain letters, digits, '-' and '_'",
        ));
    }
    Ok(code.to_ascii_uppercase())
}

/// Validates and trims an entity name.
pub fn name(raw: &str) -> Result<String, DomainError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(DomainError::violation(
            codes::NAME_REQUIRED,
            "Name is required",
        ));
    }
    if name.chars().count() > NAME_MAX_LEN {
        return Err(DomainError::violation(
            codes::NAME_TOO_LONG,
            format!("Name must be at most {NAME_MAX_LEN} characters"),
        ));
    }
    Ok(name.to_string())
}

/// Trims a required free-text field, failing with `code` when it is blank.
pub fn required(field: &str, raw: &str, code: &'static str) -> Result<String, DomainError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(DomainError::violation(code, format!("{field} is required")));
    }
    Ok(value.to_string())
}
