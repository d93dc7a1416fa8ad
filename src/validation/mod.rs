use std::fmt;

pub const TITLE_MAX_LEN: usize = 255;
pub const NOTE_MAX_LEN: usize = 500;
pub const EMAIL_MAX_LEN: usize = 255;
pub const ALLOWED_TRANSACTION_KINDS: &[&str] = &["INCOME", "WITHDRAWAL"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_enum(field: &'static str, value: &str, allowed: &[&str]) -> ValidationResult {
    if allowed.iter().all(|candidate| value != *candidate) {
        return Err(ValidationError::new(
            field,
            format!("must be one of: {}", allowed.join(", ")),
        ));
    }

    Ok(())
}

pub fn validate_email(field: &'static str, email: &str) -> ValidationResult {
    let email = sanitize_string(email);
    validate_required(field, &email)?;
    validate_max_len(field, &email, EMAIL_MAX_LEN)?;

    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();

    if local.is_empty() || domain.is_empty() || !domain.contains('.') || email.contains(' ') {
        return Err(ValidationError::new(field, "must be a valid email address"));
    }

    Ok(())
}

/// Target amounts may be zero, which means the goal is uncapped.
pub fn validate_target_amount(amount: i64) -> ValidationResult {
    if amount < 0 {
        return Err(ValidationError::new(
            "targetAmount",
            "must be zero or greater",
        ));
    }

    Ok(())
}

pub fn validate_transaction_amount(amount: i64) -> ValidationResult {
    if amount <= 0 {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }

    Ok(())
}

pub fn validate_transaction_kind(kind: &str) -> ValidationResult {
    validate_enum("type", kind, ALLOWED_TRANSACTION_KINDS)
}
