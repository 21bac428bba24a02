//! Route handlers and the validation helpers they share.

pub mod adopters;
pub mod auth;
pub mod health;
pub mod root;
pub mod shelters;

use axum::{extract::rejection::JsonRejection, Json};
use regex::Regex;
use std::ops::RangeInclusive;
use uuid::Uuid;

use crate::error::{Error, Result};

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const ADULT_AGE: RangeInclusive<i32> = 18..=120;
pub const LATITUDE: RangeInclusive<f64> = -90.0..=90.0;
pub const LONGITUDE: RangeInclusive<f64> = -180.0..=180.0;

/// Lightweight email sanity check used before persisting data.
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

/// Path ids must be UUIDs.
///
/// # Errors
/// Returns [`Error::Validation`] otherwise.
pub fn parse_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).map_err(|_| Error::Validation(r#""id" must be a valid GUID"#.to_string()))
}

/// Unwrap a JSON body, turning extractor rejections into envelope errors.
///
/// Handlers take the body as `Result<Json<T>, JsonRejection>` so that
/// authorization runs before the body is looked at.
///
/// # Errors
/// Returns [`Error::Validation`] with the extractor's explanation.
pub fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| Error::Validation(rejection.body_text()))
}

fn invalid(message: String) -> Error {
    Error::Validation(message)
}

pub(crate) fn check_email(email: &str) -> Result<()> {
    if valid_email(email.trim()) {
        Ok(())
    } else {
        Err(invalid(r#""email" must be a valid email"#.to_string()))
    }
}

pub(crate) fn check_password(password: &str) -> Result<()> {
    if password.chars().count() >= MIN_PASSWORD_LENGTH {
        Ok(())
    } else {
        Err(invalid(format!(
            r#""password" length must be at least {MIN_PASSWORD_LENGTH} characters long"#
        )))
    }
}

pub(crate) fn check_not_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(invalid(format!(r#""{field}" is not allowed to be empty"#)))
    } else {
        Ok(())
    }
}

pub(crate) fn check_range<T>(field: &str, value: T, range: &RangeInclusive<T>) -> Result<()>
where
    T: PartialOrd + std::fmt::Display,
{
    if range.contains(&value) {
        Ok(())
    } else {
        Err(invalid(format!(
            r#""{field}" must be between {} and {}"#,
            range.start(),
            range.end()
        )))
    }
}

pub(crate) fn check_non_negative(field: &str, value: i32) -> Result<()> {
    if value < 0 {
        Err(invalid(format!(r#""{field}" must be greater than or equal to 0"#)))
    } else {
        Ok(())
    }
}

pub(crate) fn check_optional<T, F>(value: Option<&T>, check: F) -> Result<()>
where
    T: ?Sized,
    F: FnOnce(&T) -> Result<()>,
{
    value.map_or(Ok(()), check)
}

#[cfg(test)]
pub(crate) mod test_support;
