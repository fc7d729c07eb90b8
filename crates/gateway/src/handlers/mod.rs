//! API handlers module

pub mod backend;
pub mod health;
pub mod notes;
pub mod papers;
pub mod query;
pub mod timeline;

use axum::extract::FromRequest;
use litdesk_common::errors::{AppError, Result};
use validator::Validate;

/// `Json` body extractor whose rejections use the API error envelope
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Run `validator` rules and map the first failure onto `AppError`
pub(crate) fn validate_request<T: Validate>(request: &T) -> Result<()> {
    request.validate().map_err(|errors| {
        let field_errors = errors.field_errors();
        let first = field_errors.iter().next();

        let field = first.map(|(field, _)| field.to_string());
        let message = first
            .and_then(|(_, errs)| errs.first())
            .and_then(|e| e.message.as_ref())
            .map(|m| m.to_string())
            .unwrap_or_else(|| errors.to_string());

        AppError::Validation { message, field }
    })
}

/// Rejects input that is empty once whitespace is trimmed
pub(crate) fn not_blank(value: &str) -> std::result::Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        return Err(validator::ValidationError::new("blank"));
    }
    Ok(())
}
