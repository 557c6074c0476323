//! App Store Connect error body classification
//!
//! Failed responses carry a JSON:API `errors` array. The codes in it decide
//! which [`StoreError`] the caller sees.

use serde::Deserialize;

use crate::error::StoreError;

/// Returned when the account holder must accept an updated agreement
pub const AGREEMENT_MISSING_CODE: &str = "FORBIDDEN.REQUIRED_AGREEMENTS_MISSING_OR_EXPIRED";

#[derive(Debug, Default, Deserialize)]
struct ErrorDocument {
    #[serde(default)]
    errors: Vec<ApiErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEntry {
    #[serde(default)]
    code: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

impl ApiErrorEntry {
    fn message(&self) -> String {
        match (&self.title, &self.detail) {
            (Some(title), Some(detail)) => format!("{}: {}", title, detail),
            (Some(text), None) | (None, Some(text)) => text.clone(),
            (None, None) => self.code.clone(),
        }
    }
}

/// Map a failed response to a [`StoreError`]
pub fn classify(status: u16, body: &str, retry_after: Option<u64>) -> StoreError {
    let document: ErrorDocument = serde_json::from_str(body).unwrap_or_default();
    let first_message = document
        .errors
        .first()
        .map(ApiErrorEntry::message)
        .unwrap_or_else(|| body.trim().to_string());

    if let Some(entry) = document.errors.iter().find(|e| e.code == AGREEMENT_MISSING_CODE) {
        return StoreError::AgreementMissing(entry.message());
    }

    let has_code = |prefix: &str| document.errors.iter().any(|e| e.code.starts_with(prefix));

    if status == 401 || has_code("NOT_AUTHORIZED") {
        return StoreError::Auth(first_message);
    }

    if status == 404 || has_code("NOT_FOUND") {
        return StoreError::NotFound(first_message);
    }

    if status == 429 {
        return StoreError::RateLimited { retry_after };
    }

    let is_duplicate = document.errors.iter().any(|e| e.code.contains("DUPLICATE"));
    if !is_duplicate && (status == 422 || has_code("ENTITY_ERROR.ATTRIBUTE.INVALID")) {
        return StoreError::Validation(first_message);
    }

    if status == 409 || has_code("STATE_ERROR") || is_duplicate {
        return StoreError::Conflict(first_message);
    }

    StoreError::RemoteApi {
        status,
        message: first_message,
    }
}
