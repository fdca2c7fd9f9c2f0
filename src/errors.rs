//! Errors surfaced by the assistant.
//!
//! Sanitization, list parsing and diffing never fail, so they have no variant here.

use thiserror::Error;

/// Error returned by the public operations of [Assistant](crate::assistant::Assistant).
#[derive(Debug, Error)]
pub enum AssistError {
    /// The completion backend could not be reached or failed to produce a response.
    #[error("BackendUnavailable: {0}")]
    BackendUnavailable(String),

    /// The completion backend asked us to slow down. Callers may retry with their own policy.
    #[error("RateLimited: {message}")]
    RateLimited { message: String },

    /// The requested prompt does not exist, is disabled, or is missing required input.
    #[error("InvalidCatalogEntry: {0}")]
    InvalidCatalogEntry(String),

    /// No display metadata is known for a locale code. Never propagated out of localization.
    #[error("LocaleMetadataMissing: no language names for locale {0:?}")]
    LocaleMetadataMissing(String),

    /// The prompt catalog store failed while loading definitions.
    #[error("CatalogUnavailable: {0}")]
    CatalogUnavailable(#[source] anyhow::Error),
}

impl AssistError {
    /// Whether the failed call may succeed when retried later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AssistError::RateLimited { .. })
    }
}
