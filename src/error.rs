//! Error types for the clinic portal.

use thiserror::Error;

/// Errors surfaced by the record store, the check-in wizard and the assistant.
///
/// Every variant carries a message that can be shown to the user as-is.
#[derive(Debug, Error)]
pub enum PortalError {
    #[error("an account with this email or card number is already registered")]
    DuplicateAccount,

    #[error("invalid credentials or account not found")]
    InvalidCredentials,

    #[error("the health assistant is unavailable: {reason}")]
    AssistantUnavailable { reason: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("cannot {action} while {state}")]
    InvalidTransition { state: String, action: &'static str },

    #[error("appointment {0} not found")]
    AppointmentNotFound(String),

    #[error("stored collection '{key}' is corrupt")]
    CorruptRecord {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PortalError {
    pub(crate) fn assistant(reason: impl Into<String>) -> Self {
        Self::AssistantUnavailable {
            reason: reason.into(),
        }
    }
}

impl From<validator::ValidationErrors> for PortalError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::InvalidInput(errors.to_string())
    }
}

impl From<reqwest::Error> for PortalError {
    fn from(err: reqwest::Error) -> Self {
        Self::assistant(err.to_string())
    }
}

pub type Result<T, E = PortalError> = std::result::Result<T, E>;
