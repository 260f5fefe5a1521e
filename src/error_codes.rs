//! Machine-readable error codes carried by [`EmulatorError`](crate::EmulatorError).
//!
//! The codes mirror the strings the emulated backend puts in its `code`
//! field, so test setup code can inject realistic failures
//! (e.g. a unique-constraint violation on insert) and consumers can branch on
//! them exactly as they would against the hosted service.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured error codes understood by the emulator.
///
/// Each variant serializes to the wire string of the emulated backend
/// (e.g. `"23505"` or `"PGRST116"`). Use [`as_str()`](ErrorCode::as_str) for
/// that string and [`description()`](ErrorCode::description) for a
/// human-readable explanation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    // Table errors
    #[serde(rename = "PGRST116")]
    NoRows,
    #[serde(rename = "23505")]
    UniqueViolation,
    #[serde(rename = "23503")]
    ForeignKeyViolation,
    #[serde(rename = "23502")]
    NotNullViolation,
    #[serde(rename = "42501")]
    PermissionDenied,
    #[serde(rename = "42P01")]
    UndefinedTable,

    // Remote procedure errors
    #[serde(rename = "PGRST202")]
    FunctionNotFound,

    // Auth errors
    #[serde(rename = "invalid_credentials")]
    InvalidCredentials,
    #[serde(rename = "session_not_found")]
    SessionNotFound,
    #[serde(rename = "user_not_found")]
    UserNotFound,

    // Emulator errors
    #[serde(rename = "not_configured")]
    NotConfigured,
}

impl ErrorCode {
    /// Returns the wire string of this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoRows => "PGRST116",
            Self::UniqueViolation => "23505",
            Self::ForeignKeyViolation => "23503",
            Self::NotNullViolation => "23502",
            Self::PermissionDenied => "42501",
            Self::UndefinedTable => "42P01",
            Self::FunctionNotFound => "PGRST202",
            Self::InvalidCredentials => "invalid_credentials",
            Self::SessionNotFound => "session_not_found",
            Self::UserNotFound => "user_not_found",
            Self::NotConfigured => "not_configured",
        }
    }

    /// Returns a human-readable description of this error code.
    pub fn description(&self) -> &'static str {
        match self {
            // Table errors
            Self::NoRows => "The result contains no rows where exactly one was expected.",
            Self::UniqueViolation => {
                "The row violates a unique constraint. A row with the same key already exists."
            }
            Self::ForeignKeyViolation => {
                "The row references a row in another table that does not exist."
            }
            Self::NotNullViolation => "A required column was missing or null.",
            Self::PermissionDenied => {
                "The current principal is not allowed to perform this operation on the table."
            }
            Self::UndefinedTable => "The requested table does not exist.",

            // Remote procedure errors
            Self::FunctionNotFound => {
                "The requested remote procedure could not be found. Check the function name."
            }

            // Auth errors
            Self::InvalidCredentials => "The supplied login credentials are invalid.",
            Self::SessionNotFound => "No active session exists for this request.",
            Self::UserNotFound => "The requested user could not be found.",

            // Emulator errors
            Self::NotConfigured => {
                "The emulator has no configuration for this call. Set it up in the test first."
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}
