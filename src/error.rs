//! Error types for the client emulator.

use thiserror::Error;

use crate::error_codes::ErrorCode;

/// Errors the emulator resolves operations with.
///
/// These are never returned through a panic or a rejected future: every
/// public operation resolves to a [`Response`](crate::Response) whose
/// `error` field carries one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmulatorError {
    /// A standing error installed by test setup code (table operation, RPC
    /// or auth).
    #[error("{message}")]
    Injected {
        /// Human-readable error message.
        message: String,
        /// Structured error code, if the setup code supplied one.
        code: Option<ErrorCode>,
    },

    /// An RPC was invoked by a name that was never registered.
    #[error("RPC function {name} not mocked")]
    RpcNotMocked {
        /// Name of the remote procedure that was called.
        name: String,
    },

    /// An auth flow the emulator does not model was invoked.
    #[error("{action} is not configured in the emulator")]
    NotConfigured {
        /// Name of the unsupported action (e.g. `"sign_in_with_password"`).
        action: String,
    },
}

impl EmulatorError {
    /// Create an injected error with just a message.
    pub fn injected(message: impl Into<String>) -> Self {
        Self::Injected {
            message: message.into(),
            code: None,
        }
    }

    /// Create an injected error carrying a structured code.
    pub fn with_code(message: impl Into<String>, code: ErrorCode) -> Self {
        Self::Injected {
            message: message.into(),
            code: Some(code),
        }
    }

    /// Returns the structured code for this error, if any.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Injected { code, .. } => *code,
            Self::RpcNotMocked { .. } => Some(ErrorCode::FunctionNotFound),
            Self::NotConfigured { .. } => Some(ErrorCode::NotConfigured),
        }
    }
}

/// A specialized [`Result`] type for emulator operations.
pub type Result<T> = std::result::Result<T, EmulatorError>;
