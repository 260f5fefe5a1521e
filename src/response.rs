//! The `{ data, error }` pair every emulated call resolves to.

use crate::error::{EmulatorError, Result};

/// Outcome of an emulated call.
///
/// The emulated client never throws and never rejects; callers branch on
/// `error`. Both fields may be set at once (e.g. `get_session` returns the
/// current session alongside a standing auth error).
///
/// # Example
///
/// ```
/// use data_client_emulator::Response;
///
/// let ok: Response<u32> = Response::ok(7);
/// assert_eq!(ok.data, Some(7));
/// assert!(ok.error.is_none());
/// assert_eq!(ok.into_result().ok(), Some(Some(7)));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Response<T> {
    /// Returned data. `None` on error or when nothing matched.
    pub data: Option<T>,
    /// Error, if the call failed.
    pub error: Option<EmulatorError>,
}

impl<T> Response<T> {
    /// A successful response carrying `data`.
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    /// A successful response with no data.
    pub fn empty() -> Self {
        Self {
            data: None,
            error: None,
        }
    }

    /// A failed response.
    pub fn err(error: EmulatorError) -> Self {
        Self {
            data: None,
            error: Some(error),
        }
    }

    /// Returns `true` if `error` is set.
    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }

    /// Convert into a [`Result`], discarding `data` when `error` is set.
    ///
    /// # Errors
    ///
    /// Returns the response's error if one is present.
    pub fn into_result(self) -> Result<Option<T>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.data),
        }
    }
}

impl<T> From<Result<T>> for Response<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::err(err),
        }
    }
}
