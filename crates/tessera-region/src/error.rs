//! Error types for the region controller.

use crate::slice::SliceError;

/// The result type used throughout tessera-region.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by region controller operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request failed validation; nothing was mutated.
    #[error("bad request: {message}")]
    BadRequest {
        /// Description of the validation failure.
        message: String,
    },

    /// A hostname or slice the request refers to is unknown.
    #[error("not found: {message}")]
    NotFound {
        /// Description of what was not found.
        message: String,
    },

    /// The slice reported itself not-found-or-dead and has been purged.
    #[error("slice not found: {slice}")]
    SliceNotFound {
        /// Name of the purged slice.
        slice: String,
    },

    /// The slice failed for a reason other than being gone.
    #[error("slice {slice} failed: {source}")]
    Slice {
        /// Name of the failing slice.
        slice: String,
        /// The slice-level failure.
        #[source]
        source: SliceError,
    },

    /// A snapshot could not be encoded or decoded.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new bad request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Creates a new not found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if the caller supplied an invalid request.
    #[must_use]
    pub const fn is_bad_request(&self) -> bool {
        matches!(self, Self::BadRequest { .. })
    }

    /// Returns true if the request referred to something unknown, including a
    /// slice that was purged during the call.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::SliceNotFound { .. })
    }
}

impl From<tessera_core::Error> for Error {
    fn from(err: tessera_core::Error) -> Self {
        match err {
            tessera_core::Error::InvalidInput(message) => Self::BadRequest { message },
            tessera_core::Error::Serialization { message } => Self::Serialization { message },
            tessera_core::Error::Internal { message } => Self::Internal { message },
        }
    }
}

/// Label used for a slice that has not been allocated a name yet.
pub(crate) fn slice_label(name: Option<&str>) -> String {
    name.unwrap_or("<unallocated>").to_string()
}
