// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for cache operations.

use std::borrow::Cow;

/// A specialized [`Result`] type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// An error from a cache operation.
///
/// Every operation submitted to a cache resolves to either a value or one of
/// these errors; nothing crosses lane boundaries in any other way. Use
/// [`Error::kind`] to react to a specific condition.
///
/// # Examples
///
/// ```
/// use lanecache_tier::{Error, ErrorKind};
///
/// let error = Error::not_found();
/// assert!(error.is_not_found());
/// assert!(matches!(error.kind(), ErrorKind::NotFound));
/// ```
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct Error(#[from] ErrorKind);

/// The specific condition behind an [`Error`].
///
/// Future versions may add variants.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The key is absent from both the cache and the backing store.
    ///
    /// This is a normal negative result rather than a system fault.
    #[error("key not found")]
    NotFound,

    /// The cache storage or the backing store failed unexpectedly.
    #[error("storage fault")]
    StorageFault(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    /// A component was constructed with an invalid configuration.
    #[error("invalid configuration: {0}")]
    CapacityInvariant(Cow<'static, str>),

    /// The cache storage is full and refused to admit a new key.
    #[error("cache storage is full ({capacity} entries)")]
    CapacityExceeded {
        /// The fixed capacity of the storage.
        capacity: usize,
    },

    /// A bounded lane queue had no room for another operation.
    #[error("lane {lane} queue is full")]
    QueueOverflow {
        /// Index of the saturated lane.
        lane: usize,
    },

    /// The executor has been shut down and no longer accepts work.
    #[error("executor is shut down")]
    Shutdown,

    /// The operation panicked while running on its lane.
    ///
    /// The lane itself keeps serving subsequent operations.
    #[error("operation panicked on lane {lane}")]
    LanePanicked {
        /// Index of the lane the operation ran on.
        lane: usize,
    },

    /// A distributed cache has no member nodes to route to.
    #[error("no cache nodes available")]
    NoNodes,
}

impl Error {
    /// Returns the specific condition behind this error.
    #[must_use]
    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }

    /// Consumes the error and returns its kind.
    #[must_use]
    pub fn into_kind(self) -> ErrorKind {
        self.0
    }

    /// Returns `true` if this is the normal "absent everywhere" result.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self.0, ErrorKind::NotFound)
    }

    /// Creates a [`ErrorKind::NotFound`] error.
    #[must_use]
    pub fn not_found() -> Self {
        Self(ErrorKind::NotFound)
    }

    /// Wraps an unexpected storage or backing-store failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use lanecache_tier::Error;
    ///
    /// let error = Error::storage_fault("disk unavailable");
    /// assert!(std::error::Error::source(&error).is_some());
    /// ```
    pub fn storage_fault(cause: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        Self(ErrorKind::StorageFault(cause.into()))
    }

    /// Creates an error describing an invalid construction-time configuration.
    pub fn invalid_config(message: impl Into<Cow<'static, str>>) -> Self {
        Self(ErrorKind::CapacityInvariant(message.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_recognized() {
        let error = Error::not_found();
        assert!(error.is_not_found());
        assert_eq!(error.to_string(), "key not found");
    }

    #[test]
    fn storage_fault_exposes_cause_as_source() {
        let error = Error::storage_fault("simulated io failure");
        assert!(!error.is_not_found());

        let source = std::error::Error::source(&error).expect("fault should carry its cause");
        assert_eq!(source.to_string(), "simulated io failure");
    }

    #[test]
    fn invalid_config_display_contains_message() {
        let error = Error::invalid_config("capacity must be greater than zero");
        let display = error.to_string();
        assert!(
            display.contains("capacity must be greater than zero"),
            "display output should contain the message, got: {display}"
        );
    }

    #[test]
    fn into_kind_returns_variant() {
        let error = Error::from(ErrorKind::QueueOverflow { lane: 3 });
        assert!(matches!(error.into_kind(), ErrorKind::QueueOverflow { lane: 3 }));
    }

    #[test]
    fn result_type_alias_propagates_errors() {
        fn returns_err() -> Result<i32> {
            Err(ErrorKind::Shutdown.into())
        }

        let err = returns_err().expect_err("should return an error");
        assert!(matches!(err.kind(), ErrorKind::Shutdown));
    }
}
