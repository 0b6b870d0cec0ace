//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for cache operations.
///
/// Every variant is a precondition failure: it is returned before the
/// operation touches any state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// One or more requested keys are absent (only with `error_on_miss`)
    #[error("The following keys do not exist on the cache - {}", .0.join(","))]
    MissingKeys(Vec<String>),

    /// One or more keys passed to `set` already exist (only with `error_on_duplicate`)
    #[error("The following keys already exist in the cache - {}", .0.join(","))]
    DuplicateKeys(Vec<String>),

    /// Admitting the batch would exceed capacity (only with `error_on_full`)
    #[error("Could not add items as capacity would be exceeded. (capacity {capacity}, requested {requested})")]
    CapacityExceeded {
        /// Configured capacity
        capacity: usize,
        /// Number of live keys the batch would have produced
        requested: usize,
    },

    /// A sweep interval was configured but there is no Tokio runtime to drive it
    #[error("Expiry sweep requires a running Tokio runtime")]
    NoRuntime,
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
