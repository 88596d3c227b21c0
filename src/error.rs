//! Error types for the cache table
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Failure results surfaced by table lookups and deletions.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheError {
    /// The key is not stored in the table
    #[error("Key not found in cache")]
    KeyNotFound,

    /// The key is not stored and the data loader declined to produce it
    #[error("Key not found and could not be loaded into cache")]
    KeyNotFoundOrNotLoadable,
}

// == Result Type Alias ==
/// Convenience Result type for the cache table.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(CacheError::KeyNotFound.to_string(), "Key not found in cache");
        assert_eq!(
            CacheError::KeyNotFoundOrNotLoadable.to_string(),
            "Key not found and could not be loaded into cache"
        );
    }

    #[test]
    fn test_errors_are_comparable() {
        let result: Result<()> = Err(CacheError::KeyNotFound);
        assert_eq!(result, Err(CacheError::KeyNotFound));
        assert_ne!(CacheError::KeyNotFound, CacheError::KeyNotFoundOrNotLoadable);
    }
}
