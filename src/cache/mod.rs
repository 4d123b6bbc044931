//! Cache contract shared by the certificate authority and the passcode manager
//!
//! The contract mirrors a Redis-style key/value + set store: string values with
//! an optional TTL, atomic get-and-delete, and named sets with atomic add and
//! membership checks. Backends own their atomicity; callers never add a second
//! lock around cache calls.
//!
//! Backends report two failure kinds only. [`CacheError::Key`] means "no such
//! key" and each caller decides whether that is an error in its own domain;
//! [`CacheError::Internal`] means the backend could not be reached.

pub mod store;

pub use store::{spawn_cleanup_task, CacheStats, MemoryCache};

use std::time::Duration;

use hyper::StatusCode;

use crate::types::ErrorResponse;

/// Errors reported by a cache backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("Cache: Key not found ({0})")]
    Key(String),

    #[error("Cache: Internal connection error ({0})")]
    Internal(String),
}

impl ErrorResponse for CacheError {
    fn code(&self) -> &'static str {
        match self {
            Self::Key(_) => "K0001",
            Self::Internal(_) => "K0002",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Key(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Keyed string store with TTL and set operations.
///
/// All calls are blocking and are never retried by the callers in this crate.
pub trait Cache: Send + Sync {
    /// Read a value. Absent keys fail with [`CacheError::Key`].
    fn get(&self, key: &str) -> Result<String, CacheError>;

    /// Write a value. A zero `ttl` stores the value without expiry.
    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Atomically read and delete a value. Absent keys fail with [`CacheError::Key`].
    fn get_del(&self, key: &str) -> Result<String, CacheError>;

    /// Delete a value. Absent keys fail with [`CacheError::Key`].
    fn del(&self, key: &str) -> Result<(), CacheError>;

    /// Count how many of `keys` currently exist
    fn exists(&self, keys: &[&str]) -> Result<usize, CacheError>;

    /// Atomically add `member` to the set named `set`
    fn sadd(&self, set: &str, member: &str) -> Result<(), CacheError>;

    /// Check whether `member` belongs to the set named `set`
    fn sismember(&self, set: &str, member: &str) -> Result<bool, CacheError>;
}

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How often expired entries are purged by the cleanup task
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.cleanup_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_cache_error_codes() {
        assert_eq!(CacheError::Key("a".into()).code(), "K0001");
        assert_eq!(CacheError::Key("a".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            CacheError::Internal("down".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
