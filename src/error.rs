//! Error types for the emkit library.
//!
//! ## Key Components
//!
//! - [`ConfigError`]: Returned when builder parameters are invalid
//!   (e.g. a zero worker count).
//! - [`BuildError`]: Returned by
//!   [`ParallelSorterBuilder::build`](crate::sort::ParallelSorterBuilder::build)
//!   when construction fails, either from bad configuration or from a worker
//!   thread that could not be spawned.
//!
//! Cache geometry mismatches (associativity larger than capacity, capacity
//! not a multiple of associativity) are *not* errors: the cache clamps the
//! numbers and emits a warning through the `log` facade.

use std::error::Error;
use std::fmt;
use std::io;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when configuration parameters are invalid.
///
/// Produced by fallible builder methods such as
/// [`ParallelSorterBuilder::build`](crate::sort::ParallelSorterBuilder::build).
/// Carries a human-readable description of which parameter failed validation.
///
/// # Example
///
/// ```
/// use emkit::sort::ParallelSorterBuilder;
///
/// let err = ParallelSorterBuilder::new().with_threads(0).build().err().unwrap();
/// assert!(err.to_string().contains("worker"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for ConfigError {}

// ---------------------------------------------------------------------------
// BuildError
// ---------------------------------------------------------------------------

/// Sorter construction error.
#[derive(Debug)]
pub enum BuildError {
    /// A builder parameter failed validation.
    Config(ConfigError),
    /// A worker thread could not be spawned.
    ThreadSpawn(io::Error),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Config(err) => write!(f, "invalid configuration: {}", err),
            BuildError::ThreadSpawn(err) => write!(f, "worker thread spawn failed: {}", err),
        }
    }
}

impl Error for BuildError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(match self {
            BuildError::Config(err) => err,
            BuildError::ThreadSpawn(err) => err,
        })
    }
}

impl From<ConfigError> for BuildError {
    fn from(err: ConfigError) -> Self {
        BuildError::Config(err)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
