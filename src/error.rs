//! Error handling for the membench library
//!
//! This module provides the error taxonomy used throughout the benchmark:
//! memory/allocation failures, platform capability failures, test execution
//! errors, and configuration errors. Allocation and configuration errors are
//! always raised synchronously, before any timed work begins.

use thiserror::Error;

/// Main error type for the membench library
#[derive(Error, Debug)]
pub enum BenchError {
    /// I/O related errors (config files, sysfs reads)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Memory allocation or alignment failures
    #[error("Memory error: {message}")]
    Memory {
        /// Error message describing the allocation problem
        message: String,
    },

    /// Allocation failed for a known request size
    #[error("Memory allocation failed: requested {size} bytes")]
    OutOfMemory {
        /// Number of bytes requested
        size: usize,
    },

    /// Platform capability unavailable or detection failed
    #[error("Platform error: {message}")]
    Platform {
        /// Error message describing the platform issue
        message: String,
    },

    /// Invalid test invocation (wrong state, missing buffers, bad pattern)
    #[error("Test error: {message}")]
    Test {
        /// Error message describing the test issue
        message: String,
    },

    /// Configuration or parameter validation errors
    #[error("Invalid configuration: {message}")]
    Configuration {
        /// Configuration error message
        message: String,
    },
}

impl BenchError {
    /// Create a memory error
    pub fn memory<S: Into<String>>(message: S) -> Self {
        Self::Memory { message: message.into() }
    }

    /// Create an out of memory error
    pub fn out_of_memory(size: usize) -> Self {
        Self::OutOfMemory { size }
    }

    /// Create a platform error
    pub fn platform<S: Into<String>>(message: S) -> Self {
        Self::Platform { message: message.into() }
    }

    /// Create a test error
    pub fn test<S: Into<String>>(message: S) -> Self {
        Self::Test { message: message.into() }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Check if this is a recoverable error
    ///
    /// Allocation failures are recoverable at a higher level (smaller working
    /// set, fewer buffers); configuration and test errors are deterministic
    /// for a given input and retrying would not help.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(_) => true,
            Self::Memory { .. } => true,
            Self::OutOfMemory { .. } => true,
            Self::Platform { .. } => false,
            Self::Test { .. } => false,
            Self::Configuration { .. } => false,
        }
    }

    /// Get the error category for logging/metrics
    pub fn category(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Memory { .. } => "memory",
            Self::OutOfMemory { .. } => "memory",
            Self::Platform { .. } => "platform",
            Self::Test { .. } => "test",
            Self::Configuration { .. } => "config",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, BenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = BenchError::memory("alignment must be a power of 2");
        assert_eq!(err.category(), "memory");
        assert!(err.is_recoverable());

        let err = BenchError::configuration("zero thread count");
        assert_eq!(err.category(), "config");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let err = BenchError::out_of_memory(4096);
        let display = format!("{}", err);
        assert!(display.contains("4096"));

        let err = BenchError::test("buffers not allocated");
        assert!(format!("{}", err).contains("Test error"));
    }

    #[test]
    fn test_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "no sysfs");
        let err: BenchError = io_error.into();
        assert_eq!(err.category(), "io");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_recoverability_split() {
        assert!(BenchError::memory("m").is_recoverable());
        assert!(BenchError::out_of_memory(1).is_recoverable());
        assert!(!BenchError::platform("p").is_recoverable());
        assert!(!BenchError::test("t").is_recoverable());
        assert!(!BenchError::configuration("c").is_recoverable());
    }
}
