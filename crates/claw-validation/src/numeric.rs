//! Numeric validation functions.

use crate::error::ValidationError;
use crate::sanitized::ValidatedValue;
use crate::{MAX_MEMORY_LIMIT, MAX_TIMEOUT_SECONDS, MIN_MEMORY_LIMIT};

/// Type alias for validated port numbers.
pub type ValidatedPort = ValidatedValue<u16>;

/// Type alias for validated memory limits.
pub type ValidatedMemoryLimit = ValidatedValue<u64>;

/// Type alias for validated timeouts.
pub type ValidatedTimeout = ValidatedValue<u64>;

/// Validate a port number.
///
/// Ports must be in the range 1-65535.
///
/// # Errors
///
/// Returns `ValidationError` if the port is out of range.
pub fn validate_port(port: u16) -> Result<ValidatedPort, ValidationError> {
    if port == 0 {
        return Err(ValidationError::out_of_range("port", 1, 65535, 0));
    }
    Ok(ValidatedValue::new(port))
}

/// Validate a memory limit in bytes.
///
/// Memory limits must be between 1 MiB and 1 TiB.
///
/// # Errors
///
/// Returns `ValidationError` if the limit is out of range.
pub fn validate_memory_limit(bytes: u64) -> Result<ValidatedMemoryLimit, ValidationError> {
    if bytes < MIN_MEMORY_LIMIT {
        return Err(ValidationError::out_of_range(
            "memory_limit",
            MIN_MEMORY_LIMIT,
            MAX_MEMORY_LIMIT,
            bytes,
        ));
    }

    if bytes > MAX_MEMORY_LIMIT {
        return Err(ValidationError::out_of_range(
            "memory_limit",
            MIN_MEMORY_LIMIT,
            MAX_MEMORY_LIMIT,
            bytes,
        ));
    }

    Ok(ValidatedValue::new(bytes))
}

/// Validate a timeout in seconds.
///
/// Timeouts must be between 1 second and 7 days.
///
/// # Errors
///
/// Returns `ValidationError` if the timeout is out of range.
pub fn validate_timeout(seconds: u64) -> Result<ValidatedTimeout, ValidationError> {
    if seconds == 0 {
        return Err(ValidationError::out_of_range(
            "timeout",
            1,
            MAX_TIMEOUT_SECONDS,
            0,
        ));
    }

    if seconds > MAX_TIMEOUT_SECONDS {
        return Err(ValidationError::out_of_range(
            "timeout",
            1,
            MAX_TIMEOUT_SECONDS,
            seconds,
        ));
    }

    Ok(ValidatedValue::new(seconds))
}
