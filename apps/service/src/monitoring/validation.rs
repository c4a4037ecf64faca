//! Validation of endpoint definitions and monitoring settings.
//!
//! Endpoint names become file names in the storage directory, so they are
//! restricted to a conservative character set.

use anyhow::{Result, anyhow};

const MAX_NAME_LEN: usize = 64;

/// Validate an endpoint name
pub fn validate_endpoint_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(anyhow!("Endpoint name must not be empty"));
    }

    if name.len() > MAX_NAME_LEN {
        return Err(anyhow!(
            "Endpoint name too long: {} characters (maximum: {})",
            name.len(),
            MAX_NAME_LEN
        ));
    }

    if name.starts_with('.') {
        return Err(anyhow!("Endpoint name must not start with '.'"));
    }

    if let Some(bad) =
        name.chars().find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(anyhow!("Endpoint name contains invalid character {:?}", bad));
    }

    Ok(())
}

/// Validate an endpoint address (host name, IP, or host:port)
pub fn validate_address(address: &str) -> Result<()> {
    if address.trim().is_empty() {
        return Err(anyhow!("Address must not be empty"));
    }

    if address.chars().any(char::is_whitespace) {
        return Err(anyhow!("Address must not contain whitespace"));
    }

    Ok(())
}

/// Validate the scheduler period
pub fn validate_update_interval(interval_seconds: f64) -> Result<()> {
    const MAX_INTERVAL: f64 = 86400.0; // 24 hours

    if !interval_seconds.is_finite() || interval_seconds <= 0.0 {
        return Err(anyhow!(
            "Update interval must be a positive number of seconds, got {}",
            interval_seconds
        ));
    }

    if interval_seconds > MAX_INTERVAL {
        return Err(anyhow!(
            "Update interval too long: {} seconds (maximum: {})",
            interval_seconds,
            MAX_INTERVAL
        ));
    }

    Ok(())
}

/// Validate timeout is reasonable
pub fn validate_timeout(timeout_seconds: u64) -> Result<()> {
    const MIN_TIMEOUT: u64 = 1;
    const MAX_TIMEOUT: u64 = 300; // 5 minutes

    if timeout_seconds < MIN_TIMEOUT {
        return Err(anyhow!(
            "Timeout too short: {} seconds (minimum: {})",
            timeout_seconds,
            MIN_TIMEOUT
        ));
    }

    if timeout_seconds > MAX_TIMEOUT {
        return Err(anyhow!(
            "Timeout too long: {} seconds (maximum: {})",
            timeout_seconds,
            MAX_TIMEOUT
        ));
    }

    Ok(())
}
