//! Standardized error handling patterns for registry responses and inputs

use crate::error::{Result, SyncError};
use reqwest::StatusCode;

/// Standard error handler for HTTP responses
pub struct HttpErrorHandler;

impl HttpErrorHandler {
    /// Handle registry-related HTTP errors for read operations
    pub fn handle_registry_error(status: StatusCode, error_text: &str, operation: &str) -> SyncError {
        let error_msg = match status.as_u16() {
            401 | 403 => return Self::handle_auth_error(status, error_text),
            404 => format!("Resource not found for {}: {}", operation, error_text),
            429 => format!("Rate limited during {}: {}", operation, error_text),
            500 => format!("Registry server error during {}: {}", operation, error_text),
            502 | 503 => format!("Registry unavailable for {}: {}", operation, error_text),
            _ => format!("{} failed (status {}): {}", operation, status, error_text),
        };

        SyncError::Registry(error_msg)
    }

    /// Handle component upload errors
    pub fn handle_upload_error(status: StatusCode, error_text: &str, context: &str) -> SyncError {
        let error_msg = match status.as_u16() {
            400 => format!("Bad request during {}: {}", context, error_text),
            401 => format!("Authentication failed during {}: {}", context, error_text),
            403 => format!("Permission denied for {}: {}", context, error_text),
            404 => format!("Repository not found for {}: {}", context, error_text),
            413 => format!("File too large for {}: {}", context, error_text),
            422 => format!("Invalid component data for {}: {}", context, error_text),
            500 => format!("Registry server error during {}: {}", context, error_text),
            502 | 503 => format!("Registry unavailable during {}: {}", context, error_text),
            507 => format!("Registry out of storage during {}: {}", context, error_text),
            _ => format!("{} failed (status {}): {}", context, status, error_text),
        };

        SyncError::Transfer(error_msg)
    }

    /// Handle authentication-related HTTP errors
    pub fn handle_auth_error(status: StatusCode, error_text: &str) -> SyncError {
        let error_msg = match status.as_u16() {
            401 => "Invalid credentials provided".to_string(),
            403 => "Access denied - insufficient permissions".to_string(),
            _ => format!("Authentication failed (status {}): {}", status, error_text),
        };

        SyncError::Authentication(error_msg)
    }
}

/// Input validation utilities
pub struct ValidationErrorHandler;

impl ValidationErrorHandler {
    /// Registry base URLs must carry an explicit http(s) scheme
    pub fn validate_registry_url(url: &str) -> Result<()> {
        if url.is_empty() {
            return Err(SyncError::Validation(
                "Registry URL cannot be empty".to_string(),
            ));
        }

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(SyncError::Validation(format!(
                "Registry URL must include protocol (http:// or https://): {}",
                url
            )));
        }

        Ok(())
    }

    pub fn validate_credentials(
        username: &Option<String>,
        password: &Option<String>,
    ) -> Result<()> {
        match (username, password) {
            (Some(_), None) => Err(SyncError::Validation(
                "Password is required when username is provided".to_string(),
            )),
            (None, Some(_)) => Err(SyncError::Validation(
                "Username is required when password is provided".to_string(),
            )),
            _ => Ok(()),
        }
    }

    pub fn validate_timeout(timeout: u64) -> Result<()> {
        if timeout == 0 {
            return Err(SyncError::Validation(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        // 24 hours
        if timeout > 86400 {
            return Err(SyncError::Validation(
                "Timeout cannot exceed 24 hours (86400 seconds)".to_string(),
            ));
        }

        Ok(())
    }
}
