use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

use crate::config::models::ServiceConfig;

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid listen address '{address}': {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Service configuration validator
pub struct ServiceConfigValidator;

impl ServiceConfigValidator {
    /// Validate the entire service configuration, reporting every problem at once
    pub fn validate(config: &ServiceConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if config.name.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "name".to_string(),
            });
        }

        if let Err(e) = Self::validate_listen_address(&config.listen_addr()) {
            errors.push(e);
        }

        if let Err(e) = Self::validate_log_level(&config.log.level) {
            errors.push(e);
        }

        if config.body_buffer_limit == 0 {
            errors.push(ValidationError::InvalidField {
                field: "body_buffer_limit".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            }),
        }
    }

    /// Validate listen address format
    fn validate_listen_address(address: &str) -> ValidationResult<()> {
        if address.parse::<SocketAddr>().is_err() {
            return Err(ValidationError::InvalidListenAddress {
                address: address.to_string(),
                reason: "host must be an IP address (e.g., '127.0.0.1' or '0.0.0.0')".to_string(),
            });
        }
        Ok(())
    }

    fn validate_log_level(level: &str) -> ValidationResult<()> {
        EnvFilter::try_new(level)
            .map(|_| ())
            .map_err(|e| ValidationError::InvalidField {
                field: "log.level".to_string(),
                message: e.to_string(),
            })
    }

    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        let mut message = format!("{} configuration errors found:\n", errors.len());
        for (i, error) in errors.iter().enumerate() {
            message.push_str(&format!("  {}. {}\n", i + 1, error));
        }
        message
    }
}
