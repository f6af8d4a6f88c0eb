//! # Error Handling Module
//!
//! This module defines every error the balancer can surface, using the `thiserror` crate.
//! Errors are returned to the immediate caller; nothing in the crate retries internally.
//!
//! ## Error Kinds
//!
//! - `ServiceNotFound`: the request type has no registered service
//! - `NoDestinationsAvailable`: the resolved service currently has zero destinations
//! - `UnknownStrategy`: a strategy name or menu choice could not be parsed
//! - `Configuration`, `Io`, `Yaml`, `Json`: setup-time failures while loading configuration
//!
//! Admission rejection is intentionally absent. A destination at capacity answers
//! `accept() == false`, which is a normal outcome the caller decides how to handle
//! (try another destination, or push backpressure upstream).

use thiserror::Error;

/// Main result type used throughout the balancer
pub type BalancerResult<T> = Result<T, BalancerError>;

/// Error types for selection, configuration and setup
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BalancerError {
    /// The request type has no service associated with it
    #[error("No service found for request type: {request_type}")]
    ServiceNotFound { request_type: String },

    /// The service exists but has no destinations right now
    #[error("No destinations available in service '{service}' for request type: {request_type}")]
    NoDestinationsAvailable { service: String, request_type: String },

    /// Strategy name (or menu choice) that does not map to a known algorithm
    #[error("Unknown load balancing strategy: {name}")]
    UnknownStrategy { name: String },

    /// Invalid or inconsistent configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// I/O errors while reading configuration
    #[error("I/O error: {message}")]
    Io { message: String },

    /// YAML parsing errors for configuration files
    #[error("YAML error: {message}")]
    Yaml { message: String },

    /// JSON parsing errors for configuration files
    #[error("JSON error: {message}")]
    Json { message: String },
}

impl BalancerError {
    /// Create a service-not-found error for a request type
    pub fn service_not_found<S: Into<String>>(request_type: S) -> Self {
        Self::ServiceNotFound {
            request_type: request_type.into(),
        }
    }

    /// Create an empty-service error
    pub fn no_destinations<S: Into<String>, T: Into<String>>(service: S, request_type: T) -> Self {
        Self::NoDestinationsAvailable {
            service: service.into(),
            request_type: request_type.into(),
        }
    }

    /// Create an unknown-strategy error
    pub fn unknown_strategy<S: Into<String>>(name: S) -> Self {
        Self::UnknownStrategy { name: name.into() }
    }

    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Stable snake_case name of the error kind, used as a metrics label
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::ServiceNotFound { .. } => "service_not_found",
            Self::NoDestinationsAvailable { .. } => "no_destinations_available",
            Self::UnknownStrategy { .. } => "unknown_strategy",
            Self::Configuration { .. } => "configuration_error",
            Self::Io { .. } => "io_error",
            Self::Yaml { .. } => "yaml_error",
            Self::Json { .. } => "json_error",
        }
    }

    /// Check if retrying the same request later could succeed
    ///
    /// Only an empty service qualifies: its membership can change between calls.
    /// A missing registration or a bad configuration will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NoDestinationsAvailable { .. })
    }
}

impl From<std::io::Error> for BalancerError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for BalancerError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for BalancerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
        }
    }
}

/// Convenience macro for creating configuration errors
///
/// Usage: `config_error!("Duplicate address {} in service {}", address, name)`
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::core::error::BalancerError::config(format!($($arg)*))
    };
}
