//! # Core Types
//!
//! The request data consumed by the load balancing strategies. Requests carry no
//! transport details; the balancer only needs a routing key and a request type.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A unit of work to be routed to a destination
///
/// Requests are immutable once built. The `id` doubles as the routing key for
/// hash-routed selection, and `request_type` picks the service whose destinations
/// are eligible. `parameters` is opaque metadata (resolution, format, priority, ...)
/// that strategies never inspect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    id: String,
    request_type: String,
    #[serde(default)]
    parameters: HashMap<String, String>,
}

impl Request {
    /// Create a request with no parameters
    pub fn new<I: Into<String>, T: Into<String>>(id: I, request_type: T) -> Self {
        Self {
            id: id.into(),
            request_type: request_type.into(),
            parameters: HashMap::new(),
        }
    }

    /// Attach one metadata entry, replacing any previous value for the key
    pub fn with_parameter<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Attach a whole metadata map
    pub fn with_parameters(mut self, parameters: HashMap<String, String>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn request_type(&self) -> &str {
        &self.request_type
    }

    pub fn parameters(&self) -> &HashMap<String, String> {
        &self.parameters
    }

    /// Look up a single metadata value
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }
}
