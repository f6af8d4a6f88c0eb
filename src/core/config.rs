//! # Configuration Module
//!
//! Declarative setup of services and destinations, plus logging settings.
//!
//! ## Key Features
//! - YAML/JSON configuration parsing with serde
//! - Environment variable override support
//! - Validation with detailed error messages
//! - One call (`build_manager`) to turn a configuration into a ready balancer
//!
//! ## Example
//! ```yaml
//! default_strategy: least_loaded
//! logging:
//!   level: info
//!   format: text
//! services:
//!   - name: web
//!     request_types: [http]
//!     destinations:
//!       - address: 192.168.0.1
//!         capacity_threshold: 12
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::config_error;
use crate::core::error::{BalancerError, BalancerResult};
use crate::load_balancing::{Destination, LoadBalancerManager, Service, StrategyKind};
use crate::observability::config::LogConfig;

/// Request type wired to the example service when no configuration is given
pub const DEFAULT_REQUEST_TYPE: &str = "http";

/// Main balancer configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancerConfig {
    /// Strategy used by `LoadBalancerManager::select_default`
    #[serde(default)]
    pub default_strategy: StrategyKind,

    /// Services and their destinations
    pub services: Vec<ServiceConfig>,

    /// Logging settings
    #[serde(default)]
    pub logging: LogConfig,
}

/// One logical service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,

    /// Request types this service is registered for
    pub request_types: Vec<String>,

    #[serde(default)]
    pub destinations: Vec<DestinationConfig>,
}

/// One capacity-bounded destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationConfig {
    pub address: String,
    pub capacity_threshold: u32,
}

impl DestinationConfig {
    pub fn new<S: Into<String>>(address: S, capacity_threshold: u32) -> Self {
        Self {
            address: address.into(),
            capacity_threshold,
        }
    }
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            default_strategy: StrategyKind::RoundRobin,
            services: vec![ServiceConfig {
                name: "web".to_string(),
                request_types: vec![DEFAULT_REQUEST_TYPE.to_string()],
                destinations: vec![
                    DestinationConfig::new("192.168.0.1", 12),
                    DestinationConfig::new("192.168.0.2", 20),
                    DestinationConfig::new("192.168.0.3", 15),
                ],
            }],
            logging: LogConfig::default(),
        }
    }
}

impl BalancerConfig {
    /// Load configuration from a YAML file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> BalancerResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| BalancerError::config(format!("Failed to read config file: {}", e)))?;

        let config: BalancerConfig = serde_yaml::from_str(&content)?;
        config.finish()
    }

    /// Load configuration from JSON
    pub async fn load_from_json<P: AsRef<Path>>(path: P) -> BalancerResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| BalancerError::config(format!("Failed to read config file: {}", e)))?;

        let config: BalancerConfig = serde_json::from_str(&content)?;
        config.finish()
    }

    /// Load from a path, picking the parser by extension (`.json`, otherwise YAML)
    pub async fn load<P: AsRef<Path>>(path: P) -> BalancerResult<Self> {
        let is_json = path
            .as_ref()
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Self::load_from_json(path).await
        } else {
            Self::load_from_file(path).await
        }
    }

    fn finish(mut self) -> BalancerResult<Self> {
        self.apply_env_overrides()?;
        self.validate()?;
        Ok(self)
    }

    /// Apply environment variable overrides to configuration
    ///
    /// Recognized variables: `BALANCER_DEFAULT_STRATEGY`, `BALANCER_LOG_LEVEL`,
    /// `BALANCER_LOG_FORMAT`.
    pub fn apply_env_overrides(&mut self) -> BalancerResult<()> {
        use std::env;

        if let Ok(strategy) = env::var("BALANCER_DEFAULT_STRATEGY") {
            self.default_strategy = strategy.parse().map_err(|e| {
                BalancerError::config(format!("Invalid BALANCER_DEFAULT_STRATEGY: {}", e))
            })?;
        }

        if let Ok(level) = env::var("BALANCER_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(format) = env::var("BALANCER_LOG_FORMAT") {
            self.logging.format = format.parse()?;
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> BalancerResult<()> {
        if self.services.is_empty() {
            return Err(BalancerError::config("At least one service must be configured"));
        }

        let mut claimed: HashMap<&str, &str> = HashMap::new();

        for service in &self.services {
            if service.name.trim().is_empty() {
                return Err(BalancerError::config("Service name cannot be empty"));
            }

            if service.request_types.is_empty() {
                return Err(config_error!(
                    "Service '{}' must list at least one request type",
                    service.name
                ));
            }

            for request_type in &service.request_types {
                if request_type.trim().is_empty() {
                    return Err(config_error!(
                        "Service '{}' has an empty request type",
                        service.name
                    ));
                }
                if let Some(owner) = claimed.insert(request_type.as_str(), service.name.as_str()) {
                    return Err(config_error!(
                        "Request type '{}' is claimed by both '{}' and '{}'",
                        request_type,
                        owner,
                        service.name
                    ));
                }
            }

            let mut addresses = HashSet::new();
            for destination in &service.destinations {
                if destination.address.trim().is_empty() {
                    return Err(config_error!(
                        "Service '{}' has a destination with an empty address",
                        service.name
                    ));
                }
                if !addresses.insert(destination.address.as_str()) {
                    return Err(config_error!(
                        "Duplicate destination address '{}' in service '{}'",
                        destination.address,
                        service.name
                    ));
                }
            }
        }

        Ok(())
    }

    /// Build the configured services without registering them
    pub fn build_services(&self) -> Vec<(Arc<Service>, Vec<String>)> {
        self.services
            .iter()
            .map(|config| {
                let service = Service::with_destinations(
                    config.name.clone(),
                    config.destinations.iter().map(|destination| {
                        Destination::shared(destination.address.clone(), destination.capacity_threshold)
                    }),
                );
                (Arc::new(service), config.request_types.clone())
            })
            .collect()
    }

    /// Validate, then build a manager with every service registered
    pub fn build_manager(&self) -> BalancerResult<LoadBalancerManager> {
        self.validate()?;

        let manager = LoadBalancerManager::with_default_strategy(self.default_strategy);
        for (service, request_types) in self.build_services() {
            for request_type in &request_types {
                manager.register_service(request_type, Arc::clone(&service));
            }
            info!(
                service = %service.name(),
                destinations = service.len(),
                request_types = ?request_types,
                "Service configured"
            );
        }

        Ok(manager)
    }
}
