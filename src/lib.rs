//! # Service Balancer Library
//!
//! Selects, for each request, one destination from the pool registered under the
//! request's type, and tracks each destination's in-flight load against its
//! capacity threshold.
//!
//! ## Request Lifecycle
//!
//! 1. `LoadBalancerManager::select(strategy, &request)` resolves the request type to a
//!    service and lets the chosen strategy pick a destination
//! 2. `Destination::accept()` reserves capacity (or returns `false` when saturated)
//! 3. `Destination::complete()` releases it once the work is done
//!
//! Selection and admission are deliberately separate: a strategy never touches load.

/// Error types, configuration and request data
pub mod core;

/// Destinations, services, the service registry and the selection strategies
pub mod load_balancing;

/// Logging setup
pub mod observability;

pub use core::config::{BalancerConfig, DestinationConfig, ServiceConfig, DEFAULT_REQUEST_TYPE};
pub use core::error::{BalancerError, BalancerResult};
pub use core::types::Request;

pub use load_balancing::{
    Admission, BalancingStrategy, Destination, LoadBalancer, LoadBalancerManager,
    LoadBalancerStats, Service, ServiceRegistry, Strategy, StrategyKind,
};
