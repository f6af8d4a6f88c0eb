//! # Load Balancer Module
//!
//! Ties a `ServiceRegistry` to one selection strategy and records selection
//! statistics. Each strategy gets its own balancer and therefore its own registry;
//! `LoadBalancerManager` keeps one balancer per strategy and registers services on
//! all of them at once.
//!
//! ## Request Lifecycle
//!
//! Selection and admission are two separate steps:
//!
//! ```rust
//! use service_balancer::{Destination, LoadBalancerManager, Request, Service, StrategyKind};
//! use std::sync::Arc;
//!
//! let service = Arc::new(Service::with_destinations(
//!     "web",
//!     [Destination::shared("192.168.0.1", 12), Destination::shared("192.168.0.2", 20)],
//! ));
//! let manager = LoadBalancerManager::new();
//! manager.register_service("http", service);
//!
//! let request = Request::new("REQ1", "http");
//! let destination = manager.select(StrategyKind::LeastLoaded, &request).unwrap();
//! if destination.accept() {
//!     // ... serve the request ...
//!     destination.complete();
//! }
//! ```
//!
//! Selection never changes destination load; only `accept`/`complete` do.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use metrics::{counter, histogram};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use super::destination::Destination;
use super::registry::ServiceRegistry;
use super::service::Service;
use super::strategies::{BalancingStrategy, RoundRobin, Strategy, StrategyKind};
use crate::core::error::{BalancerError, BalancerResult};
use crate::core::types::Request;

/// Load balancer statistics for monitoring
#[derive(Debug, Clone, Serialize)]
pub struct LoadBalancerStats {
    pub algorithm: String,
    pub total_requests: u64,
    pub total_selections: u64,
    pub failed_selections: u64,
    pub destination_stats: BTreeMap<String, DestinationStats>,
}

/// Per-destination statistics
#[derive(Debug, Clone, Serialize)]
pub struct DestinationStats {
    pub selections: u64,
    pub current_load: u32,
    pub capacity_threshold: u32,
    pub last_selected: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct SelectionRecord {
    destination: Arc<Destination>,
    selections: u64,
    last_selected: Option<DateTime<Utc>>,
}

/// A service registry bound to a single selection strategy
#[derive(Debug)]
pub struct LoadBalancer {
    registry: ServiceRegistry,
    strategy: Strategy,
    records: DashMap<String, SelectionRecord>,
    total_requests: AtomicU64,
    failed_selections: AtomicU64,
}

impl LoadBalancer {
    /// Create a balancer for the given strategy with an empty registry
    pub fn new(kind: StrategyKind) -> Self {
        Self::with_strategy(Strategy::new(kind))
    }

    pub fn with_strategy(strategy: Strategy) -> Self {
        Self {
            registry: ServiceRegistry::new(),
            strategy,
            records: DashMap::new(),
            total_requests: AtomicU64::new(0),
            failed_selections: AtomicU64::new(0),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    pub fn algorithm_name(&self) -> &'static str {
        self.strategy.algorithm_name()
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Round-robin rotation control, for the round-robin balancer only
    pub fn round_robin(&self) -> Option<&RoundRobin> {
        self.strategy.as_round_robin()
    }

    /// Associate a request type with a service
    pub fn register_service<S: Into<String>>(&self, request_type: S, service: Arc<Service>) {
        self.registry.register_service(request_type, service);
    }

    /// Eligible destinations for a request
    pub fn resolve(&self, request: &Request) -> BalancerResult<Vec<Arc<Destination>>> {
        self.registry.resolve(request)
    }

    /// Pick a destination for the request
    ///
    /// Does not admit the request: the caller must `accept()` on the returned
    /// destination and `complete()` once done.
    pub fn select(&self, request: &Request) -> BalancerResult<Arc<Destination>> {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();

        let destinations = match self.registry.resolve(request) {
            Ok(destinations) => destinations,
            Err(err) => {
                self.record_failure(request, &err);
                return Err(err);
            }
        };

        let Some(selected) = self.strategy.select(request, &destinations) else {
            let service = self
                .registry
                .service(request.request_type())
                .map(|service| service.name().to_string())
                .unwrap_or_default();
            let err = BalancerError::no_destinations(service, request.request_type());
            self.record_failure(request, &err);
            return Err(err);
        };

        self.record_selection(&selected);

        let algorithm = self.algorithm_name();
        counter!("balancer_selections", "algorithm" => algorithm).increment(1);
        histogram!("balancer_selection_duration", "algorithm" => algorithm)
            .record(start.elapsed().as_secs_f64());

        debug!(
            request_id = %request.id(),
            request_type = %request.request_type(),
            destination = %selected.address(),
            current_load = selected.current_load(),
            algorithm = algorithm,
            "Selected destination"
        );

        Ok(selected)
    }

    fn record_selection(&self, destination: &Arc<Destination>) {
        let mut record = self
            .records
            .entry(destination.address().to_string())
            .or_insert_with(|| SelectionRecord {
                destination: Arc::clone(destination),
                selections: 0,
                last_selected: None,
            });
        record.destination = Arc::clone(destination);
        record.selections += 1;
        record.last_selected = Some(Utc::now());
    }

    fn record_failure(&self, request: &Request, err: &BalancerError) {
        self.failed_selections.fetch_add(1, Ordering::Relaxed);

        let algorithm = self.algorithm_name();
        counter!(
            "balancer_failed_selections",
            "algorithm" => algorithm,
            "reason" => err.error_type()
        )
        .increment(1);

        warn!(
            request_id = %request.id(),
            request_type = %request.request_type(),
            algorithm = algorithm,
            error = %err,
            "Destination selection failed"
        );
    }

    /// Current statistics for this balancer
    pub fn stats(&self) -> LoadBalancerStats {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let failed_selections = self.failed_selections.load(Ordering::Relaxed);

        let destination_stats = self
            .records
            .iter()
            .map(|entry| {
                let record = entry.value();
                let stats = DestinationStats {
                    selections: record.selections,
                    current_load: record.destination.current_load(),
                    capacity_threshold: record.destination.capacity_threshold(),
                    last_selected: record.last_selected,
                };
                (entry.key().clone(), stats)
            })
            .collect();

        LoadBalancerStats {
            algorithm: self.algorithm_name().to_string(),
            total_requests,
            total_selections: total_requests.saturating_sub(failed_selections),
            failed_selections,
            destination_stats,
        }
    }

    /// Clear statistics and any strategy state (round-robin rotations)
    pub fn reset(&self) {
        self.strategy.reset();
        self.records.clear();
        self.total_requests.store(0, Ordering::Relaxed);
        self.failed_selections.store(0, Ordering::Relaxed);
    }
}

/// One balancer per strategy, sharing the same service registrations
///
/// Services are registered on every balancer, so a request can be balanced with
/// any strategy. Round-robin rotations and statistics stay per balancer.
#[derive(Debug)]
pub struct LoadBalancerManager {
    least_loaded: LoadBalancer,
    hash_routed: LoadBalancer,
    round_robin: LoadBalancer,
    default_strategy: StrategyKind,
}

impl LoadBalancerManager {
    /// Create a manager whose default strategy is round robin
    pub fn new() -> Self {
        Self::with_default_strategy(StrategyKind::default())
    }

    pub fn with_default_strategy(default_strategy: StrategyKind) -> Self {
        Self {
            least_loaded: LoadBalancer::new(StrategyKind::LeastLoaded),
            hash_routed: LoadBalancer::new(StrategyKind::HashRouted),
            round_robin: LoadBalancer::new(StrategyKind::RoundRobin),
            default_strategy,
        }
    }

    pub fn default_strategy(&self) -> StrategyKind {
        self.default_strategy
    }

    /// The balancer running the given strategy
    pub fn balancer(&self, kind: StrategyKind) -> &LoadBalancer {
        match kind {
            StrategyKind::LeastLoaded => &self.least_loaded,
            StrategyKind::HashRouted => &self.hash_routed,
            StrategyKind::RoundRobin => &self.round_robin,
        }
    }

    /// Register a service for a request type on every strategy
    pub fn register_service(&self, request_type: &str, service: Arc<Service>) {
        for kind in StrategyKind::ALL {
            self.balancer(kind)
                .register_service(request_type, Arc::clone(&service));
        }
    }

    /// Pick a destination with the given strategy
    pub fn select(&self, kind: StrategyKind, request: &Request) -> BalancerResult<Arc<Destination>> {
        self.balancer(kind).select(request)
    }

    /// Pick a destination with the default strategy
    pub fn select_default(&self, request: &Request) -> BalancerResult<Arc<Destination>> {
        self.select(self.default_strategy, request)
    }

    pub fn available_algorithms(&self) -> Vec<&'static str> {
        StrategyKind::ALL
            .iter()
            .map(|kind| kind.algorithm_name())
            .collect()
    }

    /// Statistics for every balancer, keyed by algorithm name
    pub fn all_stats(&self) -> BTreeMap<String, LoadBalancerStats> {
        StrategyKind::ALL
            .iter()
            .map(|kind| (kind.algorithm_name().to_string(), self.balancer(*kind).stats()))
            .collect()
    }

    pub fn reset(&self) {
        for kind in StrategyKind::ALL {
            self.balancer(kind).reset();
        }
    }
}

impl Default for LoadBalancerManager {
    fn default() -> Self {
        Self::new()
    }
}
