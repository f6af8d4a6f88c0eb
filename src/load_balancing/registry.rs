//! # Service Registry
//!
//! Maps a request type to the service whose destinations may serve it. The registry
//! shares services rather than owning them: the same `Arc<Service>` can be
//! registered with several balancers, and membership changes made through any
//! handle are visible to all of them.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::destination::Destination;
use super::service::Service;
use crate::core::error::{BalancerError, BalancerResult};
use crate::core::types::Request;

/// Request type → service lookup table
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: DashMap<String, Arc<Service>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate a request type with a service, replacing any previous association
    pub fn register_service<S: Into<String>>(&self, request_type: S, service: Arc<Service>) {
        let request_type = request_type.into();
        let service_name = service.name().to_string();

        match self.services.insert(request_type.clone(), service) {
            Some(previous) => warn!(
                request_type = %request_type,
                previous = %previous.name(),
                service = %service_name,
                "Replaced existing service registration"
            ),
            None => debug!(
                request_type = %request_type,
                service = %service_name,
                "Registered service"
            ),
        }
    }

    /// Drop the association for a request type
    pub fn unregister_service(&self, request_type: &str) -> Option<Arc<Service>> {
        self.services.remove(request_type).map(|(_, service)| service)
    }

    /// The service currently registered for a request type
    pub fn service(&self, request_type: &str) -> Option<Arc<Service>> {
        self.services
            .get(request_type)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// All registered request types, sorted
    pub fn request_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .services
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        types.sort();
        types
    }

    /// Eligible destinations for a request, in address order
    ///
    /// # Errors
    /// * `ServiceNotFound` - the request type has no registered service
    /// * `NoDestinationsAvailable` - the service is currently empty
    pub fn resolve(&self, request: &Request) -> BalancerResult<Vec<Arc<Destination>>> {
        let service = self
            .service(request.request_type())
            .ok_or_else(|| BalancerError::service_not_found(request.request_type()))?;

        let destinations = service.list();
        if destinations.is_empty() {
            return Err(BalancerError::no_destinations(
                service.name(),
                request.request_type(),
            ));
        }

        Ok(destinations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_unknown_type() {
        let registry = ServiceRegistry::new();
        let err = registry.resolve(&Request::new("REQ1", "ftp")).unwrap_err();
        assert_eq!(err, BalancerError::service_not_found("ftp"));
    }

    #[test]
    fn test_resolve_empty_service() {
        let registry = ServiceRegistry::new();
        registry.register_service("http", Arc::new(Service::new("web")));

        let err = registry.resolve(&Request::new("REQ1", "http")).unwrap_err();
        assert_eq!(err, BalancerError::no_destinations("web", "http"));
    }

    #[test]
    fn test_resolve_returns_ordered_destinations() {
        let registry = ServiceRegistry::new();
        let service = Arc::new(Service::with_destinations(
            "web",
            [Destination::shared("b", 1), Destination::shared("a", 1)],
        ));
        registry.register_service("http", service);

        let destinations = registry.resolve(&Request::new("REQ1", "http")).unwrap();
        let addresses: Vec<_> = destinations.iter().map(|d| d.address()).collect();
        assert_eq!(addresses, vec!["a", "b"]);
    }

    #[test]
    fn test_reregistration_overwrites() {
        let registry = ServiceRegistry::new();
        let old = Arc::new(Service::with_destinations("old", [Destination::shared("a", 1)]));
        let new = Arc::new(Service::with_destinations("new", [Destination::shared("z", 1)]));

        registry.register_service("http", old);
        registry.register_service("http", new);

        assert_eq!(registry.service("http").unwrap().name(), "new");
        let destinations = registry.resolve(&Request::new("REQ1", "http")).unwrap();
        assert_eq!(destinations[0].address(), "z");
    }

    #[test]
    fn test_shared_service_sees_membership_changes() {
        let registry = ServiceRegistry::new();
        let service = Arc::new(Service::new("web"));
        registry.register_service("http", Arc::clone(&service));

        service.add_destination(Destination::shared("a", 1));
        assert_eq!(registry.resolve(&Request::new("r", "http")).unwrap().len(), 1);

        service.remove_address("a");
        assert!(registry.resolve(&Request::new("r", "http")).is_err());
    }

    #[test]
    fn test_unregister_and_list_types() {
        let registry = ServiceRegistry::new();
        let service = Arc::new(Service::new("web"));
        registry.register_service("https", Arc::clone(&service));
        registry.register_service("http", service);

        assert_eq!(registry.request_types(), vec!["http", "https"]);
        assert!(registry.unregister_service("http").is_some());
        assert!(registry.unregister_service("http").is_none());
        assert_eq!(registry.request_types(), vec!["https"]);
    }
}
