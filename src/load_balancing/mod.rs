pub mod balancer;
pub mod destination;
pub mod registry;
pub mod service;
pub mod strategies;

pub use balancer::{DestinationStats, LoadBalancer, LoadBalancerManager, LoadBalancerStats};
pub use destination::{Admission, Destination};
pub use registry::ServiceRegistry;
pub use service::Service;
pub use strategies::{
    fnv1a_64, BalancingStrategy, HashRouted, LeastLoaded, RoundRobin, Strategy, StrategyKind,
};
