//! # Selection Strategies
//!
//! Three interchangeable algorithms pick one destination out of the eligible list:
//!
//! 1. **Least Loaded**: fewest in-flight requests, ties going to the lowest address
//! 2. **Hash Routed**: FNV-1a hash of the request id, modulo the destination count
//! 3. **Round Robin**: a per-request-type rotation, built lazily on first use
//!
//! The set is closed. `Strategy` is an enum over the three, chosen at construction
//! time, and every variant implements the same `BalancingStrategy` interface.
//! No strategy touches destination load: admission is a separate step.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::destination::Destination;
use crate::core::error::BalancerError;
use crate::core::types::Request;

/// Interface shared by all selection algorithms
pub trait BalancingStrategy: Send + Sync {
    /// Pick one destination from a non-empty, address-ordered list
    ///
    /// Returns `None` only when `destinations` is empty.
    fn select(&self, request: &Request, destinations: &[Arc<Destination>])
        -> Option<Arc<Destination>>;

    /// Algorithm name for metrics and logging
    fn algorithm_name(&self) -> &'static str;

    /// Drop any internal selection state
    fn reset(&self) {}
}

/// Identifier for each strategy, as used in configuration and the driver menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[serde(alias = "least_connection")]
    LeastLoaded,
    #[serde(alias = "routed")]
    HashRouted,
    #[default]
    RoundRobin,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [
        StrategyKind::LeastLoaded,
        StrategyKind::HashRouted,
        StrategyKind::RoundRobin,
    ];

    pub fn algorithm_name(self) -> &'static str {
        match self {
            Self::LeastLoaded => "least_loaded",
            Self::HashRouted => "hash_routed",
            Self::RoundRobin => "round_robin",
        }
    }

    /// Map the interactive menu numbering (1, 2, 3) to a strategy
    pub fn from_menu_choice(choice: u32) -> Option<Self> {
        match choice {
            1 => Some(Self::LeastLoaded),
            2 => Some(Self::HashRouted),
            3 => Some(Self::RoundRobin),
            _ => None,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.algorithm_name())
    }
}

impl FromStr for StrategyKind {
    type Err = BalancerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "least_loaded" | "least_connection" | "least_connections" => {
                Ok(Self::LeastLoaded)
            }
            "2" | "hash_routed" | "routed" => Ok(Self::HashRouted),
            "3" | "round_robin" => Ok(Self::RoundRobin),
            _ => Err(BalancerError::unknown_strategy(s)),
        }
    }
}

/// Routes to the destination with the smallest current load
#[derive(Debug, Clone, Copy, Default)]
pub struct LeastLoaded;

impl BalancingStrategy for LeastLoaded {
    fn select(
        &self,
        _request: &Request,
        destinations: &[Arc<Destination>],
    ) -> Option<Arc<Destination>> {
        // min_by_key keeps the first minimum, which is the lowest address
        destinations
            .iter()
            .min_by_key(|destination| destination.current_load())
            .cloned()
    }

    fn algorithm_name(&self) -> &'static str {
        "least_loaded"
    }
}

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a over raw bytes
///
/// Used instead of `std::hash` so routing decisions are identical across builds,
/// platforms and implementations.
pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Routes by hashing the request id
///
/// The index is `fnv1a_64(id) % destinations.len()`. This is plain modulo hashing,
/// not a consistent-hash ring: any membership change remaps most ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashRouted;

impl HashRouted {
    /// Index that `select` would pick for `request_id` among `len` destinations
    pub fn index_for(request_id: &str, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        Some((fnv1a_64(request_id.as_bytes()) % len as u64) as usize)
    }
}

impl BalancingStrategy for HashRouted {
    fn select(
        &self,
        request: &Request,
        destinations: &[Arc<Destination>],
    ) -> Option<Arc<Destination>> {
        let index = Self::index_for(request.id(), destinations.len())?;
        destinations.get(index).cloned()
    }

    fn algorithm_name(&self) -> &'static str {
        "hash_routed"
    }
}

/// A fixed rotation order with a shared cursor
#[derive(Debug)]
struct Rotation {
    order: Vec<Arc<Destination>>,
    cursor: AtomicUsize,
}

impl Rotation {
    fn new(order: Vec<Arc<Destination>>) -> Self {
        Self {
            order,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Hand out the current position and advance, wrapping at the end
    fn next(&self) -> Option<Arc<Destination>> {
        let len = self.order.len();
        if len == 0 {
            return None;
        }

        let position = match self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cursor| {
                Some((cursor + 1) % len)
            }) {
            Ok(previous) | Err(previous) => previous,
        };

        self.order.get(position).cloned()
    }
}

/// Cycles through destinations, one rotation per request type
///
/// The rotation for a request type is captured from the destination list the first
/// time that type is balanced. Later membership changes are not picked up until
/// `resync` (or `reset`) discards the rotation.
///
/// This includes a service that is emptied and then refilled: selections fail while
/// it is empty, but once it has members again the old rotation resumes and keeps
/// handing out the removed destinations.
#[derive(Debug, Default)]
pub struct RoundRobin {
    rotations: DashMap<String, Arc<Rotation>>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard the rotation for one request type so the next call rebuilds it
    ///
    /// Returns `true` if a rotation existed.
    pub fn resync(&self, request_type: &str) -> bool {
        self.rotations.remove(request_type).is_some()
    }

    /// Length of the captured rotation for a request type, if one exists
    pub fn rotation_len(&self, request_type: &str) -> Option<usize> {
        self.rotations
            .get(request_type)
            .map(|rotation| rotation.order.len())
    }
}

impl BalancingStrategy for RoundRobin {
    fn select(
        &self,
        request: &Request,
        destinations: &[Arc<Destination>],
    ) -> Option<Arc<Destination>> {
        if destinations.is_empty() {
            return None;
        }

        // Clone the Arc out so the shard lock is released before advancing
        let rotation = {
            let entry = self
                .rotations
                .entry(request.request_type().to_string())
                .or_insert_with(|| Arc::new(Rotation::new(destinations.to_vec())));
            Arc::clone(entry.value())
        };

        rotation.next()
    }

    fn algorithm_name(&self) -> &'static str {
        "round_robin"
    }

    fn reset(&self) {
        self.rotations.clear();
    }
}

/// The closed set of strategies, picked at construction time
#[derive(Debug)]
pub enum Strategy {
    LeastLoaded(LeastLoaded),
    HashRouted(HashRouted),
    RoundRobin(RoundRobin),
}

impl Strategy {
    pub fn new(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::LeastLoaded => Self::LeastLoaded(LeastLoaded),
            StrategyKind::HashRouted => Self::HashRouted(HashRouted),
            StrategyKind::RoundRobin => Self::RoundRobin(RoundRobin::new()),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::LeastLoaded(_) => StrategyKind::LeastLoaded,
            Self::HashRouted(_) => StrategyKind::HashRouted,
            Self::RoundRobin(_) => StrategyKind::RoundRobin,
        }
    }

    /// Round-robin state, when this is the round-robin variant
    pub fn as_round_robin(&self) -> Option<&RoundRobin> {
        match self {
            Self::RoundRobin(round_robin) => Some(round_robin),
            _ => None,
        }
    }
}

impl From<StrategyKind> for Strategy {
    fn from(kind: StrategyKind) -> Self {
        Self::new(kind)
    }
}

impl BalancingStrategy for Strategy {
    fn select(
        &self,
        request: &Request,
        destinations: &[Arc<Destination>],
    ) -> Option<Arc<Destination>> {
        match self {
            Self::LeastLoaded(strategy) => strategy.select(request, destinations),
            Self::HashRouted(strategy) => strategy.select(request, destinations),
            Self::RoundRobin(strategy) => strategy.select(request, destinations),
        }
    }

    fn algorithm_name(&self) -> &'static str {
        self.kind().algorithm_name()
    }

    fn reset(&self) {
        if let Self::RoundRobin(strategy) = self {
            strategy.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn destinations(addresses: &[&str]) -> Vec<Arc<Destination>> {
        addresses
            .iter()
            .map(|address| Destination::shared(*address, 5))
            .collect()
    }

    fn request(id: &str) -> Request {
        Request::new(id, "http")
    }

    #[test]
    fn test_fnv1a_reference_values() {
        assert_eq!(fnv1a_64(b""), 0xcbf29ce484222325);
        assert_eq!(fnv1a_64(b"a"), 0xaf63dc4c8601ec8c);
        assert_eq!(fnv1a_64(b"foobar"), 0x85944171f73967e8);
    }

    #[test]
    fn test_least_loaded_prefers_lowest_load() {
        let pool = destinations(&["d1", "d2", "d3"]);
        pool[0].accept();
        pool[1].accept();

        let selected = LeastLoaded.select(&request("r"), &pool).unwrap();
        assert_eq!(selected.address(), "d3");
    }

    #[test]
    fn test_least_loaded_ties_go_to_first() {
        let pool = destinations(&["d1", "d2", "d3"]);
        pool[0].accept();

        let selected = LeastLoaded.select(&request("r"), &pool).unwrap();
        assert_eq!(selected.address(), "d2");
    }

    #[test]
    fn test_hash_routed_is_deterministic() {
        let pool = destinations(&["d1", "d2", "d3"]);
        let first = HashRouted.select(&request("REQ42"), &pool).unwrap();
        let second = HashRouted.select(&request("REQ42"), &pool).unwrap();
        assert_eq!(first.address(), second.address());

        let expected = (fnv1a_64(b"REQ42") % 3) as usize;
        assert_eq!(first.address(), pool[expected].address());
    }

    #[test]
    fn test_hash_routed_index_for_empty() {
        assert_eq!(HashRouted::index_for("REQ1", 0), None);
        assert_eq!(HashRouted::index_for("REQ1", 1), Some(0));
    }

    #[test]
    fn test_round_robin_cycles_in_order() {
        let pool = destinations(&["d1", "d2", "d3"]);
        let round_robin = RoundRobin::new();

        let picked: Vec<String> = (0..7)
            .map(|_| {
                round_robin
                    .select(&request("r"), &pool)
                    .unwrap()
                    .address()
                    .to_string()
            })
            .collect();
        assert_eq!(picked, vec!["d1", "d2", "d3", "d1", "d2", "d3", "d1"]);
    }

    #[test]
    fn test_round_robin_keeps_rotation_until_resync() {
        let round_robin = RoundRobin::new();
        let pool = destinations(&["d1", "d2"]);
        round_robin.select(&request("r"), &pool);

        let grown = destinations(&["d1", "d2", "d3"]);
        assert_eq!(round_robin.rotation_len("http"), Some(2));
        assert_eq!(round_robin.select(&request("r"), &grown).unwrap().address(), "d2");
        assert_eq!(round_robin.select(&request("r"), &grown).unwrap().address(), "d1");

        assert!(round_robin.resync("http"));
        assert_eq!(round_robin.select(&request("r"), &grown).unwrap().address(), "d1");
        assert_eq!(round_robin.rotation_len("http"), Some(3));
    }

    #[test]
    fn test_round_robin_rotation_per_request_type() {
        let round_robin = RoundRobin::new();
        let pool = destinations(&["d1", "d2"]);

        let http = Request::new("r", "http");
        let grpc = Request::new("r", "grpc");
        assert_eq!(round_robin.select(&http, &pool).unwrap().address(), "d1");
        assert_eq!(round_robin.select(&grpc, &pool).unwrap().address(), "d1");
        assert_eq!(round_robin.select(&http, &pool).unwrap().address(), "d2");
    }

    #[test]
    fn test_empty_pool_selects_nothing() {
        for kind in StrategyKind::ALL {
            let strategy = Strategy::new(kind);
            assert!(strategy.select(&request("r"), &[]).is_none());
        }
    }

    #[test]
    fn test_strategy_kind_parsing() {
        assert_eq!("least_connection".parse::<StrategyKind>().unwrap(), StrategyKind::LeastLoaded);
        assert_eq!("2".parse::<StrategyKind>().unwrap(), StrategyKind::HashRouted);
        assert_eq!(" Round_Robin ".parse::<StrategyKind>().unwrap(), StrategyKind::RoundRobin);
        assert!("random".parse::<StrategyKind>().is_err());

        assert_eq!(StrategyKind::from_menu_choice(1), Some(StrategyKind::LeastLoaded));
        assert_eq!(StrategyKind::from_menu_choice(4), None);
        assert_eq!(StrategyKind::HashRouted.to_string(), "hash_routed");
    }

    #[test]
    fn test_strategy_dispatch_reports_kind() {
        for kind in StrategyKind::ALL {
            let strategy = Strategy::from(kind);
            assert_eq!(strategy.kind(), kind);
            assert_eq!(strategy.algorithm_name(), kind.algorithm_name());
        }
        assert!(Strategy::new(StrategyKind::RoundRobin).as_round_robin().is_some());
        assert!(Strategy::new(StrategyKind::LeastLoaded).as_round_robin().is_none());
    }
}
