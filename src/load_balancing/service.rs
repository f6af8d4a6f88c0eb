//! # Services
//!
//! A service is a named group of interchangeable destinations. Membership is a set
//! keyed by address and iterated in lexicographic address order, so every strategy
//! sees the same ordering on every run.
//!
//! The set sits behind a `parking_lot::RwLock`: `list()` clones a snapshot under the
//! read lock, while `add_destination`/`remove_destination` take the write lock. A
//! reader therefore observes the membership either before or after a mutation.

use parking_lot::RwLock;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::destination::Destination;

/// A named, address-ordered set of destinations
#[derive(Debug)]
pub struct Service {
    name: String,
    destinations: RwLock<BTreeMap<String, Arc<Destination>>>,
}

impl Service {
    /// Create an empty service
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            destinations: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create a service pre-populated with destinations
    ///
    /// Later duplicates of an address are ignored, as with `add_destination`.
    pub fn with_destinations<S, I>(name: S, destinations: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = Arc<Destination>>,
    {
        let service = Self::new(name);
        for destination in destinations {
            service.add_destination(destination);
        }
        service
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert a destination
    ///
    /// Returns `false` without changing anything when a destination with the same
    /// address is already a member.
    pub fn add_destination(&self, destination: Arc<Destination>) -> bool {
        let mut destinations = self.destinations.write();
        match destinations.entry(destination.address().to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                debug!(
                    service = %self.name,
                    destination = %destination.address(),
                    capacity = destination.capacity_threshold(),
                    "Added destination"
                );
                slot.insert(destination);
                true
            }
        }
    }

    /// Remove a destination, matched by address
    ///
    /// Returns `false` when it was not a member.
    pub fn remove_destination(&self, destination: &Destination) -> bool {
        self.remove_address(destination.address()).is_some()
    }

    /// Remove the destination registered under `address`
    pub fn remove_address(&self, address: &str) -> Option<Arc<Destination>> {
        let removed = self.destinations.write().remove(address);
        if removed.is_some() {
            debug!(service = %self.name, destination = %address, "Removed destination");
        }
        removed
    }

    /// Snapshot of the current members in address order
    pub fn list(&self) -> Vec<Arc<Destination>> {
        self.destinations.read().values().cloned().collect()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.destinations.read().contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.destinations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addresses(service: &Service) -> Vec<String> {
        service
            .list()
            .iter()
            .map(|d| d.address().to_string())
            .collect()
    }

    #[test]
    fn test_list_is_sorted_by_address() {
        let service = Service::new("web");
        service.add_destination(Destination::shared("192.168.0.3", 15));
        service.add_destination(Destination::shared("192.168.0.1", 12));
        service.add_destination(Destination::shared("192.168.0.2", 20));

        assert_eq!(
            addresses(&service),
            vec!["192.168.0.1", "192.168.0.2", "192.168.0.3"]
        );
    }

    #[test]
    fn test_duplicate_address_is_ignored() {
        let service = Service::new("web");
        assert!(service.add_destination(Destination::shared("10.0.0.1", 5)));
        assert!(!service.add_destination(Destination::shared("10.0.0.1", 99)));

        assert_eq!(service.len(), 1);
        // first registration wins
        assert_eq!(service.list()[0].capacity_threshold(), 5);
    }

    #[test]
    fn test_remove_destination() {
        let first = Destination::shared("10.0.0.1", 5);
        let second = Destination::shared("10.0.0.2", 5);
        let service = Service::with_destinations("web", [first.clone(), second.clone()]);

        assert!(service.remove_destination(&first));
        assert!(!service.remove_destination(&first));
        assert!(!service.contains("10.0.0.1"));
        assert_eq!(addresses(&service), vec!["10.0.0.2"]);

        assert!(service.remove_address("10.0.0.2").is_some());
        assert!(service.is_empty());
    }

    #[test]
    fn test_snapshot_is_unaffected_by_later_mutation() {
        let service = Service::with_destinations(
            "web",
            [Destination::shared("a", 1), Destination::shared("b", 1)],
        );
        let snapshot = service.list();
        service.remove_address("a");
        service.add_destination(Destination::shared("c", 1));

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].address(), "a");
        assert_eq!(addresses(&service), vec!["b", "c"]);
    }
}
