//! # Destinations
//!
//! A destination is a single capacity-bounded endpoint. It owns its in-flight load
//! counter and only lets it move through two operations:
//!
//! - `accept()` reserves one unit of capacity if any is left
//! - `complete()` releases one unit, never going below zero
//!
//! ## Concurrency
//!
//! The load counter is an `AtomicU32` updated with a compare-and-swap loop
//! (`fetch_update`), so two racing `accept()` calls can never both take the last
//! unit of capacity. The invariant `0 <= current_load <= capacity_threshold`
//! holds under any interleaving.

use metrics::{counter, gauge};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// A capacity-bounded endpoint that can accept or reject work
#[derive(Debug)]
pub struct Destination {
    address: String,
    capacity_threshold: u32,
    current_load: AtomicU32,
}

impl Destination {
    /// Create a destination with zero load
    pub fn new<S: Into<String>>(address: S, capacity_threshold: u32) -> Self {
        Self {
            address: address.into(),
            capacity_threshold,
            current_load: AtomicU32::new(0),
        }
    }

    /// Create a destination already wrapped for sharing between services and callers
    pub fn shared<S: Into<String>>(address: S, capacity_threshold: u32) -> Arc<Self> {
        Arc::new(Self::new(address, capacity_threshold))
    }

    /// Stable identity of the destination
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn capacity_threshold(&self) -> u32 {
        self.capacity_threshold
    }

    /// Number of admitted requests not yet completed
    pub fn current_load(&self) -> u32 {
        self.current_load.load(Ordering::Acquire)
    }

    /// Units of capacity still free
    pub fn available_capacity(&self) -> u32 {
        self.capacity_threshold.saturating_sub(self.current_load())
    }

    pub fn is_saturated(&self) -> bool {
        self.available_capacity() == 0
    }

    /// Try to reserve one unit of capacity
    ///
    /// Returns `true` and increments the load when `current_load < capacity_threshold`.
    /// Returns `false` and leaves the load untouched otherwise.
    pub fn accept(&self) -> bool {
        let threshold = self.capacity_threshold;
        let result = self
            .current_load
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |load| {
                (load < threshold).then(|| load + 1)
            });

        match result {
            Ok(previous) => {
                let load = previous + 1;
                counter!("balancer_admissions_accepted").increment(1);
                gauge!("balancer_destination_load", "destination" => self.address.clone())
                    .set(f64::from(load));

                debug!(
                    destination = %self.address,
                    current_load = load,
                    capacity = threshold,
                    "Request accepted"
                );
                true
            }
            Err(load) => {
                counter!("balancer_admissions_rejected").increment(1);

                warn!(
                    destination = %self.address,
                    current_load = load,
                    capacity = threshold,
                    "Request rejected, destination overloaded"
                );
                false
            }
        }
    }

    /// Release one unit of capacity
    ///
    /// Calling this at zero load is a no-op.
    pub fn complete(&self) {
        let result = self
            .current_load
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |load| load.checked_sub(1));

        if let Ok(previous) = result {
            let load = previous - 1;
            counter!("balancer_completions").increment(1);
            gauge!("balancer_destination_load", "destination" => self.address.clone())
                .set(f64::from(load));

            debug!(
                destination = %self.address,
                current_load = load,
                "Request completed"
            );
        }
    }

    /// Admit a request and hand back a guard that releases it
    ///
    /// The guard calls `complete()` exactly once, when finished or dropped.
    pub fn try_admit(self: &Arc<Self>) -> Option<Admission> {
        self.accept().then(|| Admission {
            destination: Arc::clone(self),
        })
    }
}

/// One reserved unit of a destination's capacity
#[must_use = "dropping an admission releases the reserved capacity immediately"]
#[derive(Debug)]
pub struct Admission {
    destination: Arc<Destination>,
}

impl Admission {
    /// The destination holding the reservation
    pub fn destination(&self) -> &Arc<Destination> {
        &self.destination
    }

    /// Mark the request as completed
    pub fn finish(self) {}
}

impl Drop for Admission {
    fn drop(&mut self) {
        self.destination.complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_until_threshold() {
        let destination = Destination::new("192.168.0.1", 2);

        assert!(destination.accept());
        assert_eq!(destination.current_load(), 1);
        assert!(destination.accept());
        assert_eq!(destination.current_load(), 2);
        assert!(!destination.accept());
        assert_eq!(destination.current_load(), 2);
        assert!(destination.is_saturated());

        destination.complete();
        assert_eq!(destination.current_load(), 1);
        assert!(destination.accept());
        assert_eq!(destination.current_load(), 2);
    }

    #[test]
    fn test_complete_at_zero_is_noop() {
        let destination = Destination::new("192.168.0.1", 3);
        destination.complete();
        destination.complete();
        assert_eq!(destination.current_load(), 0);
        assert_eq!(destination.available_capacity(), 3);
    }

    #[test]
    fn test_zero_threshold_rejects_everything() {
        let destination = Destination::new("10.0.0.9", 0);
        assert!(!destination.accept());
        assert_eq!(destination.current_load(), 0);
        assert!(destination.is_saturated());
    }

    #[test]
    fn test_admission_guard_releases_on_drop() {
        let destination = Destination::shared("10.0.0.1", 1);

        let admission = destination.try_admit().expect("capacity available");
        assert_eq!(admission.destination().address(), "10.0.0.1");
        assert_eq!(destination.current_load(), 1);
        assert!(destination.try_admit().is_none());

        admission.finish();
        assert_eq!(destination.current_load(), 0);

        {
            let _held = destination.try_admit().expect("capacity available");
            assert_eq!(destination.current_load(), 1);
        }
        assert_eq!(destination.current_load(), 0);
    }

    #[test]
    fn test_concurrent_accept_respects_capacity() {
        let destination = Destination::shared("10.0.0.1", 10);

        let accepted: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..32)
                .map(|_| {
                    let destination = Arc::clone(&destination);
                    scope.spawn(move || destination.accept())
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap() as usize)
                .sum()
        });

        assert_eq!(accepted, 10);
        assert_eq!(destination.current_load(), 10);
    }
}
