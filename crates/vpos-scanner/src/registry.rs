//! # Subscriber Registry
//!
//! Insertion-ordered callbacks keyed by monotonically increasing ids.
//!
//! ```text
//! on_scan(a) ──► SubscriptionId(1) ─┐
//! on_scan(b) ──► SubscriptionId(2) ─┼──► BTreeMap<SubscriptionId, ScanCallback>
//! on_scan(c) ──► SubscriptionId(3) ─┘         (iterated in id order)
//! off_scan(2) ─► removes b only; 1 and 3 keep their ids
//! ```
//!
//! Ids are never reused while the registry lives.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{error, trace};

/// A scan subscriber. The return value of the original callback is ignored.
pub type ScanCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Opaque handle returned by `on_scan`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Ordered set of scan subscribers.
pub struct SubscriberRegistry {
    next_id: u64,
    subscribers: BTreeMap<SubscriptionId, ScanCallback>,
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("next_id", &self.next_id)
            .field("ids", &self.subscribers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        SubscriberRegistry {
            next_id: 1,
            subscribers: BTreeMap::new(),
        }
    }

    /// Registers a callback and returns its handle.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.insert(id, Arc::new(callback));
        id
    }

    /// Removes exactly the subscriber registered under `id`.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.subscribers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Copies out the current subscribers in registration order so they can
    /// be invoked without holding the registry lock.
    pub fn snapshot(&self) -> Vec<(SubscriptionId, ScanCallback)> {
        self.subscribers
            .iter()
            .map(|(id, cb)| (*id, Arc::clone(cb)))
            .collect()
    }
}

// =============================================================================
// Delivery
// =============================================================================

/// Invokes every subscriber with `code`.
///
/// A panicking subscriber is logged and skipped; the rest still run.
/// Returns how many subscribers completed normally.
pub fn deliver(subscribers: &[(SubscriptionId, ScanCallback)], code: &str) -> usize {
    let mut delivered = 0;

    for (id, callback) in subscribers {
        match catch_unwind(AssertUnwindSafe(|| callback(code))) {
            Ok(()) => {
                trace!(subscription = %id, "Subscriber notified");
                delivered += 1;
            }
            Err(payload) => {
                error!(
                    subscription = %id,
                    code = %code,
                    reason = %panic_message(payload.as_ref()),
                    "Scan subscriber panicked"
                );
            }
        }
    }

    delivered
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |code: &str| sink.lock().unwrap().push(code.to_string()))
    }

    #[test]
    fn test_ids_are_monotonic_and_stable() {
        let mut registry = SubscriberRegistry::new();
        let a = registry.subscribe(|_| {});
        let b = registry.subscribe(|_| {});
        let c = registry.subscribe(|_| {});
        assert!(a < b && b < c);

        assert!(registry.unsubscribe(b));
        let d = registry.subscribe(|_| {});
        assert!(d > c);
        assert!(registry.contains(a));
        assert!(registry.contains(c));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_unsubscribe_removes_exactly_one() {
        let mut registry = SubscriberRegistry::new();
        let (first, cb1) = recorder();
        let (second, cb2) = recorder();
        let id1 = registry.subscribe(cb1);
        registry.subscribe(cb2);

        assert!(registry.unsubscribe(id1));
        assert!(!registry.unsubscribe(id1));

        deliver(&registry.snapshot(), "ABC-123");
        assert!(first.lock().unwrap().is_empty());
        assert_eq!(*second.lock().unwrap(), vec!["ABC-123"]);
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let mut registry = SubscriberRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 0..4 {
            let order = Arc::clone(&order);
            registry.subscribe(move |_| order.lock().unwrap().push(n));
        }

        assert_eq!(deliver(&registry.snapshot(), "x"), 4);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_panicking_subscriber_is_isolated() {
        let mut registry = SubscriberRegistry::new();
        registry.subscribe(|_| panic!("product lookup failed"));
        let (seen, cb) = recorder();
        registry.subscribe(cb);

        assert_eq!(deliver(&registry.snapshot(), "123456"), 1);
        assert_eq!(*seen.lock().unwrap(), vec!["123456"]);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new(String::from("boom"));
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
