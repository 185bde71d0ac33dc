use std::collections::HashSet;
use std::sync::RwLock;

use crate::blockchain::canonical_address;

/// Mapping from lowercased address to an opaque subscription record.
/// Presently only presence matters; writers serialise amongst
/// themselves, readers never block each other.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    addresses: RwLock<HashSet<String>>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        SubscriptionSet::default()
    }

    /// Normalises the input to lowercase before insertion. Idempotent:
    /// subscribing the same address twice is a no-op on the second call.
    pub fn subscribe(&self, address: &str) -> bool {
        let key = canonical_address(address);
        self.addresses.write().expect("subscription lock poisoned").insert(key);
        true
    }

    pub fn unsubscribe(&self, address: &str) {
        let key = canonical_address(address);
        self.addresses.write().expect("subscription lock poisoned").remove(&key);
    }

    pub fn contains(&self, address: &str) -> bool {
        let key = canonical_address(address);
        self.addresses
            .read()
            .expect("subscription lock poisoned")
            .contains(&key)
    }
}
