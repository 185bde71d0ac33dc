use std::collections::HashMap;
use std::sync::RwLock;

use crate::blockchain::{canonical_address, AddressTransaction, Transaction};

/// Mapping from lowercased address to an append-only sequence of
/// transactions. Writes are batch-append with no dedup and no ordering
/// guarantee; reads return the full sequence for one key, or an empty
/// one for a key that was never written.
#[derive(Debug, Default)]
pub struct AddressIndex {
    by_address: RwLock<HashMap<String, Vec<Transaction>>>,
}

impl AddressIndex {
    pub fn new() -> Self {
        AddressIndex::default()
    }

    /// Canonicalizes `address` before lookup, symmetric with
    /// `SubscriptionSet::contains` — callers may pass either case.
    pub fn get(&self, address: &str) -> Vec<Transaction> {
        let key = canonical_address(address);
        self.by_address
            .read()
            .expect("address index lock poisoned")
            .get(&key)
            .cloned()
            .unwrap_or_default()
    }

    /// Appends every entry in `batch` to its address's sequence. Entries
    /// for the same address in one batch are all appended; order across
    /// the whole batch is not guaranteed to any caller.
    pub fn insert_batch(&self, batch: Vec<AddressTransaction>) {
        if batch.is_empty() {
            return;
        }
        let mut grouped: HashMap<String, Vec<Transaction>> = HashMap::new();
        for entry in batch {
            grouped.entry(entry.address).or_default().push(entry.transaction);
        }

        let mut guard = self.by_address.write().expect("address index lock poisoned");
        for (address, mut txs) in grouped {
            guard.entry(address).or_default().append(&mut txs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(hash: &str) -> Transaction {
        Transaction {
            hash: Some(hash.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn missing_key_returns_empty_not_error() {
        let index = AddressIndex::new();
        assert!(index.get("0xnope").is_empty());
    }

    #[test]
    fn batch_insert_appends_per_address() {
        let index = AddressIndex::new();
        index.insert_batch(vec![
            AddressTransaction {
                address: "0xaa".into(),
                transaction: tx("0x1"),
            },
            AddressTransaction {
                address: "0xbb".into(),
                transaction: tx("0x2"),
            },
            AddressTransaction {
                address: "0xaa".into(),
                transaction: tx("0x3"),
            },
        ]);

        assert_eq!(index.get("0xaa").len(), 2);
        assert_eq!(index.get("0xbb").len(), 1);
    }

    #[test]
    fn self_transfer_produces_two_entries_under_one_key() {
        let index = AddressIndex::new();
        index.insert_batch(vec![
            AddressTransaction {
                address: "0xdd".into(),
                transaction: tx("0x1"),
            },
            AddressTransaction {
                address: "0xdd".into(),
                transaction: tx("0x1"),
            },
        ]);
        assert_eq!(index.get("0xdd").len(), 2);
    }

    #[test]
    fn get_is_case_insensitive() {
        let index = AddressIndex::new();
        index.insert_batch(vec![AddressTransaction {
            address: "0xaa".into(),
            transaction: tx("0x1"),
        }]);
        assert_eq!(index.get("0xAA").len(), 1);
        assert_eq!(index.get("0xAa").len(), 1);
    }

    #[test]
    fn appends_across_multiple_batches() {
        let index = AddressIndex::new();
        index.insert_batch(vec![AddressTransaction {
            address: "0xaa".into(),
            transaction: tx("0x1"),
        }]);
        index.insert_batch(vec![AddressTransaction {
            address: "0xaa".into(),
            transaction: tx("0x2"),
        }]);
        assert_eq!(index.get("0xaa").len(), 2);
    }
}
