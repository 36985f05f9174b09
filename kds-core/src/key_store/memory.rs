// Copyright 2015-2020 Parity Technologies (UK) Ltd.
// This file is part of Parity Secret Store.

// Parity Secret Store is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Parity Secret Store is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Parity Secret Store.  If not, see <http://www.gnu.org/licenses/>.

//! In-memory `KeyStore` backed by a `parking_lot::RwLock<BTreeMap<..>>`.
//!
//! Single-process deployments can use this directly; the test suite always
//! does. Generation allocation is serialized by the write lock, which
//! trivially satisfies the "distinct, strictly increasing generations"
//! requirement for concurrent `set_key` calls in a single process.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

use super::{KeyStore, StoredKey};
use crate::error::KdsError;

#[derive(Clone)]
struct Generation {
    ciphertext: Vec<u8>,
    mac: Vec<u8>,
    expiration: Option<DateTime<Utc>>,
}

struct Principal {
    is_group: bool,
    latest_generation: u64,
    generations: BTreeMap<u64, Generation>,
}

pub struct InMemoryKeyStore {
    /// Records whose expiration is older than `now - additional_retrieve`
    /// are elided from `get_key` results (grace-window GC).
    additional_retrieve: Duration,
    principals: RwLock<BTreeMap<String, Principal>>,
}

impl InMemoryKeyStore {
    pub fn new(additional_retrieve: Duration) -> Self {
        InMemoryKeyStore {
            additional_retrieve,
            principals: RwLock::new(BTreeMap::new()),
        }
    }

    fn elided(&self, generation: &Generation, now: DateTime<Utc>) -> bool {
        match generation.expiration {
            Some(expiration) => now - expiration > self.additional_retrieve,
            None => false,
        }
    }
}

impl KeyStore for InMemoryKeyStore {
    fn set_key(
        &self,
        name: &str,
        ciphertext: &[u8],
        mac: &[u8],
        is_group: bool,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<u64, KdsError> {
        let mut principals = self.principals.write();
        let entry = principals.entry(name.to_string()).or_insert_with(|| Principal {
            is_group,
            latest_generation: 0,
            generations: BTreeMap::new(),
        });

        if entry.is_group != is_group {
            return Err(KdsError::validation("is_group", name));
        }

        let generation = entry.latest_generation + 1;
        entry.generations.insert(
            generation,
            Generation {
                ciphertext: ciphertext.to_vec(),
                mac: mac.to_vec(),
                expiration,
            },
        );
        entry.latest_generation = generation;

        Ok(generation)
    }

    fn get_key(
        &self,
        name: &str,
        generation: Option<u64>,
        is_group_filter: Option<bool>,
        now: DateTime<Utc>,
    ) -> Result<Option<StoredKey>, KdsError> {
        let principals = self.principals.read();
        let Some(entry) = principals.get(name) else {
            return Ok(None);
        };

        if let Some(expected) = is_group_filter {
            if entry.is_group != expected {
                return Ok(None);
            }
        }

        let target_generation = generation.unwrap_or(entry.latest_generation);
        if target_generation == 0 {
            return Ok(None);
        }

        let Some(record) = entry.generations.get(&target_generation) else {
            return Ok(None);
        };

        if self.elided(record, now) {
            return Ok(None);
        }

        Ok(Some(StoredKey {
            name: name.to_string(),
            generation: target_generation,
            ciphertext: record.ciphertext.clone(),
            mac: record.mac.clone(),
            is_group: entry.is_group,
            expiration: record.expiration,
        }))
    }

    fn create_group(&self, name: &str) -> Result<bool, KdsError> {
        let mut principals = self.principals.write();
        if principals.contains_key(name) {
            Ok(false)
        } else {
            principals.insert(
                name.to_string(),
                Principal {
                    is_group: true,
                    latest_generation: 0,
                    generations: BTreeMap::new(),
                },
            );
            Ok(true)
        }
    }

    fn delete(&self, name: &str, is_group: Option<bool>) -> Result<bool, KdsError> {
        let mut principals = self.principals.write();
        let matches = principals
            .get(name)
            .map(|entry| is_group.map_or(true, |g| g == entry.is_group))
            .unwrap_or(false);

        if matches {
            principals.remove(name);
        }

        Ok(matches)
    }

    fn group_exists(&self, name: &str) -> Result<bool, KdsError> {
        let principals = self.principals.read();
        Ok(principals.get(name).is_some_and(|entry| entry.is_group))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryKeyStore {
        InMemoryKeyStore::new(Duration::seconds(600))
    }

    #[test]
    fn generations_are_strictly_monotonic() {
        let store = store();
        let g1 = store.set_key("alice", b"ct1", b"mac1", false, None).unwrap();
        let g2 = store.set_key("alice", b"ct2", b"mac2", false, None).unwrap();
        let g3 = store.set_key("alice", b"ct3", b"mac3", false, None).unwrap();
        assert_eq!((g1, g2, g3), (1, 2, 3));
    }

    #[test]
    fn get_key_defaults_to_latest() {
        let store = store();
        store.set_key("alice", b"ct1", b"mac1", false, None).unwrap();
        store.set_key("alice", b"ct2", b"mac2", false, None).unwrap();

        let latest = store.get_key("alice", None, None, Utc::now()).unwrap().unwrap();
        assert_eq!(latest.generation, 2);
        assert_eq!(latest.ciphertext, b"ct2");
    }

    #[test]
    fn get_key_can_target_an_older_generation() {
        let store = store();
        store.set_key("alice", b"ct1", b"mac1", false, None).unwrap();
        store.set_key("alice", b"ct2", b"mac2", false, None).unwrap();

        let first = store.get_key("alice", Some(1), None, Utc::now()).unwrap().unwrap();
        assert_eq!(first.ciphertext, b"ct1");
    }

    #[test]
    fn rejects_is_group_flag_change() {
        let store = store();
        store.set_key("alice", b"ct1", b"mac1", false, None).unwrap();
        assert!(store.set_key("alice", b"ct2", b"mac2", true, None).is_err());
    }

    #[test]
    fn create_group_is_idempotent() {
        let store = store();
        assert!(store.create_group("scheduler").unwrap());
        assert!(!store.create_group("scheduler").unwrap());
    }

    #[test]
    fn elided_past_grace_window() {
        let store = store();
        let now = Utc::now();
        let expiration = now - Duration::seconds(1000);
        store
            .set_key("group1", b"ct", b"mac", true, Some(expiration))
            .unwrap();

        assert!(store.get_key("group1", None, None, now).unwrap().is_none());
    }

    #[test]
    fn retrievable_within_grace_window() {
        let store = store();
        let now = Utc::now();
        let expiration = now - Duration::seconds(100);
        store
            .set_key("group1", b"ct", b"mac", true, Some(expiration))
            .unwrap();

        assert!(store.get_key("group1", None, None, now).unwrap().is_some());
    }

    #[test]
    fn delete_reports_whether_anything_was_removed() {
        let store = store();
        store.set_key("alice", b"ct", b"mac", false, None).unwrap();
        assert!(store.delete("alice", None).unwrap());
        assert!(!store.delete("alice", None).unwrap());
    }

    #[test]
    fn group_exists_before_any_key_is_minted() {
        let store = store();
        assert!(!store.group_exists("scheduler").unwrap());
        store.create_group("scheduler").unwrap();
        assert!(store.group_exists("scheduler").unwrap());
        assert!(store
            .get_key("scheduler", None, Some(true), Utc::now())
            .unwrap()
            .is_none());
    }
}
