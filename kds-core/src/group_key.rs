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

//! Per-group monotonic key generation: mint-on-demand, renew-before-expiry,
//! and a grace window for consumers that fetched a generation just before
//! it rolled over.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use kds_primitives::crypto::{new_key, Key};
use kds_primitives::storage_codec::StorageCodec;

use crate::error::KdsError;
use crate::key_store::{KeyStore, StoredKey};

/// Generation-mint races retry up to this many times before giving up with
/// `Conflict`.
const MAX_MINT_ATTEMPTS: usize = 5;

/// A resolved group key, ready to be used as the target key (`TK`) for a
/// group ticket or returned directly to a member via `get_group_key`.
pub struct ResolvedGroupKey {
    pub generation: u64,
    pub key: Key,
    pub expiration: Option<DateTime<Utc>>,
}

/// Tunables governing §4.4.5's resolution policy, one instance shared by
/// every group.
#[derive(Clone, Copy, Debug)]
pub struct GroupKeyPolicy {
    pub timeout: Duration,
    pub renew_time: Duration,
}

pub trait GroupKeyGenerator: Send + Sync {
    /// Resolve a group key. `requested_generation` of `None` or `Some(0)`
    /// means "any" — the caller doesn't care which generation, only that
    /// it's current or freshly minted. A specific generation is resolved
    /// against the grace window the backing store enforces.
    fn resolve(
        &self,
        group: &str,
        requested_generation: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<ResolvedGroupKey, KdsError>;
}

pub struct StandardGroupKeyGenerator {
    store: Arc<dyn KeyStore>,
    codec: Arc<StorageCodec>,
    policy: GroupKeyPolicy,
}

impl StandardGroupKeyGenerator {
    pub fn new(store: Arc<dyn KeyStore>, codec: Arc<StorageCodec>, policy: GroupKeyPolicy) -> Self {
        StandardGroupKeyGenerator { store, codec, policy }
    }

    fn decrypt_stored(&self, group: &str, record: &StoredKey) -> Result<Key, KdsError> {
        let plaintext = self.codec.decrypt_key(group, &record.ciphertext, &record.mac)?;
        Ok(Key::from_slice(&plaintext)?)
    }

    /// Mint a fresh generation, retrying on a concurrent-mint conflict.
    /// Each attempt regenerates the key material too — a retried attempt
    /// reusing stale key bytes would make two distinct generations share a
    /// key, which the invariant that every generation is independently
    /// rotatable forbids.
    fn mint(&self, group: &str, now: DateTime<Utc>) -> Result<ResolvedGroupKey, KdsError> {
        for _ in 0..MAX_MINT_ATTEMPTS {
            let key = new_key()?;
            let expiration = now + self.policy.timeout;
            let (ciphertext, mac) = self.codec.encrypt_key(group, key.as_bytes())?;

            match self.store.set_key(group, &ciphertext, &mac, true, Some(expiration)) {
                Ok(generation) => {
                    return Ok(ResolvedGroupKey {
                        generation,
                        key,
                        expiration: Some(expiration),
                    })
                }
                Err(KdsError::Conflict { .. }) => continue,
                Err(other) => return Err(other),
            }
        }
        Err(KdsError::Conflict { name: group.to_string() })
    }

    fn resolve_any(&self, group: &str, now: DateTime<Utc>) -> Result<ResolvedGroupKey, KdsError> {
        match self.store.get_key(group, None, Some(true), now)? {
            None => self.mint(group, now),
            Some(record) => {
                let still_fresh = match record.expiration {
                    Some(exp) => now < exp - self.policy.renew_time,
                    None => true,
                };
                if still_fresh {
                    let key = self.decrypt_stored(group, &record)?;
                    Ok(ResolvedGroupKey {
                        generation: record.generation,
                        key,
                        expiration: record.expiration,
                    })
                } else {
                    self.mint(group, now)
                }
            }
        }
    }

    fn resolve_specific(&self, group: &str, generation: u64, now: DateTime<Utc>) -> Result<ResolvedGroupKey, KdsError> {
        let latest_generation = self
            .store
            .get_key(group, None, Some(true), now)?
            .map_or(0, |record| record.generation);

        if generation > latest_generation {
            return Err(KdsError::not_found(group, Some(generation)));
        }

        // Within range; the grace window (eliding generations older than
        // `now - additional_retrieve`) is enforced by the store itself, so
        // a `None` here means genuinely evicted, not merely "not latest".
        match self.store.get_key(group, Some(generation), Some(true), now)? {
            Some(record) => {
                let key = self.decrypt_stored(group, &record)?;
                Ok(ResolvedGroupKey {
                    generation: record.generation,
                    key,
                    expiration: record.expiration,
                })
            }
            None => Err(KdsError::not_found(group, Some(generation))),
        }
    }
}

impl GroupKeyGenerator for StandardGroupKeyGenerator {
    fn resolve(
        &self,
        group: &str,
        requested_generation: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<ResolvedGroupKey, KdsError> {
        if !self.store.group_exists(group)? {
            return Err(KdsError::unauthorized("Invalid Target"));
        }

        match requested_generation {
            None | Some(0) => self.resolve_any(group, now),
            Some(generation) => self.resolve_specific(group, generation, now),
        }
    }
}

/// The first dotted segment of a principal name identifies the group it
/// belongs to, e.g. `scheduler.openstack.local` is a member of `scheduler`.
pub fn is_group_member(requestor: &str, group_name: &str) -> bool {
    requestor.split('.').next() == Some(group_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_store::InMemoryKeyStore;
    use kds_primitives::master_key::MasterKey;

    fn generator(timeout: Duration, renew_time: Duration, additional_retrieve: Duration) -> (StandardGroupKeyGenerator, Arc<dyn KeyStore>) {
        let dir = tempfile::tempdir().unwrap();
        let mk = MasterKey::load_or_create(&dir.path().join("kds.mkey")).unwrap();
        std::mem::forget(dir);
        let codec = Arc::new(StorageCodec::new(Arc::new(mk)));
        let store: Arc<dyn KeyStore> = Arc::new(InMemoryKeyStore::new(additional_retrieve));
        let policy = GroupKeyPolicy { timeout, renew_time };
        (StandardGroupKeyGenerator::new(store.clone(), codec, policy), store)
    }

    #[test]
    fn unknown_group_is_unauthorized() {
        let (gen, _store) = generator(Duration::seconds(900), Duration::seconds(120), Duration::seconds(600));
        let err = gen.resolve("scheduler", None, Utc::now()).unwrap_err();
        assert!(matches!(err, KdsError::Unauthorized { .. }));
    }

    #[test]
    fn mints_generation_one_on_first_fetch() {
        let (gen, store) = generator(Duration::seconds(900), Duration::seconds(120), Duration::seconds(600));
        store.create_group("scheduler").unwrap();

        let resolved = gen.resolve("scheduler", None, Utc::now()).unwrap();
        assert_eq!(resolved.generation, 1);
    }

    #[test]
    fn returns_same_generation_while_fresh() {
        let (gen, store) = generator(Duration::seconds(900), Duration::seconds(120), Duration::seconds(600));
        store.create_group("scheduler").unwrap();
        let now = Utc::now();

        let first = gen.resolve("scheduler", None, now).unwrap();
        let second = gen.resolve("scheduler", None, now).unwrap();
        assert_eq!(first.generation, second.generation);
        assert_eq!(first.key.as_bytes(), second.key.as_bytes());
    }

    #[test]
    fn mints_new_generation_past_renew_time() {
        let (gen, store) = generator(Duration::seconds(900), Duration::seconds(120), Duration::seconds(600));
        store.create_group("scheduler").unwrap();
        let t0 = Utc::now();

        let first = gen.resolve("scheduler", None, t0).unwrap();
        let past_renew = t0 + Duration::seconds(900 - 120 + 1);
        let second = gen.resolve("scheduler", None, past_renew).unwrap();
        assert_eq!(second.generation, first.generation + 1);
    }

    #[test]
    fn specific_generation_ahead_of_latest_is_not_found() {
        let (gen, store) = generator(Duration::seconds(900), Duration::seconds(120), Duration::seconds(600));
        store.create_group("scheduler").unwrap();
        gen.resolve("scheduler", None, Utc::now()).unwrap();

        let err = gen.resolve("scheduler", Some(5), Utc::now()).unwrap_err();
        assert!(matches!(err, KdsError::NotFound { .. }));
    }

    #[test]
    fn expired_generation_retrievable_within_grace_window_then_not() {
        let (gen, store) = generator(Duration::seconds(900), Duration::seconds(120), Duration::seconds(600));
        store.create_group("scheduler").unwrap();
        let t0 = Utc::now();
        let first = gen.resolve("scheduler", None, t0).unwrap();

        // Force a new generation by advancing well past timeout.
        let t1 = t0 + Duration::seconds(1000);
        let second = gen.resolve("scheduler", None, t1).unwrap();
        assert_eq!(second.generation, first.generation + 1);

        // Generation 1's expiration was t0 + 900; at t1 (t0+1000) it's 100s
        // past expiry, still within the 600s grace window.
        let within_grace = gen.resolve("scheduler", Some(first.generation), t1).unwrap();
        assert_eq!(within_grace.generation, first.generation);

        // Querying the store at a point past the grace window should elide
        // the old generation.
        let past_grace = t0 + Duration::seconds(900 + 600 + 1);
        let evicted = store.get_key("scheduler", Some(first.generation), Some(true), past_grace).unwrap();
        assert!(evicted.is_none());
    }

    #[test]
    fn membership_rule_matches_first_dotted_segment() {
        assert!(is_group_member("scheduler.openstack.local", "scheduler"));
        assert!(!is_group_member("foo.local", "bar"));
        assert!(!is_group_member("schedulerx", "scheduler"));
    }
}
