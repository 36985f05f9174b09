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

//! The key store: the external interface the ticket engine and group-key
//! generator consume. Any backend (in-memory map, SQL table, ...) is
//! acceptable provided it preserves the contract documented on each method.

use chrono::{DateTime, Utc};

use crate::error::KdsError;

/// A single stored generation of a principal's key material.
#[derive(Debug, Clone)]
pub struct StoredKey {
    pub name: String,
    pub generation: u64,
    pub ciphertext: Vec<u8>,
    pub mac: Vec<u8>,
    pub is_group: bool,
    pub expiration: Option<DateTime<Utc>>,
}

/// The storage backend consumed by the ticket engine and group-key
/// generator. Implementations must preserve:
///
/// - generation numbers strictly monotonic per name, never reused;
/// - atomic allocation: two concurrent `set_key` calls for the same name
///   return distinct, strictly increasing generations;
/// - `is_group` is fixed for the lifetime of a name — a later `set_key`
///   with a different flag is rejected.
pub trait KeyStore: Send + Sync {
    /// Atomically allocate the next generation for `name` and persist it.
    /// Returns the allocated generation number.
    fn set_key(
        &self,
        name: &str,
        ciphertext: &[u8],
        mac: &[u8],
        is_group: bool,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<u64, KdsError>;

    /// Fetch a key record. `generation: None` returns the latest
    /// generation. `is_group_filter: Some(flag)` requires the record match
    /// that flag or `None` is returned. Records whose expiration is older
    /// than the backend's configured grace window may be elided, judged
    /// against the caller-supplied `now` rather than the wall clock, so
    /// tests can simulate time passing without sleeping.
    fn get_key(
        &self,
        name: &str,
        generation: Option<u64>,
        is_group_filter: Option<bool>,
        now: DateTime<Utc>,
    ) -> Result<Option<StoredKey>, KdsError>;

    /// Idempotently create a group. Returns `true` if newly created.
    fn create_group(&self, name: &str) -> Result<bool, KdsError>;

    /// Remove a principal or group. Returns whether anything was removed.
    fn delete(&self, name: &str, is_group: Option<bool>) -> Result<bool, KdsError>;

    /// Whether `name` was ever created as a group, independent of whether
    /// any generation has been minted for it yet. Needed because
    /// `get_key(name, None, Some(true))` returning `None` is ambiguous
    /// between "group never created" (an unauthorized ticket target) and
    /// "group created, no key minted yet" (generation 1 should be minted
    /// on demand) — `latest_generation == 0` looks identical to absence
    /// from `get_key`'s point of view.
    fn group_exists(&self, name: &str) -> Result<bool, KdsError>;
}

pub mod memory;
pub use memory::InMemoryKeyStore;

#[cfg(feature = "sql")]
pub mod sql;
#[cfg(feature = "sql")]
pub use sql::SqlKeyStore;
