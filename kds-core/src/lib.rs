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

//! The ticket-issuing core of the key distribution service: request
//! validation, the host/group ticket protocol, the group-key generator,
//! and the `KeyStore` trait its backends implement.
//!
//! This crate has no notion of HTTP, configuration files, or process
//! start-up; `kds-service` wires it to the outside world.

pub mod error;
pub mod group_key;
pub mod key_store;
pub mod ticket_engine;

pub use error::KdsError;
pub use group_key::{GroupKeyGenerator, GroupKeyPolicy, ResolvedGroupKey, StandardGroupKeyGenerator};
pub use key_store::{InMemoryKeyStore, KeyStore, StoredKey};
pub use ticket_engine::{
    GroupKeyResponse, RequestMetadata, Target, TicketConfig, TicketEngine, TicketResponse,
};
