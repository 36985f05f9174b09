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

//! The error taxonomy of the key distribution service.
//!
//! Every fallible operation in this crate returns `KdsError`. Propagation
//! policy (enforced by callers in `kds-service`, not here): cryptographic
//! and storage errors are never reflected back to the client in detail —
//! only `Validation` carries an attribute name to aid client debugging.

use kds_primitives::CryptoError;
use thiserror::Error;

/// Tagged error kinds, mapped to HTTP statuses at the service boundary.
#[derive(Debug, Error)]
pub enum KdsError {
    /// Malformed or missing input field. Maps to HTTP 400.
    #[error("invalid value for {attribute} in {target}")]
    Validation { attribute: String, target: String },

    /// Input was present but not the expected encoding (e.g. metadata that
    /// doesn't base64-decode to JSON). Also maps to HTTP 400.
    #[error("{attribute} must be {expected}")]
    IncorrectType { attribute: String, expected: String },

    /// Signature mismatch, expired timestamp, or missing principal key.
    /// Maps to HTTP 401.
    #[error("unauthorized: {reason}")]
    Unauthorized { reason: String },

    /// Group-membership failure on `get_group_key` (spec §4.4.4 step 2).
    /// Maps to HTTP 403, distinct from the 401s above.
    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    /// Specific generation unknown, or group/principal absent. Maps to
    /// HTTP 404.
    #[error("not found: {name}{}", generation.map(|g| format!(" generation {g}")).unwrap_or_default())]
    NotFound { name: String, generation: Option<u64> },

    /// Generation allocation races exhausted their retry budget. Maps to
    /// HTTP 409.
    #[error("conflict allocating a new generation for {name}")]
    Conflict { name: String },

    /// Decrypt/MAC verification failure during a storage read. Maps to
    /// HTTP 500; masked to the client, logged in full.
    #[error("cryptographic failure")]
    Crypto(#[from] CryptoError),

    /// Invariant violation, missing master key at runtime, storage
    /// corruption. Maps to HTTP 500.
    #[error("unexpected error: {reason}")]
    Unexpected { reason: String },
}

impl KdsError {
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        KdsError::Unauthorized { reason: reason.into() }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        KdsError::Forbidden { reason: reason.into() }
    }

    pub fn unexpected(reason: impl Into<String>) -> Self {
        KdsError::Unexpected { reason: reason.into() }
    }

    pub fn validation(attribute: impl Into<String>, target: impl Into<String>) -> Self {
        KdsError::Validation {
            attribute: attribute.into(),
            target: target.into(),
        }
    }

    pub fn not_found(name: impl Into<String>, generation: Option<u64>) -> Self {
        KdsError::NotFound {
            name: name.into(),
            generation,
        }
    }
}
