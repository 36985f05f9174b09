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

//! The public service surface: request validation and the two ticketing
//! operations, `get_ticket` and `get_group_key`.
//!
//! The engine holds no mutable state of its own (spec "Ownership" — it
//! composes a `StorageCodec`, a `KeyStore`, and a `GroupKeyGenerator`). Every
//! method takes `&self` and is safe to call concurrently from any number of
//! request handlers.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use kds_primitives::crypto::{encrypt, generate_keys, hkdf_extract, new_key, sign, verify, Key, KEY_SIZE};
use kds_primitives::storage_codec::StorageCodec;

use crate::error::KdsError;
use crate::group_key::{is_group_member, GroupKeyGenerator};
use crate::key_store::KeyStore;

/// A request's `target` field, parsed per spec: split on the *last* `:`; if
/// the right-hand side parses as an integer this is a group request for
/// that generation, otherwise the whole string names a host. `"foo:bar"`
/// is therefore a host named `"foo:bar"`, not a malformed group request —
/// the generation half only strips off when it actually parses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Host(String),
    Group(String, u64),
}

impl Target {
    pub fn parse(raw: &str) -> Target {
        match raw.rsplit_once(':') {
            Some((name, generation)) => match generation.parse::<u64>() {
                Ok(generation) => Target::Group(name.to_string(), generation),
                Err(_) => Target::Host(raw.to_string()),
            },
            None => Target::Host(raw.to_string()),
        }
    }
}

/// A validated, still-ephemeral request envelope. Never persisted.
#[derive(Debug, Clone)]
pub struct RequestMetadata {
    pub requestor: String,
    pub target: String,
    pub timestamp: DateTime<Utc>,
    pub nonce: String,
}

/// Mirrors the wire schema at the HTTP boundary but without a `signature`
/// field — the caller deserializes the raw request and hands this crate the
/// b64 blob and signature separately, since the signature is computed over
/// the *undecoded* base64 string (spec §4.4.1 step 4).
#[derive(Debug, Deserialize)]
struct RawMetadata {
    #[serde(default)]
    requestor: Option<String>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    nonce: Option<String>,
}

/// The response envelope shared by `get_ticket` and `get_group_key`'s
/// `metadata`/`signature` fields.
#[derive(Debug, Serialize, Deserialize)]
struct ResponseMetadata {
    source: String,
    destination: String,
    expiration: DateTime<Utc>,
    encryption: bool,
}

/// Plaintext ticket payload before it's encrypted to the requestor. Field
/// names are wire-protocol identifiers (spec §6.1), kept literal via
/// `serde(rename)` even though the Rust-side names are more descriptive.
#[derive(Debug, Serialize, Deserialize)]
struct TicketPayload {
    #[serde(rename = "skey")]
    signing_key: String,
    #[serde(rename = "ekey")]
    encryption_key: String,
    esek: String,
}

/// Plaintext "esek" payload before it's encrypted to the target.
#[derive(Debug, Serialize, Deserialize)]
struct EsekPayload {
    key: String,
    timestamp: DateTime<Utc>,
    ttl: i64,
}

/// Response of `get_ticket`: all three fields base64.
#[derive(Debug, Clone, Serialize)]
pub struct TicketResponse {
    pub metadata: String,
    pub ticket: String,
    pub signature: String,
}

/// Response of `get_group_key`: all three fields base64.
#[derive(Debug, Clone, Serialize)]
pub struct GroupKeyResponse {
    pub metadata: String,
    pub group_key: String,
    pub signature: String,
}

/// Tunables governing request freshness and host-ticket lifetime.
#[derive(Debug, Clone, Copy)]
pub struct TicketConfig {
    /// Maximum age of a request timestamp, and the default lifetime of an
    /// issued host ticket.
    pub ttl: Duration,
    /// Maximum allowed clock skew for a timestamp claiming to be in the
    /// future (spec §4.4.1 step 5's "recommended ≤30s").
    pub skew: Duration,
}

pub struct TicketEngine {
    codec: StorageCodec,
    store: Arc<dyn KeyStore>,
    group_keys: Arc<dyn GroupKeyGenerator>,
    config: TicketConfig,
}

impl TicketEngine {
    pub fn new(
        codec: StorageCodec,
        store: Arc<dyn KeyStore>,
        group_keys: Arc<dyn GroupKeyGenerator>,
        config: TicketConfig,
    ) -> Self {
        TicketEngine { codec, store, group_keys, config }
    }

    /// Host-to-host or group ticket issuance (spec §4.4.2/§4.4.3).
    pub fn get_ticket(&self, b64_metadata: &str, signature: &[u8], now: DateTime<Utc>) -> Result<TicketResponse, KdsError> {
        let (metadata, rk) = self.parse_metadata(b64_metadata, signature, now)?;

        let (tk, target, ttl) = match Target::parse(&metadata.target) {
            Target::Host(host) => {
                let tk = self.lookup_principal_key(&host, now, "Invalid Target")?;
                (tk, host, self.config.ttl)
            }
            Target::Group(group, generation) => {
                let resolved = self.group_keys.resolve(&group, Some(generation), now)?;
                let remaining = resolved
                    .expiration
                    .map(|exp| exp.signed_duration_since(now))
                    .unwrap_or(self.config.ttl);
                let ttl = self.config.ttl.min(remaining.max(Duration::zero()));
                let target = format!("{group}:{}", resolved.generation);
                (resolved.key, target, ttl)
            }
        };

        self.seal_ticket(&metadata.requestor, &target, &rk, &tk, now, ttl)
    }

    /// Group-member self-service retrieval of the current group key
    /// (spec §4.4.4), distinct from ticket issuance.
    pub fn get_group_key(&self, b64_metadata: &str, signature: &[u8], now: DateTime<Utc>) -> Result<GroupKeyResponse, KdsError> {
        let (metadata, rk) = self.parse_metadata(b64_metadata, signature, now)?;

        let (group, requested_generation) = match Target::parse(&metadata.target) {
            Target::Host(name) => (name, None),
            Target::Group(name, generation) => (name, Some(generation)),
        };

        if !is_group_member(&metadata.requestor, &group) {
            return Err(KdsError::forbidden(format!("{} is not a member of {group}", metadata.requestor)));
        }

        let resolved = self.group_keys.resolve(&group, requested_generation, now)?;

        let ciphertext = encrypt(&rk, resolved.key.as_bytes())?;
        let destination = format!("{group}:{}", resolved.generation);
        let expiration = resolved.expiration.unwrap_or(now + self.config.ttl);

        let resp_metadata_b64 = self.encode_response_metadata(&metadata.requestor, &destination, expiration)?;
        let signature = self.sign_response(&rk, &resp_metadata_b64, &ciphertext)?;

        Ok(GroupKeyResponse {
            metadata: resp_metadata_b64,
            group_key: BASE64.encode(&ciphertext),
            signature: BASE64.encode(&signature),
        })
    }

    /// Steps 3-5 of spec §4.4.1: look up the requestor's key, verify the
    /// request signature, and check timestamp freshness. Returns the parsed
    /// metadata and the requestor's raw principal key (`RK`) — the actual
    /// shared secret registered via `PUT /key/{name}`, not the at-rest
    /// storage-encryption key `StorageCodec` derives for it.
    fn parse_metadata(&self, b64_metadata: &str, signature: &[u8], now: DateTime<Utc>) -> Result<(RequestMetadata, Key), KdsError> {
        let decoded = BASE64.decode(b64_metadata.as_bytes()).map_err(|_| incorrect_metadata())?;
        let raw: RawMetadata = serde_json::from_slice(&decoded).map_err(|_| incorrect_metadata())?;

        let requestor = non_empty(raw.requestor, "requestor")?;
        let target = non_empty(raw.target, "target")?;
        let timestamp_str = non_empty(raw.timestamp, "timestamp")?;
        let nonce = non_empty(raw.nonce, "nonce")?;

        let rk = self.lookup_principal_key(&requestor, now, "Invalid Requestor")?;

        verify(&rk, b64_metadata.as_bytes(), signature).map_err(|_| KdsError::unauthorized("Invalid Request"))?;

        let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| KdsError::validation("timestamp", "metadata"))?;

        if timestamp.signed_duration_since(now) > self.config.skew {
            return Err(KdsError::unauthorized("expired"));
        }
        if now.signed_duration_since(timestamp) > self.config.ttl {
            return Err(KdsError::unauthorized("expired"));
        }

        Ok((RequestMetadata { requestor, target, timestamp, nonce }, rk))
    }

    /// Look up and decrypt a non-group principal's raw key, mapping absence
    /// to `Unauthorized(not_found_reason)` rather than `NotFound` — per
    /// spec §7, a missing principal during auth is an authorization
    /// failure, not a resource lookup failure.
    fn lookup_principal_key(&self, name: &str, now: DateTime<Utc>, not_found_reason: &str) -> Result<Key, KdsError> {
        let record = self
            .store
            .get_key(name, None, Some(false), now)?
            .ok_or_else(|| KdsError::unauthorized(not_found_reason))?;
        let plaintext = self.codec.decrypt_key(name, &record.ciphertext, &record.mac)?;
        Ok(Key::from_slice(&plaintext)?)
    }

    /// Steps 2-8 of spec §4.4.2, shared by host and group tickets.
    fn seal_ticket(&self, requestor: &str, target: &str, rk: &Key, tk: &Key, now: DateTime<Utc>, ttl: Duration) -> Result<TicketResponse, KdsError> {
        let salt = new_key()?;
        let prk = hkdf_extract(salt.as_bytes(), rk.as_bytes());
        let info = format!("{requestor},{target},{}", now.to_rfc3339());
        let (skey, ekey) = generate_keys(&prk, info.as_bytes(), KEY_SIZE)?;

        let esek_plain = EsekPayload {
            key: BASE64.encode(prk.as_bytes()),
            timestamp: now,
            ttl: ttl.num_seconds(),
        };
        let esek_json = serde_json::to_vec(&esek_plain).map_err(encode_failure)?;
        let esek = encrypt(tk, &esek_json)?;

        let ticket_plain = TicketPayload {
            signing_key: BASE64.encode(skey.as_bytes()),
            encryption_key: BASE64.encode(ekey.as_bytes()),
            esek: BASE64.encode(&esek),
        };
        let ticket_json = serde_json::to_vec(&ticket_plain).map_err(encode_failure)?;
        let ticket = encrypt(rk, &ticket_json)?;

        let expiration = now + ttl;
        let resp_metadata_b64 = self.encode_response_metadata(requestor, target, expiration)?;
        let signature = self.sign_response(rk, &resp_metadata_b64, &ticket)?;

        Ok(TicketResponse {
            metadata: resp_metadata_b64,
            ticket: BASE64.encode(&ticket),
            signature: BASE64.encode(&signature),
        })
    }

    fn encode_response_metadata(&self, source: &str, destination: &str, expiration: DateTime<Utc>) -> Result<String, KdsError> {
        let resp_metadata = ResponseMetadata {
            source: source.to_string(),
            destination: destination.to_string(),
            expiration,
            encryption: true,
        };
        let json = serde_json::to_vec(&resp_metadata).map_err(encode_failure)?;
        Ok(BASE64.encode(&json))
    }

    /// Sign `resp_metadata_b64 || body` (spec §4.4.2 step 7: `resp_sig =
    /// sign(RK, resp_metadata || ticket)`).
    fn sign_response(&self, rk: &Key, resp_metadata_b64: &str, body: &[u8]) -> Result<Vec<u8>, KdsError> {
        let mut signed = Vec::with_capacity(resp_metadata_b64.len() + body.len());
        signed.extend_from_slice(resp_metadata_b64.as_bytes());
        signed.extend_from_slice(body);
        Ok(sign(rk, &signed)?)
    }
}

fn incorrect_metadata() -> KdsError {
    KdsError::IncorrectType { attribute: "metadata".to_string(), expected: "Base64-JSON".to_string() }
}

fn non_empty(value: Option<String>, attribute: &str) -> Result<String, KdsError> {
    match value {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(KdsError::validation(attribute, "metadata")),
    }
}

fn encode_failure(e: serde_json::Error) -> KdsError {
    KdsError::unexpected(format!("failed to encode ticket payload: {e}"))
}
