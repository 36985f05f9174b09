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

//! Symmetric crypto primitives: fresh-key generation, AEAD encrypt/decrypt,
//! a fixed-length MAC, and HKDF-Extract/Expand.
//!
//! All of these operate on raw bytes; base64 happens only at the wire
//! boundary in `kds-service`, to avoid the double-encoding bugs visible in
//! the system this crate replaces.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Nonce};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Fixed key size for every symmetric key in this service: master key,
/// per-principal storage keys, and per-ticket session keys.
pub const KEY_SIZE: usize = 16;

const NONCE_SIZE: usize = 12;

type HmacSha256 = Hmac<Sha256>;

/// Any primitive failure: RNG exhaustion, AEAD auth failure, wrong-length
/// key material, or HKDF output length out of range. Never ignored.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("failed to obtain random bytes from the OS")]
    Rng,
    #[error("encryption failed")]
    Encrypt,
    #[error("decryption failed")]
    Decrypt,
    #[error("signature check failed")]
    SignatureMismatch,
    #[error("key derivation failed")]
    Kdf,
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// A raw `KEY_SIZE`-byte symmetric key. Zeroized on drop so stray copies
/// don't linger in freed memory.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Key([u8; KEY_SIZE]);

impl Key {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidLength {
                expected: KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut buf = [0u8; KEY_SIZE];
        buf.copy_from_slice(bytes);
        Ok(Key(buf))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Key(..)")
    }
}

/// Output of `hkdf_extract`: a pseudo-random key, bound to whatever salt
/// and input keying material produced it.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Prk(Vec<u8>);

impl Prk {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Wrap already-extracted PRK bytes, e.g. ones received over the wire
    /// inside an `esek` envelope, without re-running HKDF-Extract on them.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Prk(bytes)
    }
}

/// A signing key derived for one specific purpose (storage MAC or ticket
/// signing). Wraps `Key` so callers can't accidentally pass a signing key
/// where an encryption key belongs.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SigKey(Key);

/// An encryption key derived for one specific purpose.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncKey(Key);

impl std::ops::Deref for SigKey {
    type Target = Key;
    fn deref(&self) -> &Key {
        &self.0
    }
}

impl std::ops::Deref for EncKey {
    type Target = Key;
    fn deref(&self) -> &Key {
        &self.0
    }
}

/// Generate `KEY_SIZE` bytes of cryptographically strong random data.
pub fn new_key() -> Result<Key, CryptoError> {
    let mut bytes = [0u8; KEY_SIZE];
    OsRng.try_fill_bytes(&mut bytes).map_err(|_| CryptoError::Rng)?;
    Ok(Key(bytes))
}

/// Encrypt `plaintext` under `key`. Output is `nonce || ciphertext||tag`.
pub fn encrypt(key: &Key, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes128Gcm::new_from_slice(&key.0).map_err(|_| CryptoError::InvalidLength {
        expected: KEY_SIZE,
        actual: key.0.len(),
    })?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.try_fill_bytes(&mut nonce_bytes).map_err(|_| CryptoError::Rng)?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::Encrypt)?;

    let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Inverse of `encrypt`. Fails on truncated input or authentication failure.
pub fn decrypt(key: &Key, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() < NONCE_SIZE {
        return Err(CryptoError::Decrypt);
    }
    let (nonce_bytes, body) = ciphertext.split_at(NONCE_SIZE);

    let cipher = Aes128Gcm::new_from_slice(&key.0).map_err(|_| CryptoError::InvalidLength {
        expected: KEY_SIZE,
        actual: key.0.len(),
    })?;
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher.decrypt(nonce, body).map_err(|_| CryptoError::Decrypt)
}

/// Deterministic, fixed-length MAC under HMAC-SHA256.
pub fn sign(key: &Key, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut mac = HmacSha256::new_from_slice(&key.0).map_err(|_| CryptoError::Kdf)?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Verify a MAC produced by `sign` in constant time.
pub fn verify(key: &Key, message: &[u8], tag: &[u8]) -> Result<(), CryptoError> {
    let mut mac = HmacSha256::new_from_slice(&key.0).map_err(|_| CryptoError::Kdf)?;
    mac.update(message);
    mac.verify_slice(tag).map_err(|_| CryptoError::SignatureMismatch)
}

/// HKDF-Extract: bind fresh `salt` and `ikm` into a single PRK.
pub fn hkdf_extract(salt: &[u8], ikm: &[u8]) -> Prk {
    let (prk, _) = Hkdf::<Sha256>::extract(Some(salt), ikm);
    Prk(prk.to_vec())
}

/// HKDF-Expand: stretch `prk` into `length` bytes of output keying
/// material, bound to `info`.
pub fn hkdf_expand(prk: &Prk, info: &[u8], length: usize) -> Result<Vec<u8>, CryptoError> {
    let hk = Hkdf::<Sha256>::from_prk(&prk.0).map_err(|_| CryptoError::Kdf)?;
    let mut okm = vec![0u8; length];
    hk.expand(info, &mut okm).map_err(|_| CryptoError::Kdf)?;
    Ok(okm)
}

/// Split `hkdf_expand(prk, info, 2*key_size)` into a (sig_key, enc_key)
/// pair. Shared by storage-side and ticket-side key derivation; `info`
/// distinguishes the two callers. Order is fixed: the first half is
/// always the MAC key.
pub fn generate_keys(prk: &Prk, info: &[u8], key_size: usize) -> Result<(SigKey, EncKey), CryptoError> {
    let okm = hkdf_expand(prk, info, 2 * key_size)?;
    let sig = Key::from_slice(&okm[..key_size])?;
    let enc = Key::from_slice(&okm[key_size..])?;
    Ok((SigKey(sig), EncKey(enc)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn round_trips() {
        let key = new_key().unwrap();
        let ct = encrypt(&key, b"hello world").unwrap();
        let pt = decrypt(&key, &ct).unwrap();
        assert_eq!(pt, b"hello world");
    }

    #[test]
    fn tamper_detected() {
        let key = new_key().unwrap();
        let mut ct = encrypt(&key, b"hello world").unwrap();
        let last = ct.len() - 1;
        ct[last] ^= 0xff;
        assert!(decrypt(&key, &ct).is_err());
    }

    #[test]
    fn sign_verify() {
        let key = new_key().unwrap();
        let tag = sign(&key, b"message").unwrap();
        assert!(verify(&key, b"message", &tag).is_ok());
        assert!(verify(&key, b"different message", &tag).is_err());
    }

    #[test]
    fn generate_keys_splits_deterministically() {
        let prk = hkdf_extract(b"salt", b"input-key-material");
        let (sig1, enc1) = generate_keys(&prk, b"info", KEY_SIZE).unwrap();
        let (sig2, enc2) = generate_keys(&prk, b"info", KEY_SIZE).unwrap();
        assert_eq!(sig1.as_bytes(), sig2.as_bytes());
        assert_eq!(enc1.as_bytes(), enc2.as_bytes());
        assert_ne!(sig1.as_bytes(), enc1.as_bytes());
    }

    proptest! {
        #[test]
        fn different_info_different_keys(a in "[a-z]{1,16}", b in "[a-z]{1,16}") {
            prop_assume!(a != b);
            let prk = hkdf_extract(b"salt", b"ikm");
            let (sig_a, _) = generate_keys(&prk, a.as_bytes(), KEY_SIZE).unwrap();
            let (sig_b, _) = generate_keys(&prk, b.as_bytes(), KEY_SIZE).unwrap();
            prop_assert_ne!(sig_a.as_bytes(), sig_b.as_bytes());
        }
    }
}
