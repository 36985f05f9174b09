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

//! Bootstrap, persist, and hold the single long-lived master key (`MK`)
//! that wraps every other secret at rest.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{new_key, CryptoError, Key, KEY_SIZE};

/// Fatal start-up error. The operator must intervene; the service must not
/// start in any of these cases.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read master key file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write master key file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("master key file {path} contains invalid base64")]
    Encoding { path: PathBuf },
    #[error("master key file {path} has length {actual}, expected {expected}")]
    WrongLength {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// The process-wide master key. Held only in memory; there is no rotation
/// operation. Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterKey(Key);

impl MasterKey {
    /// Load `MK` from `path`, creating it if absent.
    ///
    /// On absence, a fresh key is generated and the file is created
    /// *exclusively* (`O_CREAT|O_EXCL` equivalent) with mode `0600`. If the
    /// write fails partway through, the partial file is removed on a
    /// best-effort basis before the error is propagated.
    pub fn load_or_create(path: &Path) -> Result<Self, StartupError> {
        match Self::load(path) {
            Ok(key) => Ok(MasterKey(key)),
            Err(StartupError::Read { source, .. }) if source.kind() == ErrorKind::NotFound => {
                Ok(MasterKey(Self::create(path)?))
            }
            Err(other) => Err(other),
        }
    }

    fn load(path: &Path) -> Result<Key, StartupError> {
        let mut contents = String::new();
        std::fs::File::open(path)
            .and_then(|mut f| f.read_to_string(&mut contents))
            .map_err(|source| StartupError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let decoded = BASE64
            .decode(contents.trim())
            .map_err(|_| StartupError::Encoding {
                path: path.to_path_buf(),
            })?;

        if decoded.len() != KEY_SIZE {
            return Err(StartupError::WrongLength {
                path: path.to_path_buf(),
                expected: KEY_SIZE,
                actual: decoded.len(),
            });
        }

        Key::from_slice(&decoded).map_err(StartupError::from)
    }

    fn create(path: &Path) -> Result<Key, StartupError> {
        let key = new_key()?;
        let encoded = BASE64.encode(key.as_bytes());

        let result = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                f.write_all(encoded.as_bytes())?;
                f.sync_all()
            });

        if let Err(source) = result {
            let _ = std::fs::remove_file(path);
            return Err(StartupError::Write {
                path: path.to_path_buf(),
                source,
            });
        }

        Ok(key)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        self.0.as_bytes()
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(..)")
    }
}
