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

//! Layered configuration: a TOML file overridden by `KDS_`-prefixed
//! environment variables, mirroring the shape the pack's `rofl-appd`
//! assembles its own `Figment` from.

use std::path::PathBuf;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Group-key resolution tunables (spec §6.2 `group_key.*`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GroupKeyConfig {
    pub timeout: u64,
    pub renew_time: u64,
    pub additional_retrieve: u64,
}

impl Default for GroupKeyConfig {
    fn default() -> Self {
        GroupKeyConfig { timeout: 900, renew_time: 120, additional_retrieve: 600 }
    }
}

/// Which `KeyStore` backend to construct. `Sql` is only buildable with the
/// `sql` feature; selecting it without the feature is a start-up error
/// rather than a silent fallback to `Memory`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Memory,
    Sql,
}

impl Default for Backend {
    fn default() -> Self {
        Backend::Memory
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    pub master_key_file: PathBuf,
    pub enctype: String,
    pub hashtype: String,
    pub ticket_lifetime: u64,
    pub group_key: GroupKeyConfig,
    pub bind_address: String,
    pub backend: Backend,
    /// Path to the SQLite database file when `backend = "sql"`. Ignored for
    /// the in-memory backend.
    pub sql_database_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            master_key_file: PathBuf::from("/etc/keystone/kds.mkey"),
            enctype: "AES".to_string(),
            hashtype: "SHA256".to_string(),
            ticket_lifetime: 3600,
            group_key: GroupKeyConfig::default(),
            bind_address: "127.0.0.1:8080".to_string(),
            backend: Backend::Memory,
            sql_database_file: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),
    #[error("unsupported enctype {0}, this service only implements AES")]
    UnsupportedEnctype(String),
    #[error("unsupported hashtype {0}, this service only implements SHA256")]
    UnsupportedHashtype(String),
    #[error("backend = \"sql\" requires the kds-service `sql` feature")]
    SqlFeatureDisabled,
}

impl Config {
    /// Load configuration from `path` (if it exists) layered under
    /// `KDS_`-prefixed environment variables, which always win. Defaults
    /// fill in anything neither source sets. Nested keys use a double
    /// underscore, e.g. `KDS_GROUP_KEY__TIMEOUT=600`.
    pub fn load(path: &std::path::Path) -> Result<Config, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if path.exists() {
            figment = figment.merge(Toml::file(path));
        }
        let config: Config = figment.merge(Env::prefixed("KDS_").split("__")).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.enctype != "AES" {
            return Err(ConfigError::UnsupportedEnctype(self.enctype.clone()));
        }
        if self.hashtype != "SHA256" {
            return Err(ConfigError::UnsupportedHashtype(self.hashtype.clone()));
        }
        if self.backend == Backend::Sql && !cfg!(feature = "sql") {
            return Err(ConfigError::SqlFeatureDisabled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let config = Config::default();
        assert_eq!(config.ticket_lifetime, 3600);
        assert_eq!(config.group_key.timeout, 900);
        assert_eq!(config.group_key.renew_time, 120);
        assert_eq!(config.group_key.additional_retrieve, 600);
        assert_eq!(config.master_key_file, PathBuf::from("/etc/keystone/kds.mkey"));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load(std::path::Path::new("/nonexistent/kds.toml")).unwrap();
        assert_eq!(config.ticket_lifetime, 3600);
    }

    #[test]
    fn rejects_unsupported_enctype() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kds.toml");
        std::fs::write(&path, "enctype = \"ChaCha20\"\n").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::UnsupportedEnctype(_))));
    }
}
