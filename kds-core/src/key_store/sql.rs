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

//! `rusqlite`-backed `KeyStore`, mirroring the `(principals, keys)`
//! two-table layout. Synchronous by construction, so it implements the
//! `KeyStore` trait directly without threading an async runtime through a
//! blocking interface.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{KeyStore, StoredKey};
use crate::error::KdsError;

pub struct SqlKeyStore {
    conn: Mutex<Connection>,
    additional_retrieve: Duration,
}

impl SqlKeyStore {
    pub fn open_in_memory(additional_retrieve: Duration) -> Result<Self, KdsError> {
        let conn = Connection::open_in_memory().map_err(sql_err)?;
        Self::migrate(&conn)?;
        Ok(SqlKeyStore { conn: Mutex::new(conn), additional_retrieve })
    }

    pub fn open(path: &Path, additional_retrieve: Duration) -> Result<Self, KdsError> {
        let conn = Connection::open(path).map_err(sql_err)?;
        Self::migrate(&conn)?;
        Ok(SqlKeyStore { conn: Mutex::new(conn), additional_retrieve })
    }

    fn migrate(conn: &Connection) -> Result<(), KdsError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS principals (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                is_group INTEGER NOT NULL,
                latest_generation INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS keys (
                principal_id INTEGER NOT NULL REFERENCES principals(id),
                generation INTEGER NOT NULL,
                ciphertext BLOB NOT NULL,
                mac BLOB NOT NULL,
                expiration TEXT,
                PRIMARY KEY (principal_id, generation)
            );",
        )
        .map_err(sql_err)
    }
}

fn sql_err(e: rusqlite::Error) -> KdsError {
    KdsError::unexpected(format!("sqlite error: {e}"))
}

impl KeyStore for SqlKeyStore {
    fn set_key(
        &self,
        name: &str,
        ciphertext: &[u8],
        mac: &[u8],
        is_group: bool,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<u64, KdsError> {
        let mut conn = self.conn.lock().expect("sqlite connection mutex poisoned");
        let tx = conn.transaction().map_err(sql_err)?;

        let existing: Option<(i64, bool, i64)> = tx
            .query_row(
                "SELECT id, is_group, latest_generation FROM principals WHERE name = ?1",
                params![name],
                |row| Ok((row.get(0)?, row.get::<_, i64>(1)? != 0, row.get(2)?)),
            )
            .optional()
            .map_err(sql_err)?;

        let (principal_id, next_generation) = match existing {
            Some((id, existing_is_group, latest)) => {
                if existing_is_group != is_group {
                    return Err(KdsError::validation("is_group", name));
                }
                (id, latest + 1)
            }
            None => {
                tx.execute(
                    "INSERT INTO principals (name, is_group, latest_generation) VALUES (?1, ?2, 0)",
                    params![name, is_group as i64],
                )
                .map_err(sql_err)?;
                (tx.last_insert_rowid(), 1)
            }
        };

        tx.execute(
            "UPDATE principals SET latest_generation = ?1 WHERE id = ?2",
            params![next_generation, principal_id],
        )
        .map_err(sql_err)?;

        tx.execute(
            "INSERT INTO keys (principal_id, generation, ciphertext, mac, expiration) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                principal_id,
                next_generation,
                ciphertext,
                mac,
                expiration.map(|e| e.to_rfc3339())
            ],
        )
        .map_err(sql_err)?;

        tx.commit().map_err(sql_err)?;
        Ok(next_generation as u64)
    }

    fn get_key(
        &self,
        name: &str,
        generation: Option<u64>,
        is_group_filter: Option<bool>,
        now: DateTime<Utc>,
    ) -> Result<Option<StoredKey>, KdsError> {
        let conn = self.conn.lock().expect("sqlite connection mutex poisoned");

        let principal: Option<(i64, bool, i64)> = conn
            .query_row(
                "SELECT id, is_group, latest_generation FROM principals WHERE name = ?1",
                params![name],
                |row| Ok((row.get(0)?, row.get::<_, i64>(1)? != 0, row.get(2)?)),
            )
            .optional()
            .map_err(sql_err)?;

        let Some((principal_id, is_group, latest_generation)) = principal else {
            return Ok(None);
        };

        if let Some(expected) = is_group_filter {
            if is_group != expected {
                return Ok(None);
            }
        }

        let target_generation = generation.unwrap_or(latest_generation as u64);
        if target_generation == 0 {
            return Ok(None);
        }

        let row: Option<(Vec<u8>, Vec<u8>, Option<String>)> = conn
            .query_row(
                "SELECT ciphertext, mac, expiration FROM keys WHERE principal_id = ?1 AND generation = ?2",
                params![principal_id, target_generation as i64],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(sql_err)?;

        let Some((ciphertext, mac, expiration_str)) = row else {
            return Ok(None);
        };

        let expiration = expiration_str
            .map(|s| {
                DateTime::parse_from_rfc3339(&s).map(|dt| dt.with_timezone(&Utc))
            })
            .transpose()
            .map_err(|e| KdsError::unexpected(format!("corrupt expiration timestamp: {e}")))?;

        if let Some(exp) = expiration {
            if now - exp > self.additional_retrieve {
                return Ok(None);
            }
        }

        Ok(Some(StoredKey {
            name: name.to_string(),
            generation: target_generation,
            ciphertext,
            mac,
            is_group,
            expiration,
        }))
    }

    fn create_group(&self, name: &str) -> Result<bool, KdsError> {
        let conn = self.conn.lock().expect("sqlite connection mutex poisoned");
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM principals WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .map_err(sql_err)?;

        if existing.is_some() {
            return Ok(false);
        }

        conn.execute(
            "INSERT INTO principals (name, is_group, latest_generation) VALUES (?1, 1, 0)",
            params![name],
        )
        .map_err(sql_err)?;

        Ok(true)
    }

    fn delete(&self, name: &str, is_group: Option<bool>) -> Result<bool, KdsError> {
        let conn = self.conn.lock().expect("sqlite connection mutex poisoned");
        let existing: Option<(i64, bool)> = conn
            .query_row(
                "SELECT id, is_group FROM principals WHERE name = ?1",
                params![name],
                |row| Ok((row.get(0)?, row.get::<_, i64>(1)? != 0)),
            )
            .optional()
            .map_err(sql_err)?;

        let Some((id, existing_is_group)) = existing else {
            return Ok(false);
        };

        if let Some(expected) = is_group {
            if existing_is_group != expected {
                return Ok(false);
            }
        }

        conn.execute("DELETE FROM keys WHERE principal_id = ?1", params![id])
            .map_err(sql_err)?;
        conn.execute("DELETE FROM principals WHERE id = ?1", params![id])
            .map_err(sql_err)?;

        Ok(true)
    }

    fn group_exists(&self, name: &str) -> Result<bool, KdsError> {
        let conn = self.conn.lock().expect("sqlite connection mutex poisoned");
        let is_group: Option<bool> = conn
            .query_row(
                "SELECT is_group FROM principals WHERE name = ?1",
                params![name],
                |row| Ok(row.get::<_, i64>(0)? != 0),
            )
            .optional()
            .map_err(sql_err)?;
        Ok(is_group.unwrap_or(false))
    }
}
