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

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Duration;
use kds_core::group_key::{GroupKeyPolicy, StandardGroupKeyGenerator};
use kds_core::key_store::InMemoryKeyStore;
use kds_core::{KeyStore, TicketConfig, TicketEngine};
use kds_primitives::master_key::MasterKey;
use kds_primitives::storage_codec::StorageCodec;
use kds_service::config::{Backend, Config};
use kds_service::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("/etc/keystone/kds.toml"));
    let config = Config::load(&config_path)?;

    let master_key = Arc::new(MasterKey::load_or_create(&config.master_key_file)?);
    let codec = StorageCodec::new(master_key);

    let additional_retrieve = Duration::seconds(config.group_key.additional_retrieve as i64);
    let store: Arc<dyn KeyStore> = match config.backend {
        Backend::Memory => Arc::new(InMemoryKeyStore::new(additional_retrieve)),
        #[cfg(feature = "sql")]
        Backend::Sql => {
            let path = config.sql_database_file.as_deref().ok_or_else(|| anyhow::anyhow!("backend = \"sql\" requires sql_database_file"))?;
            Arc::new(kds_core::key_store::SqlKeyStore::open(path, additional_retrieve)?)
        }
        #[cfg(not(feature = "sql"))]
        Backend::Sql => unreachable!("Config::validate rejects backend = \"sql\" without the sql feature"),
    };

    let policy = GroupKeyPolicy {
        timeout: Duration::seconds(config.group_key.timeout as i64),
        renew_time: Duration::seconds(config.group_key.renew_time as i64),
    };
    let group_keys = Arc::new(StandardGroupKeyGenerator::new(store.clone(), Arc::new(codec.clone()), policy));

    let ticket_engine = TicketEngine::new(
        codec.clone(),
        store.clone(),
        group_keys,
        TicketConfig { ttl: Duration::seconds(config.ticket_lifetime as i64), skew: Duration::seconds(30) },
    );

    let bind_address = config.bind_address.clone();
    let state = Arc::new(AppState { ticket_engine, store, codec, config });
    let app = kds_service::build_router(state);

    tracing::info!(address = %bind_address, "starting kds-service");
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
