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

//! Shared, read-only application state handed to every route via
//! `axum::extract::State`. Construction (wiring the master key, codec,
//! key-store backend, and ticket engine together) lives in `main.rs`; this
//! module only names the bundle.

use std::sync::Arc;

use kds_core::{KeyStore, TicketEngine};
use kds_primitives::storage_codec::StorageCodec;

use crate::config::Config;

pub struct AppState {
    pub ticket_engine: TicketEngine,
    pub store: Arc<dyn KeyStore>,
    pub codec: StorageCodec,
    pub config: Config,
}
