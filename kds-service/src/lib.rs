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

//! HTTP wiring for the key distribution service: configuration, the error
//! taxonomy's HTTP mapping, and the axum router. Process start-up (loading
//! the master key, choosing a `KeyStore` backend, binding a socket) lives
//! in `main.rs`; this crate root exposes `build_router` so integration
//! tests can drive the whole stack through `Router::oneshot` without a
//! real socket.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::routing::{post, put};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use state::AppState;

/// Assemble the five-endpoint router of spec §6.1 over a constructed
/// `AppState`. Split out from `main` so tests can exercise it in-process.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/key/:name", put(routes::set_key))
        .route("/group/:name", put(routes::create_group).delete(routes::delete_group))
        .route("/ticket", post(routes::get_ticket))
        .route("/group_key", post(routes::get_group_key))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}
