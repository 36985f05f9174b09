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

//! `PUT /group/{name}` and `DELETE /group/{name}` — group lifecycle,
//! administrative endpoints with no ticket material in their bodies.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn create_group(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Result<StatusCode, ApiError> {
    let created = state.store.create_group(&name)?;
    Ok(if created { StatusCode::CREATED } else { StatusCode::OK })
}

pub async fn delete_group(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Result<StatusCode, ApiError> {
    let removed = state.store.delete(&name, Some(true))?;
    Ok(if removed { StatusCode::OK } else { StatusCode::NOT_FOUND })
}
