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

//! `PUT /key/{name}` — register or rotate a principal's raw key.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use kds_core::KdsError;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SetKeyRequest {
    /// Base64-encoded raw key bytes, shared out of band with the principal.
    key: String,
}

#[derive(Debug, Serialize)]
pub struct SetKeyResponse {
    name: String,
    generation: u64,
}

pub async fn set_key(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(body): Json<SetKeyRequest>,
) -> Result<Json<SetKeyResponse>, ApiError> {
    let raw = BASE64
        .decode(body.key.as_bytes())
        .map_err(|_| ApiError(KdsError::IncorrectType { attribute: "key".to_string(), expected: "Base64".to_string() }))?;

    let (ciphertext, mac) = state.codec.encrypt_key(&name, &raw).map_err(KdsError::from)?;
    let generation = state.store.set_key(&name, &ciphertext, &mac, false, None)?;

    Ok(Json(SetKeyResponse { name, generation }))
}
