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

//! `POST /ticket` and `POST /group_key` — the two ticket-issuing endpoints.
//!
//! Both take the same wire shape: a base64 JSON `metadata` blob and a
//! base64 `signature` over the *undecoded* metadata string (spec §4.4.1
//! step 4). The signature is verified inside `kds-core`, not here — this
//! module only base64-decodes it before handing it over.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use kds_core::KdsError;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TicketRequest {
    metadata: String,
    signature: String,
}

#[derive(Debug, Serialize)]
pub struct TicketResponseBody {
    metadata: String,
    ticket: String,
    signature: String,
}

#[derive(Debug, Serialize)]
pub struct GroupKeyResponseBody {
    metadata: String,
    group_key: String,
    signature: String,
}

fn decode_signature(raw: &str) -> Result<Vec<u8>, ApiError> {
    BASE64
        .decode(raw.as_bytes())
        .map_err(|_| ApiError(KdsError::IncorrectType { attribute: "signature".to_string(), expected: "Base64".to_string() }))
}

pub async fn get_ticket(State(state): State<Arc<AppState>>, Json(body): Json<TicketRequest>) -> Result<Json<TicketResponseBody>, ApiError> {
    let signature = decode_signature(&body.signature)?;
    let response = state.ticket_engine.get_ticket(&body.metadata, &signature, Utc::now())?;
    Ok(Json(TicketResponseBody { metadata: response.metadata, ticket: response.ticket, signature: response.signature }))
}

pub async fn get_group_key(State(state): State<Arc<AppState>>, Json(body): Json<TicketRequest>) -> Result<Json<GroupKeyResponseBody>, ApiError> {
    let signature = decode_signature(&body.signature)?;
    let response = state.ticket_engine.get_group_key(&body.metadata, &signature, Utc::now())?;
    Ok(Json(GroupKeyResponseBody { metadata: response.metadata, group_key: response.group_key, signature: response.signature }))
}
