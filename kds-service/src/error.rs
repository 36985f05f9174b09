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

//! Maps the tagged `KdsError` taxonomy (spec §7) onto HTTP statuses and
//! JSON bodies. Validation is the only variant that echoes attribute
//! detail back to the client; everything else gets a generic message,
//! with the real detail going to `tracing::error!`/`tracing::warn!`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kds_core::KdsError;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    attribute: Option<String>,
}

/// Thin wrapper so this crate can impl `IntoResponse` on a type it owns
/// (`KdsError` lives in `kds-core`).
pub struct ApiError(pub KdsError);

impl From<KdsError> for ApiError {
    fn from(err: KdsError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self.0 {
            KdsError::Validation { attribute, target } => {
                tracing::warn!(attribute, target, "validation failure");
                (StatusCode::BAD_REQUEST, ErrorBody { error: self.0.to_string(), attribute: Some(attribute.clone()) })
            }
            KdsError::IncorrectType { attribute, .. } => {
                tracing::warn!(attribute, "malformed request field");
                (StatusCode::BAD_REQUEST, ErrorBody { error: self.0.to_string(), attribute: Some(attribute.clone()) })
            }
            KdsError::Unauthorized { reason } => {
                tracing::warn!(reason, "unauthorized request");
                (StatusCode::UNAUTHORIZED, ErrorBody { error: "unauthorized".to_string(), attribute: None })
            }
            KdsError::Forbidden { reason } => {
                tracing::warn!(reason, "forbidden request");
                (StatusCode::FORBIDDEN, ErrorBody { error: "forbidden".to_string(), attribute: None })
            }
            KdsError::NotFound { name, generation } => {
                tracing::warn!(name, ?generation, "not found");
                (StatusCode::NOT_FOUND, ErrorBody { error: "not found".to_string(), attribute: None })
            }
            KdsError::Conflict { name } => {
                tracing::warn!(name, "generation allocation conflict");
                (StatusCode::CONFLICT, ErrorBody { error: "conflict".to_string(), attribute: None })
            }
            KdsError::Crypto(source) => {
                tracing::error!(error = %source, "cryptographic failure during storage read");
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorBody { error: "internal error".to_string(), attribute: None })
            }
            KdsError::Unexpected { reason } => {
                tracing::error!(reason, "unexpected error");
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorBody { error: "internal error".to_string(), attribute: None })
            }
        };

        (status, Json(body)).into_response()
    }
}
