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

//! End-to-end coverage of the five HTTP endpoints, driven in-process via
//! `Router::oneshot` — no real socket, matching the way the pack's axum
//! services exercise their own routers in tests.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{Duration, Utc};
use kds_core::group_key::{GroupKeyPolicy, StandardGroupKeyGenerator};
use kds_core::key_store::InMemoryKeyStore;
use kds_core::{KeyStore, TicketConfig, TicketEngine};
use kds_primitives::crypto::sign;
use kds_primitives::master_key::MasterKey;
use kds_primitives::storage_codec::StorageCodec;
use kds_service::config::{Backend, Config, GroupKeyConfig};
use kds_service::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_app() -> (axum::Router, Arc<dyn KeyStore>, StorageCodec) {
    let dir = tempfile::tempdir().unwrap();
    let mk = Arc::new(MasterKey::load_or_create(&dir.path().join("kds.mkey")).unwrap());
    std::mem::forget(dir);
    let codec = StorageCodec::new(mk);
    let store: Arc<dyn KeyStore> = Arc::new(InMemoryKeyStore::new(Duration::seconds(600)));
    let policy = GroupKeyPolicy { timeout: Duration::seconds(900), renew_time: Duration::seconds(120) };
    let group_keys = Arc::new(StandardGroupKeyGenerator::new(store.clone(), Arc::new(codec.clone()), policy));
    let ticket_engine = TicketEngine::new(
        codec.clone(),
        store.clone(),
        group_keys,
        TicketConfig { ttl: Duration::seconds(3600), skew: Duration::seconds(30) },
    );

    let config = Config {
        master_key_file: "unused".into(),
        enctype: "AES".to_string(),
        hashtype: "SHA256".to_string(),
        ticket_lifetime: 3600,
        group_key: GroupKeyConfig { timeout: 900, renew_time: 120, additional_retrieve: 600 },
        bind_address: "127.0.0.1:0".to_string(),
        backend: Backend::Memory,
        sql_database_file: None,
    };

    let state = Arc::new(AppState { ticket_engine, store: store.clone(), codec: codec.clone(), config });
    (kds_service::build_router(state), store, codec)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn put_key_request(name: &str, raw_key: &[u8]) -> Request<Body> {
    let body = json!({ "key": BASE64.encode(raw_key) });
    Request::builder()
        .method("PUT")
        .uri(format!("/key/{name}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn ticket_request(path: &str, requestor: &str, target: &str, rk: &kds_primitives::crypto::Key, now: chrono::DateTime<Utc>) -> Request<Body> {
    let metadata = json!({
        "requestor": requestor,
        "target": target,
        "timestamp": now.to_rfc3339(),
        "nonce": "42",
    });
    let metadata_b64 = BASE64.encode(serde_json::to_vec(&metadata).unwrap());
    let signature = sign(rk, metadata_b64.as_bytes()).unwrap();
    let body = json!({ "metadata": metadata_b64, "signature": BASE64.encode(&signature) });
    Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn put_key_then_reuse_in_ticket_request() {
    let (app, _store, _codec) = test_app();

    let rk_raw = kds_primitives::crypto::new_key().unwrap();
    let response = app.clone().oneshot(put_key_request("home.local", rk_raw.as_bytes())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["generation"], 1);

    let tk_raw = kds_primitives::crypto::new_key().unwrap();
    let response = app.clone().oneshot(put_key_request("tests.openstack.remote", tk_raw.as_bytes())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let now: chrono::DateTime<Utc> = "2014-01-01T00:00:00Z".parse().unwrap();
    let request = ticket_request("/ticket", "home.local", "tests.openstack.remote", &rk_raw, now);
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["ticket"].is_string());
    assert!(body["signature"].is_string());
}

#[tokio::test]
async fn ticket_request_for_unknown_requestor_is_unauthorized() {
    let (app, _store, _codec) = test_app();
    let rk_raw = kds_primitives::crypto::new_key().unwrap();
    let now: chrono::DateTime<Utc> = "2014-01-01T00:00:00Z".parse().unwrap();
    let request = ticket_request("/ticket", "home.local", "tests.openstack.remote", &rk_raw, now);
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn group_lifecycle_create_and_delete() {
    let (app, _store, _codec) = test_app();

    let response = app
        .clone()
        .oneshot(Request::builder().method("PUT").uri("/group/scheduler").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(Request::builder().method("PUT").uri("/group/scheduler").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(Request::builder().method("DELETE").uri("/group/scheduler").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::builder().method("DELETE").uri("/group/scheduler").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn group_key_round_trip_for_member() {
    let (app, store, _codec) = test_app();

    let rk_raw = kds_primitives::crypto::new_key().unwrap();
    let response = app.clone().oneshot(put_key_request("scheduler.openstack.local", rk_raw.as_bytes())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    store.create_group("scheduler").unwrap();

    let now: chrono::DateTime<Utc> = "2014-01-01T00:00:00Z".parse().unwrap();
    let request = ticket_request("/group_key", "scheduler.openstack.local", "scheduler", &rk_raw, now);
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let request = ticket_request("/group_key", "scheduler.openstack.local", "scheduler", &rk_raw, now);
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["group_key"].is_string());
}

#[tokio::test]
async fn group_key_fetch_by_non_member_is_forbidden() {
    let (app, store, _codec) = test_app();

    let rk_raw = kds_primitives::crypto::new_key().unwrap();
    app.clone().oneshot(put_key_request("foo.local", rk_raw.as_bytes())).await.unwrap();
    store.create_group("bar").unwrap();

    let now: chrono::DateTime<Utc> = "2014-01-01T00:00:00Z".parse().unwrap();
    let request = ticket_request("/group_key", "foo.local", "bar", &rk_raw, now);
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
