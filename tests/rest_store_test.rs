//! RestPaymentStore against an in-process PostgREST stand-in

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use payhook::reconcile::{
    NewPaymentRecord, PaymentStatus, PaymentStore, RestPaymentStore, UpsertOutcome,
};
use payhook::PayhookError;
use serde_json::{Value, json};
use tokio::net::TcpListener;

const API_KEY: &str = "service-role-key";

#[derive(Clone, Default)]
struct FakeDb {
    rows: Arc<Mutex<HashMap<String, Value>>>,
    prefer_headers: Arc<Mutex<Vec<String>>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    let apikey = headers.get("apikey").and_then(|v| v.to_str().ok());
    let bearer = headers.get("authorization").and_then(|v| v.to_str().ok());
    apikey == Some(API_KEY) && bearer == Some(format!("Bearer {}", API_KEY).as_str())
}

async fn insert(
    State(db): State<FakeDb>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(mut row): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "bad key"}))).into_response();
    }
    if params.get("on_conflict").map(String::as_str) != Some("external_id") {
        return (StatusCode::CONFLICT, Json(json!({"message": "duplicate key"}))).into_response();
    }
    if let Some(prefer) = headers.get("prefer").and_then(|v| v.to_str().ok()) {
        db.prefer_headers.lock().unwrap().push(prefer.to_string());
    }

    let Some(id) = row["external_id"].as_str().map(String::from) else {
        return (StatusCode::BAD_REQUEST, Json(json!({"message": "no id"}))).into_response();
    };

    let mut rows = db.rows.lock().unwrap();
    if rows.contains_key(&id) {
        return (StatusCode::CREATED, Json(json!([]))).into_response();
    }
    row["created_at"] = json!("2024-03-01T12:00:00+00:00");
    rows.insert(id, row.clone());
    (StatusCode::CREATED, Json(json!([row]))).into_response()
}

async fn select(
    State(db): State<FakeDb>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let id = params
        .get("external_id")
        .and_then(|f| f.strip_prefix("eq."))
        .unwrap_or_default();
    let rows: Vec<Value> = db.rows.lock().unwrap().get(id).cloned().into_iter().collect();
    Json(rows).into_response()
}

async fn spawn_fake_db() -> (SocketAddr, FakeDb) {
    let db = FakeDb::default();
    let app = Router::new()
        .route("/rest/v1/payments", post(insert).get(select))
        .route(
            "/rest/v1/unavailable",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
        )
        .route(
            "/rest/v1/slow",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!([]))
            }),
        )
        .with_state(db.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, db)
}

fn record(id: &str) -> NewPaymentRecord {
    NewPaymentRecord {
        external_id: id.to_string(),
        customer_id: Some("cus_1".to_string()),
        customer_email: Some("buyer@example.com".to_string()),
        amount: 1999,
        currency: "usd".to_string(),
        status: PaymentStatus::Completed,
        metadata: BTreeMap::from([("order".to_string(), "42".to_string())]),
    }
}

#[tokio::test]
async fn test_insert_then_duplicate() {
    let (addr, db) = spawn_fake_db().await;
    let store = RestPaymentStore::new(format!("http://{}", addr), API_KEY);

    let outcome = store.upsert_payment_by_external_id(&record("sess_abc")).await.unwrap();
    match outcome {
        UpsertOutcome::Inserted(row) => {
            assert_eq!(row.external_id, "sess_abc");
            assert_eq!(row.amount, 1999);
            assert_eq!(row.metadata.get("order").map(String::as_str), Some("42"));
        }
        UpsertOutcome::DuplicateNoop => panic!("first insert reported duplicate"),
    }

    let outcome = store.upsert_payment_by_external_id(&record("sess_abc")).await.unwrap();
    assert!(outcome.is_duplicate());
    assert_eq!(db.rows.lock().unwrap().len(), 1);

    let prefer = db.prefer_headers.lock().unwrap().clone();
    assert!(prefer.iter().all(|p| p.contains("resolution=ignore-duplicates")));
    assert!(prefer.iter().all(|p| p.contains("return=representation")));
}

#[tokio::test]
async fn test_get_by_external_id() {
    let (addr, _db) = spawn_fake_db().await;
    let store = RestPaymentStore::new(format!("http://{}/", addr), API_KEY);

    assert!(store.get_payment_by_external_id("sess_missing").await.unwrap().is_none());

    store.upsert_payment_by_external_id(&record("sess_get")).await.unwrap();
    let row = store
        .get_payment_by_external_id("sess_get")
        .await
        .unwrap()
        .expect("row stored");
    assert_eq!(row.status, PaymentStatus::Completed);
    assert_eq!(row.customer_email.as_deref(), Some("buyer@example.com"));
}

#[tokio::test]
async fn test_wrong_key_is_an_error() {
    let (addr, _db) = spawn_fake_db().await;
    let store = RestPaymentStore::new(format!("http://{}", addr), "anon-key");

    let err = store
        .upsert_payment_by_external_id(&record("sess_denied"))
        .await
        .unwrap_err();
    assert!(matches!(err, PayhookError::Internal(ref msg) if msg.contains("401")));
}

#[tokio::test]
async fn test_unavailable_backend() {
    let (addr, _db) = spawn_fake_db().await;
    let store = RestPaymentStore::new(format!("http://{}", addr), API_KEY).with_table("unavailable");

    let err = store
        .upsert_payment_by_external_id(&record("sess_down"))
        .await
        .unwrap_err();
    assert!(matches!(err, PayhookError::ServiceUnavailable(ref msg) if msg.contains("maintenance")));
}

#[tokio::test]
async fn test_client_timeout() {
    let (addr, _db) = spawn_fake_db().await;
    let store = RestPaymentStore::new(format!("http://{}", addr), API_KEY)
        .with_table("slow")
        .with_timeout(Duration::from_millis(100));

    let err = store
        .upsert_payment_by_external_id(&record("sess_slow"))
        .await
        .unwrap_err();
    assert!(matches!(err, PayhookError::RequestTimeout));
}

#[tokio::test]
async fn test_unreachable_backend() {
    // Bind then drop to get a port nothing listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let store = RestPaymentStore::new(format!("http://{}", addr), API_KEY);
    let err = store
        .upsert_payment_by_external_id(&record("sess_nowhere"))
        .await
        .unwrap_err();
    assert!(matches!(err, PayhookError::ServiceUnavailable(_)));
}
