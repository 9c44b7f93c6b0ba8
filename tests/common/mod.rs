#![allow(dead_code)]

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tunehub::api::AppState;
use tunehub::crypto::CredentialCipher;
use tunehub::database::DatabaseManager;
use tunehub::storage::FsObjectStore;
use tunehub::suno::{PollPolicy, SunoConfig, SunoSessions};

pub const GOOD_COOKIE: &str = "__client=good-cookie";
pub const BAD_COOKIE: &str = "__client=expired";
/// Valid cookie whose session lookup answers after [`SLOW_SESSION_DELAY`].
pub const SLOW_COOKIE: &str = "__client=slow-cookie";
pub const SLOW_SESSION_DELAY: Duration = Duration::from_millis(1500);
pub const JWT: &str = "jwt-token";
pub const WEBHOOK_SECRET: &str = "whsec_integration";

/// Scripted stand-in for the Clerk and studio endpoints.
pub struct MockSuno {
    /// Feed polls before clips report `complete`; `usize::MAX` never completes.
    pub complete_after: AtomicUsize,
    /// Status returned by the generate endpoint.
    pub generate_status: AtomicU16,
    pub feed_calls: AtomicUsize,
    pub token_calls: AtomicUsize,
    pub session_calls: AtomicUsize,
    /// Status polls before lyrics report `complete`; `usize::MAX` never completes.
    pub lyrics_complete_after: AtomicUsize,
    pub lyrics_calls: AtomicUsize,
    pub last_generate: parking_lot::Mutex<Option<Value>>,
}

impl MockSuno {
    pub fn new(complete_after: usize) -> Arc<Self> {
        Arc::new(Self {
            complete_after: AtomicUsize::new(complete_after),
            generate_status: AtomicU16::new(200),
            feed_calls: AtomicUsize::new(0),
            token_calls: AtomicUsize::new(0),
            session_calls: AtomicUsize::new(0),
            lyrics_complete_after: AtomicUsize::new(2),
            lyrics_calls: AtomicUsize::new(0),
            last_generate: parking_lot::Mutex::new(None),
        })
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", JWT))
}

fn clip(id: &str, status: &str) -> Value {
    let audio_url = (status == "complete").then(|| format!("https://cdn.test/{}.mp3", id));
    json!({
        "id": id,
        "title": format!("Song {}", id),
        "status": status,
        "model_name": "chirp-v3-5",
        "audio_url": audio_url,
        "metadata": {
            "prompt": "[Verse]\nhello\n\nworld",
            "gpt_description_prompt": "a calm song",
            "tags": "ambient",
            "type": "gen"
        }
    })
}

async fn clerk_version() -> Json<Value> {
    Json(json!({ "tags": { "latest": "5.34.0" } }))
}

async fn client_session(State(mock): State<Arc<MockSuno>>, headers: HeaderMap) -> Json<Value> {
    mock.session_calls.fetch_add(1, Ordering::SeqCst);
    let cookie = headers
        .get("cookie")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if cookie == SLOW_COOKIE {
        tokio::time::sleep(SLOW_SESSION_DELAY).await;
    }
    if cookie == GOOD_COOKIE || cookie == SLOW_COOKIE {
        Json(json!({ "response": { "last_active_session_id": "sess_1" } }))
    } else {
        Json(json!({ "response": { "last_active_session_id": null } }))
    }
}

async fn session_token(
    State(mock): State<Arc<MockSuno>>,
    Path(sid): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    mock.token_calls.fetch_add(1, Ordering::SeqCst);
    if sid != "sess_1" {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(json!({ "jwt": JWT })))
}

async fn generate(
    State(mock): State<Arc<MockSuno>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    if !authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let status = mock.generate_status.load(Ordering::SeqCst);
    if status != 200 {
        return Err(StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR));
    }
    if body.get("mv").is_none() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let extended = body["continue_clip_id"].as_str().map(str::to_string);
    *mock.last_generate.lock() = Some(body);

    let clips = match extended {
        Some(source) => vec![clip(&format!("{}-ext", source), "submitted")],
        None => vec![clip("clip-a", "submitted"), clip("clip-b", "submitted")],
    };
    Ok(Json(json!({ "id": "batch-1", "clips": clips })))
}

async fn feed(
    State(mock): State<Arc<MockSuno>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Value>, StatusCode> {
    if !authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let calls = mock.feed_calls.fetch_add(1, Ordering::SeqCst) + 1;
    let status = if calls >= mock.complete_after.load(Ordering::SeqCst) {
        "complete"
    } else {
        "queued"
    };
    let clips: Vec<Value> = match query.get("ids") {
        Some(ids) => ids.split(',').map(|id| clip(id, status)).collect(),
        None => vec![clip("feed-1", "complete"), clip("feed-2", "error")],
    };
    Ok(Json(Value::Array(clips)))
}

async fn get_clip(headers: HeaderMap, Path(id): Path<String>) -> Result<Json<Value>, StatusCode> {
    if !authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    if id == "missing" {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(clip(&id, "complete")))
}

async fn request_lyrics(headers: HeaderMap, Json(body): Json<Value>) -> Result<Json<Value>, StatusCode> {
    if !authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    if !body["prompt"].as_str().is_some_and(|p| !p.is_empty()) {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(Json(json!({ "id": "lyrics-1" })))
}

async fn lyrics_status(
    State(mock): State<Arc<MockSuno>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    if !authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    if id != "lyrics-1" {
        return Err(StatusCode::NOT_FOUND);
    }
    let calls = mock.lyrics_calls.fetch_add(1, Ordering::SeqCst) + 1;
    if calls >= mock.lyrics_complete_after.load(Ordering::SeqCst) {
        Ok(Json(json!({
            "title": "Night Drive",
            "text": "[Verse]\nheadlights on the water",
            "status": "complete"
        })))
    } else {
        Ok(Json(json!({ "title": "", "text": "", "status": "running" })))
    }
}

async fn billing_info(headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
    if !authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(Json(json!({
        "total_credits_left": 40,
        "period": "month",
        "monthly_limit": 50,
        "monthly_usage": 10
    })))
}

pub async fn spawn_mock_suno(mock: Arc<MockSuno>) -> SocketAddr {
    let app = Router::new()
        .route("/clerk-version", get(clerk_version))
        .route("/v1/client", get(client_session))
        .route("/v1/client/sessions/{sid}/tokens", post(session_token))
        .route("/api/generate/v2/", post(generate))
        .route("/api/feed/", get(feed))
        .route("/api/billing/info/", get(billing_info))
        .route("/api/clip/{id}", get(get_clip))
        .route("/api/generate/lyrics/", post(request_lyrics))
        .route("/api/generate/lyrics/{id}", get(lyrics_status))
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Client configuration pointed at the mock with millisecond timings.
pub fn suno_config(addr: SocketAddr, timeout: Duration) -> SunoConfig {
    let base = format!("http://{}", addr);
    SunoConfig {
        base_url: base.clone(),
        clerk_base_url: base.clone(),
        clerk_version_url: format!("{}/clerk-version", base),
        request_timeout: Duration::from_secs(5),
        poll: PollPolicy {
            initial_delay: Duration::from_millis(10),
            min_interval: Duration::from_millis(10),
            max_interval: Duration::from_millis(20),
            timeout,
        },
        keep_alive_jitter: (Duration::from_millis(1), Duration::from_millis(2)),
        lyrics_poll_interval: Duration::from_millis(10),
        ..SunoConfig::default()
    }
}

pub fn test_cipher() -> CredentialCipher {
    CredentialCipher::with_cost("integration-secret", 4).unwrap()
}

pub async fn test_state(suno: SunoConfig, media: &std::path::Path) -> AppState {
    let db = DatabaseManager::in_memory().await.unwrap();
    AppState::new(
        db.pool,
        Arc::new(FsObjectStore::new(media)),
        SunoSessions::new(suno),
        Some(test_cipher()),
        Some(WEBHOOK_SECRET.to_string()),
    )
}
