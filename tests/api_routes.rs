mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tower::ServiceExt;

use common::{spawn_mock_suno, suno_config, test_state, MockSuno, GOOD_COOKIE, WEBHOOK_SECRET};
use tunehub::api::{build_router, USER_ID_HEADER};
use tunehub::billing::signature_header;
use tunehub::suno::SunoConfig;

async fn app(suno: SunoConfig) -> (Router, tempfile::TempDir) {
    let media = tempfile::tempdir().unwrap();
    let state = test_state(suno, media.path()).await;
    (build_router(state), media)
}

fn request(method: Method, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(USER_ID_HEADER, user);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

#[tokio::test]
async fn test_health() {
    let (app, _media) = app(SunoConfig::default()).await;
    let (status, body) = send(&app, request(Method::GET, "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_suno_routes_require_user() {
    let (app, _media) = app(SunoConfig::default()).await;
    for (method, uri) in [
        (Method::GET, "/api/suno/cookie"),
        (Method::GET, "/api/suno/check-cookie"),
        (Method::DELETE, "/api/suno/cookie"),
        (Method::GET, "/api/suno/credits"),
    ] {
        let (status, body) = send(&app, request(method, uri, None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(body["type"], "Auth");
    }

    let (status, _) = send(
        &app,
        request(Method::POST, "/api/suno/generate", None, Some(json!({"prompt": "x"}))),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cookie_lifecycle() {
    let (app, _media) = app(SunoConfig::default()).await;

    let (status, body) = send(&app, request(Method::GET, "/api/suno/check-cookie", Some("u1"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["has_cookie"], false);

    let (status, _) = send(&app, request(Method::GET, "/api/suno/cookie", Some("u1"), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        request(Method::POST, "/api/suno/cookie", Some("u1"), Some(json!({"cookie": GOOD_COOKIE}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, request(Method::GET, "/api/suno/check-cookie", Some("u1"), None)).await;
    assert_eq!(body["has_cookie"], true);
    let (_, body) = send(&app, request(Method::GET, "/api/suno/cookie", Some("u1"), None)).await;
    assert_eq!(body["cookie"], GOOD_COOKIE);

    // Another user sees nothing.
    let (_, body) = send(&app, request(Method::GET, "/api/suno/check-cookie", Some("u2"), None)).await;
    assert_eq!(body["has_cookie"], false);

    let (status, body) = send(&app, request(Method::DELETE, "/api/suno/cookie", Some("u1"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);
    let (_, body) = send(&app, request(Method::GET, "/api/suno/check-cookie", Some("u1"), None)).await;
    assert_eq!(body["has_cookie"], false);
}

#[tokio::test]
async fn test_blank_cookie_is_rejected() {
    let (app, _media) = app(SunoConfig::default()).await;
    let (status, body) = send(
        &app,
        request(Method::POST, "/api/suno/cookie", Some("u1"), Some(json!({"cookie": "  "}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"], "Validation");
}

#[tokio::test]
async fn test_generate_requires_prompt_and_cookie() {
    let (app, _media) = app(SunoConfig::default()).await;

    let (status, _) = send(
        &app,
        request(Method::POST, "/api/suno/generate", Some("u1"), Some(json!({"prompt": ""}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        request(Method::POST, "/api/suno/generate", Some("u1"), Some(json!({"prompt": "song"}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"], "Validation");
}

#[tokio::test]
async fn test_generate_waits_and_stores_clips() {
    let mock = MockSuno::new(2);
    let addr = spawn_mock_suno(mock.clone()).await;
    let (app, _media) = app(suno_config(addr, Duration::from_secs(5))).await;

    send(
        &app,
        request(Method::POST, "/api/suno/cookie", Some("u1"), Some(json!({"cookie": GOOD_COOKIE}))),
    )
    .await;

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/api/suno/generate",
            Some("u1"),
            Some(json!({"prompt": "a calm song", "wait_audio": true})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "completed");
    assert_eq!(body["clips"].as_array().unwrap().len(), 2);

    let (_, songs) = send(&app, request(Method::GET, "/api/songs/mine", Some("u1"), None)).await;
    let songs = songs.as_array().unwrap();
    assert_eq!(songs.len(), 2);
    assert!(songs.iter().all(|s| s["song_type"] == "suno" && s["status"] == "complete"));

    // The session is reused for the next call.
    let (status, credits) = send(&app, request(Method::GET, "/api/suno/credits", Some("u1"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(credits["credits_left"], 40);
    assert_eq!(mock.session_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_generate_payment_required() {
    let mock = MockSuno::new(1);
    mock.generate_status.store(402, Ordering::SeqCst);
    let addr = spawn_mock_suno(mock).await;
    let (app, _media) = app(suno_config(addr, Duration::from_secs(2))).await;

    send(
        &app,
        request(Method::POST, "/api/suno/cookie", Some("u1"), Some(json!({"cookie": GOOD_COOKIE}))),
    )
    .await;
    let (status, body) = send(
        &app,
        request(Method::POST, "/api/suno/generate", Some("u1"), Some(json!({"prompt": "song"}))),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["type"], "PaymentRequired");
}

#[tokio::test]
async fn test_generate_allows_any_origin() {
    let (app, _media) = app(SunoConfig::default()).await;
    let req = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/suno/generate")
        .header(header::ORIGIN, "https://elsewhere.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

fn webhook(payload: &str, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/webhooks")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(signature) = signature {
        builder = builder.header("stripe-signature", signature);
    }
    builder.body(Body::from(payload.to_string())).unwrap()
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[tokio::test]
async fn test_webhook_signature_checks() {
    let (app, _media) = app(SunoConfig::default()).await;
    let payload = json!({
        "id": "evt_1",
        "type": "product.created",
        "data": {"object": {"id": "prod_1", "active": true, "name": "Premium"}}
    })
    .to_string();

    let (status, _) = send(&app, webhook(&payload, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let forged = signature_header(payload.as_bytes(), "wrong-secret", now()).unwrap();
    let (status, body) = send(&app, webhook(&payload, Some(forged))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"], "Webhook");

    let stale = signature_header(payload.as_bytes(), WEBHOOK_SECRET, now() - 3600).unwrap();
    let (status, _) = send(&app, webhook(&payload, Some(stale))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let signed = signature_header(payload.as_bytes(), WEBHOOK_SECRET, now()).unwrap();
    let (status, body) = send(&app, webhook(&payload, Some(signed))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["handled"], true);

    let (_, products) = send(&app, request(Method::GET, "/api/billing/products", None, None)).await;
    assert_eq!(products[0]["id"], "prod_1");
}

#[tokio::test]
async fn test_webhook_ignores_unlisted_events() {
    let (app, _media) = app(SunoConfig::default()).await;
    let payload = json!({"id": "evt_2", "type": "invoice.paid", "data": {"object": {"id": "in_1"}}})
        .to_string();
    let signed = signature_header(payload.as_bytes(), WEBHOOK_SECRET, now()).unwrap();

    let (status, body) = send(&app, webhook(&payload, Some(signed))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["handled"], false);
}

#[tokio::test]
async fn test_webhook_handler_failure_is_an_error() {
    let (app, _media) = app(SunoConfig::default()).await;
    // Subscription for a customer that was never linked.
    let payload = json!({
        "id": "evt_3",
        "type": "customer.subscription.updated",
        "data": {"object": {"id": "sub_1", "customer": "cus_unknown", "status": "active"}}
    })
    .to_string();
    let signed = signature_header(payload.as_bytes(), WEBHOOK_SECRET, now()).unwrap();

    let (status, body) = send(&app, webhook(&payload, Some(signed))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"], "Webhook");
}

#[tokio::test]
async fn test_playlist_routes() {
    let mock = MockSuno::new(1);
    let addr = spawn_mock_suno(mock).await;
    let (app, _media) = app(suno_config(addr, Duration::from_secs(2))).await;

    send(
        &app,
        request(Method::POST, "/api/suno/cookie", Some("u1"), Some(json!({"cookie": GOOD_COOKIE}))),
    )
    .await;
    send(
        &app,
        request(
            Method::POST,
            "/api/suno/generate",
            Some("u1"),
            Some(json!({"prompt": "a song", "wait_audio": true})),
        ),
    )
    .await;
    let (_, songs) = send(&app, request(Method::GET, "/api/songs/mine", Some("u1"), None)).await;
    let song_id = songs[0]["id"].as_str().unwrap().to_string();

    let (status, playlist) = send(
        &app,
        request(Method::POST, "/api/playlists", Some("u1"), Some(json!({"name": "Generated"}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let playlist_id = playlist["id"].as_str().unwrap().to_string();

    let (status, entry) = send(
        &app,
        request(
            Method::POST,
            &format!("/api/playlists/{}/songs", playlist_id),
            Some("u1"),
            Some(json!({"song_type": "suno", "id": song_id})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["song"]["song_type"], "suno");

    let (status, _) = send(
        &app,
        request(
            Method::POST,
            &format!("/api/playlists/{}/songs", playlist_id),
            Some("u2"),
            Some(json!({"song_type": "suno", "id": song_id})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let details_uri = format!("/api/playlists/{}", playlist_id);
    let (status, _) = send(&app, request(Method::GET, &details_uri, None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app, request(Method::GET, &details_uri, Some("u2"), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, details) = send(&app, request(Method::GET, &details_uri, Some("u1"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(details["entries"].as_array().unwrap().len(), 1);
    assert_eq!(details["entries"][0]["song"]["id"], song_id.as_str());
}

const BOUNDARY: &str = "tunehub-test-boundary";

fn multipart(uri: &str, user: &str, fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    for (name, file_name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, name, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(USER_ID_HEADER, user)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Stores a cookie for `user` and generates two clips through the mock.
async fn generated_song_ids(app: &Router, user: &str) -> Vec<String> {
    send(
        app,
        request(Method::POST, "/api/suno/cookie", Some(user), Some(json!({"cookie": GOOD_COOKIE}))),
    )
    .await;
    let (status, _) = send(
        app,
        request(
            Method::POST,
            "/api/suno/generate",
            Some(user),
            Some(json!({"prompt": "a song", "wait_audio": true})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, songs) = send(app, request(Method::GET, "/api/songs/mine", Some(user), None)).await;
    songs
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_song_update_and_delete_routes() {
    let (app, _media) = app(SunoConfig::default()).await;

    let (status, song) = send(
        &app,
        multipart(
            "/api/songs",
            "u1",
            &[("title", "First Draft"), ("author", "Ana")],
            &[("song", "a.mp3", &b"ID3 audio"[..]), ("image", "a.png", &b"PNG image"[..])],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let uri = format!("/api/songs/{}", song["id"].as_str().unwrap());

    let (status, updated) = send(
        &app,
        request(Method::PATCH, &uri, Some("u1"), Some(json!({"title": "Final", "genre": "folk"}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Final");
    assert_eq!(updated["genre"], "folk");
    assert_eq!(updated["author"], "Ana");

    let (status, _) = send(
        &app,
        request(Method::PATCH, &uri, Some("u2"), Some(json!({"title": "Stolen"}))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = send(
        &app,
        request(Method::PATCH, &uri, Some("u1"), Some(json!({"title": "  "}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, request(Method::DELETE, &uri, Some("u1"), None)).await;
    assert_eq!(status, StatusCode::OK);
    let (_, songs) = send(&app, request(Method::GET, "/api/songs/mine", Some("u1"), None)).await;
    assert!(songs.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_generated_song_delete_is_owner_scoped() {
    let mock = MockSuno::new(1);
    let addr = spawn_mock_suno(mock).await;
    let (app, _media) = app(suno_config(addr, Duration::from_secs(2))).await;
    let ids = generated_song_ids(&app, "u1").await;
    let uri = format!("/api/suno-songs/{}", ids[0]);

    let (status, body) = send(&app, request(Method::DELETE, &uri, Some("u2"), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["type"], "Integrity");

    let (status, _) = send(&app, request(Method::DELETE, &uri, Some("u1"), None)).await;
    assert_eq!(status, StatusCode::OK);
    let (_, songs) = send(&app, request(Method::GET, "/api/songs/mine", Some("u1"), None)).await;
    assert_eq!(songs.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_plays_are_counted_through_the_player() {
    let mock = MockSuno::new(1);
    let addr = spawn_mock_suno(mock).await;
    let (app, _media) = app(suno_config(addr, Duration::from_secs(2))).await;
    let ids = generated_song_ids(&app, "u1").await;
    let song = json!({"song_type": "suno", "id": ids[0]});

    let (status, body) = send(&app, request(Method::POST, "/api/plays", Some("u1"), Some(song.clone()))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["counted"], true);
    let (_, body) = send(&app, request(Method::POST, "/api/plays", Some("u1"), Some(song.clone()))).await;
    assert_eq!(body["counted"], false);
    let (_, body) = send(&app, request(Method::POST, "/api/plays", Some("u2"), Some(song.clone()))).await;
    assert_eq!(body["counted"], true);

    let (status, _) = send(
        &app,
        request(Method::POST, "/api/plays", Some("u1"), Some(json!({"song_type": "suno", "id": "ghost"}))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Starting the other song from the player counts it once.
    let other = json!({"song_type": "suno", "id": ids[1]});
    let (status, state) = send(
        &app,
        request(
            Method::POST,
            "/api/player",
            Some("u1"),
            Some(json!({"type": "set_queue", "payload": {"songs": [song, other], "start": other}})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["now_playing"]["id"], ids[1].as_str());

    let (_, state) = send(&app, request(Method::GET, "/api/player", Some("u1"), None)).await;
    assert_eq!(state["songs"].as_array().unwrap().len(), 2);
    let (_, state) = send(&app, request(Method::GET, "/api/player", Some("u2"), None)).await;
    assert!(state["now_playing"].is_null());

    let mut counts = std::collections::HashMap::new();
    for _ in 0..50 {
        let (_, songs) = send(&app, request(Method::GET, "/api/songs/mine", Some("u1"), None)).await;
        counts = songs
            .as_array()
            .unwrap()
            .iter()
            .map(|s| (s["id"].as_str().unwrap().to_string(), s["play_count"].as_i64().unwrap()))
            .collect();
        if counts[&ids[1]] == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(counts[&ids[0]], 2);
    assert_eq!(counts[&ids[1]], 1);

    let (status, _) = send(&app, request(Method::GET, "/api/player", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_suno_feed_clip_lyrics_and_extend_routes() {
    let mock = MockSuno::new(1);
    let addr = spawn_mock_suno(mock.clone()).await;
    let (app, _media) = app(suno_config(addr, Duration::from_secs(2))).await;
    send(
        &app,
        request(Method::POST, "/api/suno/cookie", Some("u1"), Some(json!({"cookie": GOOD_COOKIE}))),
    )
    .await;

    let (status, feed) = send(
        &app,
        request(Method::GET, "/api/suno/feed?ids=clip-a,%20clip-b", Some("u1"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(feed[0]["id"], "clip-a");
    assert_eq!(feed[1]["id"], "clip-b");

    let (status, clip) = send(&app, request(Method::GET, "/api/suno/clips/clip-q", Some("u1"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(clip["id"], "clip-q");

    let (status, lyrics) = send(
        &app,
        request(Method::POST, "/api/suno/lyrics", Some("u1"), Some(json!({"prompt": "night drive"}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lyrics["status"], "complete");
    let (status, _) = send(
        &app,
        request(Method::POST, "/api/suno/lyrics", Some("u1"), Some(json!({}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        request(Method::POST, "/api/suno/extend", Some("u1"), Some(json!({"continue_at": 10.0}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, clips) = send(
        &app,
        request(
            Method::POST,
            "/api/suno/extend",
            Some("u1"),
            Some(json!({"clip_id": "clip-a", "continue_at": 30.0, "title": "Longer"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(clips[0]["id"], "clip-a-ext");

    let (_, songs) = send(&app, request(Method::GET, "/api/songs/mine", Some("u1"), None)).await;
    assert!(songs
        .as_array()
        .unwrap()
        .iter()
        .any(|s| s["suno_id"] == "clip-a-ext"));
}
