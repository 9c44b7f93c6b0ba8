use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::auth::CurrentUser;
use super::AppState;
use crate::errors::AppError;
use crate::suno::{
    AudioInfo, Credits, CustomGenerateRequest, ExtendRequest, GenerationOutcome, Lyrics, SunoError,
};

#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    pub prompt: Option<String>,
    #[serde(default)]
    pub make_instrumental: bool,
    pub model: Option<String>,
    #[serde(default)]
    pub wait_audio: bool,
    pub tags: Option<String>,
    pub title: Option<String>,
    pub negative_tags: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CookieBody {
    pub cookie: String,
}

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    /// Comma-separated clip ids; the whole feed when absent.
    pub ids: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExtendBody {
    pub clip_id: Option<String>,
    pub continue_at: Option<f64>,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub title: String,
    pub model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LyricsBody {
    pub prompt: Option<String>,
}

fn session_rejected(e: &SunoError) -> bool {
    matches!(e, SunoError::Auth(_)) || matches!(e.status(), Some(401 | 403))
}

/// Passes a client result through, evicting the pooled session when Suno
/// rejected it.
async fn checked<T>(state: &AppState, cookie: &str, result: Result<T, SunoError>) -> Result<T, AppError> {
    match result {
        Ok(value) => Ok(value),
        Err(e) => {
            if session_rejected(&e) {
                state.sessions.evict(cookie).await;
            }
            Err(e.into())
        }
    }
}

async fn stored_cookie(state: &AppState, user_id: &str) -> Result<String, AppError> {
    match state.users.suno_cookie(user_id, state.cipher()?).await {
        Err(AppError::NotFound(_)) => Err(AppError::Validation(
            "No Suno cookie stored; add one first".to_string(),
        )),
        other => other,
    }
}

pub async fn generate(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<GenerateBody>,
) -> Result<Json<GenerationOutcome>, AppError> {
    let prompt = body.prompt.as_deref().map(str::trim).unwrap_or_default();
    if prompt.is_empty() {
        return Err(AppError::Validation("Prompt is required".to_string()));
    }
    let cookie = stored_cookie(&state, &user.id).await?;
    let shared = state.sessions.client_for(&cookie).await?;

    let result = {
        let mut client = shared.lock().await;
        if body.tags.is_some() || body.title.is_some() {
            let request = CustomGenerateRequest {
                prompt: prompt.to_string(),
                tags: body.tags.clone().unwrap_or_default(),
                title: body.title.clone().unwrap_or_default(),
                make_instrumental: body.make_instrumental,
                model: body.model.clone(),
                negative_tags: body.negative_tags.clone(),
            };
            client.custom_generate(&request, body.wait_audio).await
        } else {
            client
                .generate(prompt, body.make_instrumental, body.model.as_deref(), body.wait_audio)
                .await
        }
    };

    let outcome = checked(&state, &cookie, result).await?;

    // Clips already exist upstream, so the response goes out even if the
    // local copy could not be written.
    if let Err(e) = state.library.upsert_suno_clips(&user.id, outcome.clips()).await {
        log::error!("Failed to store generated clips for {}: {}", user.id, e);
    }

    Ok(Json(outcome))
}

pub async fn credits(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Credits>, AppError> {
    let cookie = stored_cookie(&state, &user.id).await?;
    let shared = state.sessions.client_for(&cookie).await?;
    let result = shared.lock().await.get_credits().await;
    Ok(Json(checked(&state, &cookie, result).await?))
}

/// Current status of the given clips, or the caller's whole feed.
pub async fn feed(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Vec<AudioInfo>>, AppError> {
    let ids: Vec<String> = query
        .ids
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();

    let cookie = stored_cookie(&state, &user.id).await?;
    let shared = state.sessions.client_for(&cookie).await?;
    let result = shared.lock().await.get(Some(ids.as_slice())).await;
    Ok(Json(checked(&state, &cookie, result).await?))
}

pub async fn clip(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let cookie = stored_cookie(&state, &user.id).await?;
    let shared = state.sessions.client_for(&cookie).await?;
    let result = shared.lock().await.get_clip(&id).await;
    Ok(Json(checked(&state, &cookie, result).await?))
}

/// Continues one of the caller's clips. The new clips are stored like
/// generated ones.
pub async fn extend(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<ExtendBody>,
) -> Result<Json<Vec<AudioInfo>>, AppError> {
    let clip_id = body
        .clip_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::Validation("clip_id is required".to_string()))?
        .to_string();
    let request = ExtendRequest {
        clip_id,
        continue_at: body.continue_at,
        prompt: body.prompt,
        tags: body.tags,
        title: body.title,
        model: body.model,
    };

    let cookie = stored_cookie(&state, &user.id).await?;
    let shared = state.sessions.client_for(&cookie).await?;
    let result = shared.lock().await.extend_audio(&request).await;
    let clips = checked(&state, &cookie, result).await?;

    if let Err(e) = state.library.upsert_suno_clips(&user.id, &clips).await {
        log::error!("Failed to store extended clips for {}: {}", user.id, e);
    }
    Ok(Json(clips))
}

pub async fn lyrics(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<LyricsBody>,
) -> Result<Json<Lyrics>, AppError> {
    let prompt = body.prompt.as_deref().map(str::trim).unwrap_or_default();
    if prompt.is_empty() {
        return Err(AppError::Validation("Prompt is required".to_string()));
    }
    let cookie = stored_cookie(&state, &user.id).await?;
    let shared = state.sessions.client_for(&cookie).await?;
    let result = shared.lock().await.generate_lyrics(prompt).await;
    Ok(Json(checked(&state, &cookie, result).await?))
}

pub async fn get_cookie(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Value>, AppError> {
    let cookie = state.users.suno_cookie(&user.id, state.cipher()?).await?;
    Ok(Json(json!({ "cookie": cookie })))
}

pub async fn set_cookie(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<CookieBody>,
) -> Result<Json<Value>, AppError> {
    let cipher = state.cipher()?;
    if let Ok(previous) = state.users.suno_cookie(&user.id, cipher).await {
        state.sessions.evict(&previous).await;
    }
    state.users.set_suno_cookie(&user.id, &body.cookie, cipher).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn delete_cookie(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Value>, AppError> {
    if let Some(cipher) = state.cipher.as_ref() {
        if let Ok(previous) = state.users.suno_cookie(&user.id, cipher).await {
            state.sessions.evict(&previous).await;
        }
    }
    let deleted = state.users.clear_suno_cookie(&user.id).await?;
    Ok(Json(json!({ "success": true, "deleted": deleted })))
}

pub async fn check_cookie(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Value>, AppError> {
    let has_cookie = state.users.has_suno_cookie(&user.id).await?;
    Ok(Json(json!({ "has_cookie": has_cookie })))
}
