use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use super::auth::CurrentUser;
use super::AppState;
use crate::errors::AppError;
use crate::library::models::SongRef;
use crate::player::{PlayerAction, PlayerState};

pub async fn state(State(state): State<AppState>, user: CurrentUser) -> Json<PlayerState> {
    Json(state.players.state(&user.id))
}

pub async fn dispatch(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(action): Json<PlayerAction>,
) -> Json<PlayerState> {
    Json(state.players.dispatch(&user.id, action))
}

/// A play reported by the client. `counted` is false inside the cooldown.
pub async fn record_play(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(song): Json<SongRef>,
) -> Result<Json<Value>, AppError> {
    let counted = state.players.record_play(&user.id, &song).await?;
    Ok(Json(json!({ "counted": counted })))
}
