//! Lobby REST API Routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use switchyard_core::{LobbyId, NewLobby};

use crate::error::ApiResult;
use crate::services::{lobbies, ServiceContext};
use crate::state::AppState;

pub async fn create_lobby(
    State(ctx): State<ServiceContext>,
    Json(req): Json<NewLobby>,
) -> ApiResult<impl IntoResponse> {
    let lobby = lobbies::create_lobby(&ctx, req).await?;
    Ok((StatusCode::CREATED, Json(lobby)))
}

pub async fn list_lobbies(State(ctx): State<ServiceContext>) -> ApiResult<impl IntoResponse> {
    Ok(Json(lobbies::list_lobbies(&ctx).await?))
}

pub async fn get_lobby(
    State(ctx): State<ServiceContext>,
    Path(id): Path<LobbyId>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(lobbies::get_lobby(&ctx, id).await?))
}

pub async fn delete_lobby(
    State(ctx): State<ServiceContext>,
    Path(id): Path<LobbyId>,
) -> ApiResult<StatusCode> {
    lobbies::delete_lobby(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/lobbies", get(list_lobbies).post(create_lobby))
        .route("/lobbies/:id", get(get_lobby).delete(delete_lobby))
        .with_state(state)
}
