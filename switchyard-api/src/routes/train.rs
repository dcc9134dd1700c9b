//! Train REST API Routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use switchyard_core::{NewTrain, TrainId, TrainPatch};

use crate::error::ApiResult;
use crate::services::{trains, ServiceContext};
use crate::state::AppState;

/// POST /trains
pub async fn create_train(
    State(ctx): State<ServiceContext>,
    Json(req): Json<NewTrain>,
) -> ApiResult<impl IntoResponse> {
    let train = trains::create_train(&ctx, req).await?;
    Ok((StatusCode::CREATED, Json(train)))
}

/// GET /trains
pub async fn list_trains(State(ctx): State<ServiceContext>) -> ApiResult<impl IntoResponse> {
    let trains = trains::list_trains(&ctx).await?;
    Ok(Json(trains))
}

/// GET /trains/:id
pub async fn get_train(
    State(ctx): State<ServiceContext>,
    Path(id): Path<TrainId>,
) -> ApiResult<impl IntoResponse> {
    let train = trains::get_train(&ctx, id).await?;
    Ok(Json(train))
}

/// PUT /trains/:id
pub async fn update_train(
    State(ctx): State<ServiceContext>,
    Path(id): Path<TrainId>,
    Json(req): Json<TrainPatch>,
) -> ApiResult<impl IntoResponse> {
    let train = trains::update_train(&ctx, id, req).await?;
    Ok(Json(train))
}

/// DELETE /trains/:id
pub async fn delete_train(
    State(ctx): State<ServiceContext>,
    Path(id): Path<TrainId>,
) -> ApiResult<StatusCode> {
    trains::delete_train(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/trains", get(list_trains).post(create_train))
        .route(
            "/trains/:id",
            get(get_train).put(update_train).delete(delete_train),
        )
        .with_state(state)
}
