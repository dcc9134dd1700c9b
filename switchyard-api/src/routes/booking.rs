//! Booking REST API Routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use switchyard_core::{BookingId, BookingPatch, NewBooking};

use crate::error::ApiResult;
use crate::services::{bookings, ServiceContext};
use crate::state::AppState;

/// POST /bookings - take a seat on a train
pub async fn create_booking(
    State(ctx): State<ServiceContext>,
    Json(req): Json<NewBooking>,
) -> ApiResult<impl IntoResponse> {
    let booking = bookings::create_booking(&ctx, req).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// GET /bookings
pub async fn list_bookings(State(ctx): State<ServiceContext>) -> ApiResult<impl IntoResponse> {
    Ok(Json(bookings::list_bookings(&ctx).await?))
}

/// GET /bookings/:id
pub async fn get_booking(
    State(ctx): State<ServiceContext>,
    Path(id): Path<BookingId>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(bookings::get_booking(&ctx, id).await?))
}

/// PUT /bookings/:id
pub async fn update_booking(
    State(ctx): State<ServiceContext>,
    Path(id): Path<BookingId>,
    Json(req): Json<BookingPatch>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(bookings::update_booking(&ctx, id, req).await?))
}

/// DELETE /bookings/:id - cancel and give the seat back
pub async fn cancel_booking(
    State(ctx): State<ServiceContext>,
    Path(id): Path<BookingId>,
) -> ApiResult<StatusCode> {
    bookings::cancel_booking(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/bookings", get(list_bookings).post(create_booking))
        .route(
            "/bookings/:id",
            get(get_booking).put(update_booking).delete(cancel_booking),
        )
        .with_state(state)
}
