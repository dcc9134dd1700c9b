//! Booking Service
//!
//! Booking and cancelling move seats on the train, so both invalidate the
//! train collection as well as the booking collection. The notification text
//! depends on the seats left after the commit: the last seat gets the
//! "no more seats" line instead of a count.

use switchyard_core::{event, Booking, BookingId, BookingPatch, NewBooking};
use switchyard_storage::cache_keys;

use super::ServiceContext;
use crate::error::{ApiError, ApiResult};

pub async fn create_booking(ctx: &ServiceContext, new: NewBooking) -> ApiResult<Booking> {
    new.validate()?;

    let receipt = {
        let mut session = ctx.router.acquire_write().await?;
        session.book_seat(&new).await?
    };

    ctx.cache
        .invalidate_all(&[cache_keys::BOOKINGS, cache_keys::TRAINS])
        .await;

    let user = &receipt.booking.user_credentials;
    let text = if receipt.seats_left == 0 {
        event::seats_exhausted(user)
    } else {
        event::booking_registered(user, receipt.seats_left)
    };
    ctx.publisher
        .publish_best_effort(&new.train_id.to_string(), &text)
        .await;

    tracing::info!(
        booking_id = receipt.booking.id,
        train_id = new.train_id,
        seats_left = receipt.seats_left,
        "Booking registered"
    );
    Ok(receipt.booking)
}

pub async fn list_bookings(ctx: &ServiceContext) -> ApiResult<Vec<Booking>> {
    ctx.cache
        .get_or_load(cache_keys::BOOKINGS, ctx.cache_ttl, || async {
            let mut session = ctx.router.acquire_read().await?;
            Ok::<_, ApiError>(session.list_bookings().await?)
        })
        .await
}

pub async fn get_booking(ctx: &ServiceContext, id: BookingId) -> ApiResult<Booking> {
    let mut session = ctx.router.acquire_read().await?;
    Ok(session.get_booking(id).await?)
}

/// Change the credentials on a booking. Seats are untouched, nothing is published.
pub async fn update_booking(
    ctx: &ServiceContext,
    id: BookingId,
    patch: BookingPatch,
) -> ApiResult<Booking> {
    patch.validate()?;

    let booking = {
        let mut session = ctx.router.acquire_write().await?;
        session.update_booking(id, &patch).await?
    };

    ctx.cache.invalidate(cache_keys::BOOKINGS).await;
    tracing::info!(booking_id = id, "Booking updated");
    Ok(booking)
}

pub async fn cancel_booking(ctx: &ServiceContext, id: BookingId) -> ApiResult<Booking> {
    let receipt = {
        let mut session = ctx.router.acquire_write().await?;
        session.cancel_booking(id).await?
    };

    ctx.cache
        .invalidate_all(&[cache_keys::BOOKINGS, cache_keys::TRAINS])
        .await;

    let booking = receipt.booking;
    ctx.publisher
        .publish_best_effort(
            &booking.train_id.to_string(),
            &event::booking_cancelled(&booking.user_credentials, receipt.seats_left),
        )
        .await;

    tracing::info!(
        booking_id = id,
        train_id = booking.train_id,
        seats_left = receipt.seats_left,
        "Booking cancelled"
    );
    Ok(booking)
}
