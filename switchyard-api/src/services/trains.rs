//! Train Service

use switchyard_core::{event, NewTrain, Train, TrainId, TrainPatch};
use switchyard_storage::cache_keys;

use super::ServiceContext;
use crate::error::{ApiError, ApiResult};

pub async fn create_train(ctx: &ServiceContext, new: NewTrain) -> ApiResult<Train> {
    new.validate()?;

    let train = {
        let mut session = ctx.router.acquire_write().await?;
        session.insert_train(&new).await?
    };

    ctx.cache.invalidate(cache_keys::TRAINS).await;
    tracing::info!(train_id = train.id, route = %train.route, "Train created");
    Ok(train)
}

/// All trains, served from the cache when fresh.
pub async fn list_trains(ctx: &ServiceContext) -> ApiResult<Vec<Train>> {
    ctx.cache
        .get_or_load(cache_keys::TRAINS, ctx.cache_ttl, || async {
            let mut session = ctx.router.acquire_read().await?;
            Ok::<_, ApiError>(session.list_trains().await?)
        })
        .await
}

pub async fn get_train(ctx: &ServiceContext, id: TrainId) -> ApiResult<Train> {
    let mut session = ctx.router.acquire_read().await?;
    Ok(session.get_train(id).await?)
}

/// Apply a partial update and tell the train's subscribers what changed.
pub async fn update_train(ctx: &ServiceContext, id: TrainId, patch: TrainPatch) -> ApiResult<Train> {
    if patch.is_empty() {
        return Err(ApiError::invalid_input("Update contains no fields"));
    }
    patch.validate()?;

    let (before, after) = {
        let mut session = ctx.router.acquire_write().await?;
        session.update_train(id, &patch).await?
    };

    ctx.cache.invalidate(cache_keys::TRAINS).await;
    ctx.publisher
        .publish_best_effort(&id.to_string(), &event::train_updated(&before, &patch))
        .await;

    tracing::info!(train_id = id, "Train updated");
    Ok(after)
}

/// Delete a train with its bookings and tell its subscribers it is gone.
pub async fn delete_train(ctx: &ServiceContext, id: TrainId) -> ApiResult<Train> {
    let train = {
        let mut session = ctx.router.acquire_write().await?;
        session.delete_train(id).await?
    };

    ctx.cache
        .invalidate_all(&[cache_keys::TRAINS, cache_keys::BOOKINGS])
        .await;
    ctx.publisher
        .publish_best_effort(&id.to_string(), &event::train_removed())
        .await;

    tracing::info!(train_id = id, "Train deleted");
    Ok(train)
}
