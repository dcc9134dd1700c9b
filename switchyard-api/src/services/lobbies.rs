//! Lobby Service

use switchyard_core::{Lobby, LobbyId, NewLobby};
use switchyard_storage::cache_keys;

use super::ServiceContext;
use crate::error::{ApiError, ApiResult};

pub async fn create_lobby(ctx: &ServiceContext, new: NewLobby) -> ApiResult<Lobby> {
    let lobby = {
        let mut session = ctx.router.acquire_write().await?;
        session.insert_lobby(&new).await?
    };

    ctx.cache.invalidate(cache_keys::LOBBIES).await;
    tracing::info!(lobby_id = lobby.id, train_id = lobby.train_id, "Lobby created");
    Ok(lobby)
}

pub async fn list_lobbies(ctx: &ServiceContext) -> ApiResult<Vec<Lobby>> {
    ctx.cache
        .get_or_load(cache_keys::LOBBIES, ctx.cache_ttl, || async {
            let mut session = ctx.router.acquire_read().await?;
            Ok::<_, ApiError>(session.list_lobbies().await?)
        })
        .await
}

pub async fn get_lobby(ctx: &ServiceContext, id: LobbyId) -> ApiResult<Lobby> {
    let mut session = ctx.router.acquire_read().await?;
    Ok(session.get_lobby(id).await?)
}

pub async fn delete_lobby(ctx: &ServiceContext, id: LobbyId) -> ApiResult<Lobby> {
    let lobby = {
        let mut session = ctx.router.acquire_write().await?;
        session.delete_lobby(id).await?
    };

    ctx.cache.invalidate(cache_keys::LOBBIES).await;
    tracing::info!(lobby_id = id, "Lobby deleted");
    Ok(lobby)
}
