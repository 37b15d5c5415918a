use serde::{Deserialize, Serialize};

use crate::contract::{
    CleanupResponse, CoreRequest, CoreResponse, FavoritesResponse, FlagResponse, KeysResponse,
    MutationResponse,
};
use crate::favorites::{FavoritesRepository, Mutation, RepositoryError};
use crate::ranking::RankingRequest;
use crate::settings::MAX_GRID_COLUMNS;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidJson,
    InvalidRequest,
    Store,
    Codec,
    Backup,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransportResponse {
    Ok { response: CoreResponse },
    Err { error: ErrorResponse },
}

pub async fn handle_request(
    repository: &FavoritesRepository,
    request: CoreRequest,
) -> TransportResponse {
    match dispatch(repository, request).await {
        Ok(response) => TransportResponse::Ok { response },
        Err(error) => TransportResponse::Err {
            error: map_repository_error(error),
        },
    }
}

pub async fn handle_json(repository: &FavoritesRepository, payload: &str) -> String {
    let response = match serde_json::from_str::<CoreRequest>(payload) {
        Ok(request) => handle_request(repository, request).await,
        Err(error) => TransportResponse::Err {
            error: ErrorResponse {
                code: ErrorCode::InvalidJson,
                message: error.to_string(),
            },
        },
    };

    serde_json::to_string(&response).unwrap_or_else(|error| {
        format!(
            "{{\"status\":\"err\",\"error\":{{\"code\":\"internal\",\"message\":\"{}\"}}}}",
            error.to_string().replace('"', "'")
        )
    })
}

async fn dispatch(
    repository: &FavoritesRepository,
    request: CoreRequest,
) -> Result<CoreResponse, RepositoryError> {
    let response = match request {
        CoreRequest::Favorites(request) => {
            let columns = request
                .columns
                .unwrap_or_else(|| repository.settings().current().grid_columns);
            if columns == 0 || columns > MAX_GRID_COLUMNS as usize {
                return Err(RepositoryError::InvalidRequest(format!(
                    "columns must be between 1 and {MAX_GRID_COLUMNS}"
                )));
            }
            let items = repository.favorites_snapshot(columns).await?;
            CoreResponse::Favorites(FavoritesResponse::from_items(items))
        }
        CoreRequest::Pin(request) => applied(repository.pin_item(&request.item)).await?,
        CoreRequest::Unpin(request) => applied(repository.unpin_item(&request.item)).await?,
        CoreRequest::Hide(request) => applied(repository.hide_item(&request.item)).await?,
        CoreRequest::Unhide(request) => applied(repository.unhide_item(&request.item)).await?,
        CoreRequest::Launch(request) => {
            applied(repository.increment_launch_counter(&request.item)).await?
        }
        CoreRequest::Save(request) => applied(repository.save(&request.item)).await?,
        CoreRequest::Remove(request) => applied(repository.remove(&request.item)).await?,
        CoreRequest::RemoveFromFavorites(request) => {
            applied(repository.remove_from_favorites(&request.item)).await?
        }
        CoreRequest::UpdateFavorites(request) => {
            applied(repository.update_favorites(
                request.manually_sorted,
                request.automatically_sorted,
            ))
            .await?
        }
        CoreRequest::IsPinned(request) => CoreResponse::Flag(FlagResponse {
            value: repository.is_pinned(&request.item).await?,
        }),
        CoreRequest::IsHidden(request) => CoreResponse::Flag(FlagResponse {
            value: repository.is_hidden(&request.item).await?,
        }),
        CoreRequest::HiddenItems => {
            CoreResponse::Favorites(FavoritesResponse::from_items(repository.hidden_items().await?))
        }
        CoreRequest::PinnedCalendarEvents => {
            let events = repository
                .query(RankingRequest::pinned_calendar_events())
                .await?;
            CoreResponse::Favorites(FavoritesResponse::from_items(events))
        }
        CoreRequest::HiddenCalendarEventKeys => CoreResponse::Keys(KeysResponse {
            keys: repository.hidden_calendar_event_keys().await?,
        }),
        CoreRequest::SortByRelevance(request) => CoreResponse::Keys(KeysResponse {
            keys: repository.sort_by_relevance(request.keys).await?,
        }),
        CoreRequest::SortByWeight(request) => CoreResponse::Keys(KeysResponse {
            keys: repository.sort_by_weight(request.keys).await?,
        }),
        CoreRequest::Cleanup => CoreResponse::Cleanup(CleanupResponse {
            removed: repository.cleanup_database().await?,
        }),
    };
    Ok(response)
}

/// Waits for a dispatched mutation so the reply reflects whether it committed.
async fn applied(mutation: Mutation) -> Result<CoreResponse, RepositoryError> {
    mutation
        .await
        .map_err(|error| RepositoryError::Task(error.to_string()))??;
    Ok(CoreResponse::Mutation(MutationResponse { applied: true }))
}

fn map_repository_error(error: RepositoryError) -> ErrorResponse {
    let code = match &error {
        RepositoryError::InvalidRequest(_) => ErrorCode::InvalidRequest,
        RepositoryError::Store(_) => ErrorCode::Store,
        RepositoryError::Codec(_) => ErrorCode::Codec,
        RepositoryError::Backup(_) => ErrorCode::Backup,
        RepositoryError::Task(_) => ErrorCode::Internal,
    };
    let message = match error {
        RepositoryError::InvalidRequest(message) => message,
        other => other.to_string(),
    };
    ErrorResponse { code, message }
}
