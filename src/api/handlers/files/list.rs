use crate::AppState;
use crate::api::error::AppError;
use crate::services::listing_service::{
    FileCategory, FileDetails, FileListItem, ListScope, TopViewedItem,
};
use crate::services::stats_service::{Earnings, StorageStats};
use crate::utils::auth::Claims;
use axum::{
    Json,
    extract::{Extension, Path, State},
};

fn parse_category(raw: &str) -> Result<FileCategory, AppError> {
    match raw {
        "images" => Ok(FileCategory::Images),
        "videos" => Ok(FileCategory::Videos),
        "audio" => Ok(FileCategory::Audio),
        "documents" => Ok(FileCategory::Documents),
        "others" => Ok(FileCategory::Others),
        other => Err(AppError::Validation(format!(
            "Unknown category: {}",
            other
        ))),
    }
}

#[utoipa::path(
    get,
    path = "/api/files",
    responses(
        (status = 200, description = "All active files", body = [FileListItem]),
        (status = 404, description = "No file found")
    ),
    security(("bearer_auth" = [])),
    tag = "files"
)]
pub async fn list_files(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<FileListItem>>, AppError> {
    Ok(Json(state.listings.list(&claims.sub, ListScope::All).await?))
}

#[utoipa::path(
    get,
    path = "/api/files/shared",
    responses(
        (status = 200, description = "Files received via copy", body = [FileListItem]),
        (status = 404, description = "No file found")
    ),
    security(("bearer_auth" = [])),
    tag = "files"
)]
pub async fn list_shared(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<FileListItem>>, AppError> {
    Ok(Json(
        state.listings.list(&claims.sub, ListScope::Shared).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/files/bin",
    responses(
        (status = 200, description = "Recycle bin contents", body = [FileListItem]),
        (status = 404, description = "No file found")
    ),
    security(("bearer_auth" = [])),
    tag = "files"
)]
pub async fn list_recycle_bin(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<FileListItem>>, AppError> {
    Ok(Json(
        state
            .listings
            .list(&claims.sub, ListScope::RecycleBin)
            .await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/files/favourites",
    responses(
        (status = 200, description = "Favourite files", body = [FileListItem]),
        (status = 404, description = "No file found")
    ),
    security(("bearer_auth" = [])),
    tag = "files"
)]
pub async fn list_favourites(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<FileListItem>>, AppError> {
    Ok(Json(
        state
            .listings
            .list(&claims.sub, ListScope::Favourites)
            .await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/files/category/{category}",
    params(("category" = String, Path, description = "images, videos, audio, documents or others")),
    responses(
        (status = 200, description = "Files in one category", body = [FileListItem]),
        (status = 404, description = "No file found")
    ),
    security(("bearer_auth" = [])),
    tag = "files"
)]
pub async fn list_category(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(category): Path<String>,
) -> Result<Json<Vec<FileListItem>>, AppError> {
    let category = parse_category(&category)?;
    Ok(Json(
        state
            .listings
            .list(&claims.sub, ListScope::Category(category))
            .await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/files/top",
    responses(
        (status = 200, description = "Ten most viewed files", body = [TopViewedItem]),
        (status = 404, description = "No file found")
    ),
    security(("bearer_auth" = [])),
    tag = "files"
)]
pub async fn top_viewed(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<TopViewedItem>>, AppError> {
    Ok(Json(state.listings.top_viewed(&claims.sub).await?))
}

#[utoipa::path(
    get,
    path = "/api/files/details/{token}",
    params(("token" = String, Path, description = "Ownership token")),
    responses(
        (status = 200, description = "File details", body = FileDetails),
        (status = 404, description = "No file found")
    ),
    security(("bearer_auth" = [])),
    tag = "files"
)]
pub async fn file_details(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(token): Path<String>,
) -> Result<Json<FileDetails>, AppError> {
    Ok(Json(
        state.listings.details(&token, Some(&claims.sub)).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/files/stats",
    responses((status = 200, description = "Storage aggregates", body = StorageStats)),
    security(("bearer_auth" = [])),
    tag = "stats"
)]
pub async fn storage_stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<StorageStats>, AppError> {
    Ok(Json(state.stats.storage_stats(&claims.sub).await?))
}

#[utoipa::path(
    get,
    path = "/api/files/earnings",
    responses((status = 200, description = "View earnings", body = Earnings)),
    security(("bearer_auth" = [])),
    tag = "stats"
)]
pub async fn earnings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Earnings>, AppError> {
    Ok(Json(state.stats.earnings(&claims.sub).await?))
}
