use crate::AppState;
use crate::api::error::AppError;
use crate::api::handlers::files::{MessageResponse, TokenResponse};
use crate::utils::auth::Claims;
use axum::{
    Json,
    extract::{Extension, Path, State},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RestoreRequest {
    pub tokens: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RenameRequest {
    pub file_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EmptyBinResponse {
    pub deleted: u64,
}

#[utoipa::path(
    delete,
    path = "/api/files/{token}",
    params(("token" = String, Path, description = "Ownership token")),
    responses(
        (status = 200, description = "Moved to recycle bin", body = MessageResponse),
        (status = 403, description = "Not the owner"),
        (status = 400, description = "Already in the recycle bin")
    ),
    security(("bearer_auth" = [])),
    tag = "files"
)]
pub async fn delete_file(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.tokens.delete(&claims.sub, &token).await?;
    Ok(Json(MessageResponse::new("File moved to recycle bin")))
}

#[utoipa::path(
    post,
    path = "/api/files/restore",
    request_body = RestoreRequest,
    responses(
        (status = 200, description = "Batch restored", body = MessageResponse),
        (status = 400, description = "A token was not in the bin; nothing restored")
    ),
    security(("bearer_auth" = [])),
    tag = "files"
)]
pub async fn restore_files(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RestoreRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    if req.tokens.is_empty() {
        return Err(AppError::Validation("No tokens provided".to_string()));
    }
    state.tokens.restore(&claims.sub, &req.tokens).await?;
    Ok(Json(MessageResponse::new("Files restored")))
}

#[utoipa::path(
    post,
    path = "/api/files/{token}/copy",
    params(("token" = String, Path, description = "Token shared with the requester")),
    responses(
        (status = 200, description = "New token on the same file", body = TokenResponse),
        (status = 400, description = "Already owned or source deleted")
    ),
    security(("bearer_auth" = [])),
    tag = "files"
)]
pub async fn copy_file(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(token): Path<String>,
) -> Result<Json<TokenResponse>, AppError> {
    let copy = state.tokens.copy(&claims.sub, &token).await?;
    Ok(Json(copy.into()))
}

#[utoipa::path(
    post,
    path = "/api/files/{token}/favourite",
    params(("token" = String, Path, description = "Ownership token")),
    responses((status = 200, description = "Marked favourite", body = MessageResponse)),
    security(("bearer_auth" = [])),
    tag = "files"
)]
pub async fn favourite_file(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.tokens.set_favourite(&claims.sub, &token, true).await?;
    Ok(Json(MessageResponse::new("File marked as favourite")))
}

#[utoipa::path(
    delete,
    path = "/api/files/{token}/favourite",
    params(("token" = String, Path, description = "Ownership token")),
    responses((status = 200, description = "Unmarked favourite", body = MessageResponse)),
    security(("bearer_auth" = [])),
    tag = "files"
)]
pub async fn unfavourite_file(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .tokens
        .set_favourite(&claims.sub, &token, false)
        .await?;
    Ok(Json(MessageResponse::new("File unmarked as favourite")))
}

#[utoipa::path(
    patch,
    path = "/api/files/{token}/rename",
    params(("token" = String, Path, description = "Ownership token")),
    request_body = RenameRequest,
    responses((status = 200, description = "Renamed", body = MessageResponse)),
    security(("bearer_auth" = [])),
    tag = "files"
)]
pub async fn rename_file(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(token): Path<String>,
    Json(req): Json<RenameRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    if req.file_name.trim().is_empty() {
        return Err(AppError::Validation("file_name is required".to_string()));
    }
    state
        .tokens
        .rename(&claims.sub, &token, req.file_name.trim())
        .await?;
    Ok(Json(MessageResponse::new("File renamed")))
}

#[utoipa::path(
    post,
    path = "/api/files/{token}/views",
    params(("token" = String, Path, description = "Ownership token")),
    responses((status = 200, description = "View counted", body = MessageResponse)),
    security(("bearer_auth" = [])),
    tag = "files"
)]
pub async fn update_views(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.tokens.update_views(&claims.sub, &token).await?;
    Ok(Json(MessageResponse::new("View recorded")))
}

#[utoipa::path(
    delete,
    path = "/api/files/bin",
    responses(
        (status = 200, description = "Recycle bin purged", body = EmptyBinResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "files"
)]
pub async fn empty_recycle_bin(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<EmptyBinResponse>, AppError> {
    let deleted = state.tokens.empty_recycle_bin(&claims.sub).await?;
    Ok(Json(EmptyBinResponse { deleted }))
}
