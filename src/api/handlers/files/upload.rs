use crate::AppState;
use crate::api::error::AppError;
use crate::api::handlers::files::{MessageResponse, TokenResponse};
use crate::services::upload_service::{DirectUploadStarted, MultipartStarted};
use crate::utils::auth::Claims;
use axum::{
    Json,
    body::Bytes,
    extract::{Extension, Multipart, Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct StartUploadRequest {
    #[validate(length(min = 1, message = "file_name is required"))]
    pub file_name: String,
    pub file_type: Option<String>,
    #[validate(range(min = 0, message = "file_size must not be negative"))]
    pub file_size: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadPartResponse {
    pub etag: String,
}

#[utoipa::path(
    post,
    path = "/api/files/upload",
    request_body(content = String, description = "multipart/form-data with a single `file` field"),
    responses(
        (status = 200, description = "File uploaded", body = TokenResponse),
        (status = 413, description = "File too large")
    ),
    security(("bearer_auth" = [])),
    tag = "upload"
)]
pub async fn standard_upload(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> Result<Json<TokenResponse>, AppError> {
    let mut file_name = None;
    let mut file_type = None;
    let mut bytes = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        let msg = e.to_string();
        if msg.contains("length limit exceeded") {
            AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
        } else {
            AppError::Validation(msg)
        }
    })? {
        if field.name() == Some("file") {
            file_name = Some(field.file_name().unwrap_or("unnamed").to_string());
            file_type = field.content_type().map(|s| s.to_string());
            bytes = Some(field.bytes().await.map_err(|e| {
                let msg = e.to_string();
                if msg.contains("length limit exceeded") {
                    AppError::PayloadTooLarge(
                        "Request body exceeds the maximum allowed limit".to_string(),
                    )
                } else {
                    AppError::Validation(msg)
                }
            })?);
        }
    }

    let (file_name, bytes) = match (file_name, bytes) {
        (Some(name), Some(bytes)) => (name, bytes),
        _ => return Err(AppError::Validation("No file provided".to_string())),
    };

    let token = state
        .uploads
        .standard(&claims.sub, &file_name, file_type, bytes.to_vec())
        .await?;
    Ok(Json(token.into()))
}

#[utoipa::path(
    post,
    path = "/api/files/upload/direct/start",
    request_body = StartUploadRequest,
    responses(
        (status = 200, description = "Direct upload started", body = DirectUploadStarted)
    ),
    security(("bearer_auth" = [])),
    tag = "upload"
)]
pub async fn direct_start(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<StartUploadRequest>,
) -> Result<Json<DirectUploadStarted>, AppError> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let started = state
        .uploads
        .direct_start(&claims.sub, &req.file_name, req.file_type, req.file_size)
        .await?;
    Ok(Json(started))
}

#[utoipa::path(
    post,
    path = "/api/files/upload/direct/finish/{file_id}",
    params(("file_id" = String, Path, description = "File ID returned by start")),
    responses(
        (status = 200, description = "Upload finalized", body = TokenResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "upload"
)]
pub async fn direct_finish(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(file_id): Path<String>,
) -> Result<Json<TokenResponse>, AppError> {
    let token = state.uploads.direct_finish(&claims.sub, &file_id).await?;
    Ok(Json(token.into()))
}

#[utoipa::path(
    post,
    path = "/api/files/upload/local/{file_id}",
    params(("file_id" = String, Path, description = "File ID returned by start")),
    responses(
        (status = 200, description = "Upload stored and finalized", body = TokenResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "upload"
)]
pub async fn upload_local(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(file_id): Path<String>,
    body: Bytes,
) -> Result<Json<TokenResponse>, AppError> {
    let token = state
        .uploads
        .upload_local(&claims.sub, &file_id, body.to_vec())
        .await?;
    Ok(Json(token.into()))
}

#[utoipa::path(
    post,
    path = "/api/files/upload/multipart/start",
    request_body = StartUploadRequest,
    responses(
        (status = 200, description = "Multipart upload started", body = MultipartStarted)
    ),
    security(("bearer_auth" = [])),
    tag = "upload"
)]
pub async fn multipart_start(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<StartUploadRequest>,
) -> Result<Json<MultipartStarted>, AppError> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let started = state
        .uploads
        .multipart_start(&claims.sub, &req.file_name, req.file_type, req.file_size)
        .await?;
    Ok(Json(started))
}

#[utoipa::path(
    put,
    path = "/api/files/upload/multipart/{file_id}/parts/{part_number}",
    params(
        ("file_id" = String, Path, description = "File ID returned by start"),
        ("part_number" = i32, Path, description = "1-based part number")
    ),
    responses(
        (status = 200, description = "Part stored", body = UploadPartResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "upload"
)]
pub async fn multipart_upload_part(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((file_id, part_number)): Path<(String, i32)>,
    body: Bytes,
) -> Result<Json<UploadPartResponse>, AppError> {
    if part_number < 1 {
        return Err(AppError::Validation("Invalid part number".to_string()));
    }
    let etag = state
        .uploads
        .multipart_upload_part(&claims.sub, &file_id, part_number, body.to_vec())
        .await?;
    Ok(Json(UploadPartResponse { etag }))
}

#[utoipa::path(
    post,
    path = "/api/files/upload/multipart/{file_id}/finish",
    params(("file_id" = String, Path, description = "File ID returned by start")),
    responses(
        (status = 200, description = "Upload finalized", body = TokenResponse),
        (status = 502, description = "Storage completion failed; file left unfinished")
    ),
    security(("bearer_auth" = [])),
    tag = "upload"
)]
pub async fn multipart_finish(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(file_id): Path<String>,
) -> Result<Json<TokenResponse>, AppError> {
    let token = state.uploads.multipart_finish(&claims.sub, &file_id).await?;
    Ok(Json(token.into()))
}

#[utoipa::path(
    delete,
    path = "/api/files/upload/multipart/{file_id}",
    params(("file_id" = String, Path, description = "File ID returned by start")),
    responses(
        (status = 200, description = "Upload aborted", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "upload"
)]
pub async fn multipart_abort(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(file_id): Path<String>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    state.uploads.multipart_abort(&claims.sub, &file_id).await?;
    Ok((StatusCode::OK, Json(MessageResponse::new("Upload aborted"))))
}
