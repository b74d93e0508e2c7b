use crate::AppState;
use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::Response,
};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use sea_orm::EntityTrait;
use tokio_util::io::ReaderStream;

const STREAM_CHUNK_SIZE: usize = 64 * 1024;

enum Disposition {
    Inline,
    Attachment,
}

/// Parses a `Range` header against the total size, returning the inclusive
/// `(first, last)` byte positions. `None` means the header is absent or
/// malformed and the full object should be served; an out-of-bounds start is
/// a hard 416 handled by the caller.
fn parse_range(header: &str, total: i64) -> Option<(u64, u64)> {
    let total = u64::try_from(total).ok()?;
    let spec = header.strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;

    if start.is_empty() {
        // Suffix form: last N bytes.
        let suffix: u64 = end.parse().ok()?;
        if suffix == 0 {
            return None;
        }
        let first = total.saturating_sub(suffix);
        return Some((first, total.saturating_sub(1)));
    }

    let first: u64 = start.parse().ok()?;
    let last: u64 = if end.is_empty() {
        total.saturating_sub(1)
    } else {
        end.parse().ok()?
    };

    Some((first, last.min(total.saturating_sub(1))))
}

fn content_disposition(kind: &Disposition, file_name: &str) -> String {
    let kind = match kind {
        Disposition::Inline => "inline",
        Disposition::Attachment => "attachment",
    };
    let encoded = utf8_percent_encode(file_name, NON_ALPHANUMERIC);
    format!(
        "{}; filename=\"{}\"; filename*=UTF-8''{}",
        kind,
        file_name.replace('"', ""),
        encoded
    )
}

/// Token-addressed streaming download. The token itself is the capability,
/// so there is no auth here; binned or purged tokens are refused. Bytes are
/// forwarded from the blob store in fixed-size chunks, honoring `Range`.
async fn serve(
    state: AppState,
    token: &str,
    disposition: Disposition,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let (token, file) = FileTokens::find_by_id(token)
        .find_also_related(Files)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

    if token.is_delete_init || token.is_deleted {
        return Err(AppError::AlreadyDeleted(
            "File has been deleted by its owner".to_string(),
        ));
    }

    let file = file.ok_or_else(|| AppError::NotFound("File not found".to_string()))?;
    if !file.is_valid() {
        return Err(AppError::NotFound("File upload not finished".to_string()));
    }

    let total = file.file_size;
    let file_name = token
        .change_file_name
        .clone()
        .unwrap_or_else(|| file.original_file_name.clone());
    let content_type = if file.file_type.is_empty() {
        "application/octet-stream".to_string()
    } else {
        file.file_type.clone()
    };

    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_range(v, total));

    if let Some((first, last)) = range {
        if first > last || first as i64 >= total {
            return Ok(Response::builder()
                .status(StatusCode::RANGE_NOT_SATISFIABLE)
                .header(header::CONTENT_RANGE, format!("bytes */{}", total))
                .body(Body::empty())
                .map_err(|e| AppError::Internal(e.to_string()))?);
        }

        let length = last - first + 1;
        let stream = state
            .storage
            .get_object_range(&file.storage_key, first, length)
            .await
            .map_err(|e| AppError::UpstreamStorage(e.to_string()))?;

        let body = Body::from_stream(ReaderStream::with_capacity(stream.reader, STREAM_CHUNK_SIZE));
        return Ok(Response::builder()
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CONTENT_LENGTH, length)
            .header(header::ACCEPT_RANGES, "bytes")
            .header(
                header::CONTENT_RANGE,
                format!("bytes {}-{}/{}", first, last, total),
            )
            .header(
                header::CONTENT_DISPOSITION,
                content_disposition(&disposition, &file_name),
            )
            .body(body)
            .map_err(|e| AppError::Internal(e.to_string()))?);
    }

    let stream = state
        .storage
        .get_object_stream(&file.storage_key)
        .await
        .map_err(|e| AppError::UpstreamStorage(e.to_string()))?;

    let body = Body::from_stream(ReaderStream::with_capacity(stream.reader, STREAM_CHUNK_SIZE));
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, stream.content_length)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition(&disposition, &file_name),
        )
        .body(body)
        .map_err(|e| AppError::Internal(e.to_string()))?)
}

#[utoipa::path(
    get,
    path = "/get/{token}",
    params(("token" = String, Path, description = "Ownership token")),
    responses(
        (status = 200, description = "Full file stream"),
        (status = 206, description = "Partial content for a Range request"),
        (status = 404, description = "Unknown token")
    ),
    tag = "download"
)]
pub async fn download_inline(
    State(state): State<AppState>,
    Path(token): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    serve(state, &token, Disposition::Inline, headers).await
}

#[utoipa::path(
    get,
    path = "/get/d/{token}",
    params(("token" = String, Path, description = "Ownership token")),
    responses(
        (status = 200, description = "Full file stream as attachment"),
        (status = 206, description = "Partial content for a Range request"),
        (status = 404, description = "Unknown token")
    ),
    tag = "download"
)]
pub async fn download_attachment(
    State(state): State<AppState>,
    Path(token): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    serve(state, &token, Disposition::Attachment, headers).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range_basic() {
        assert_eq!(parse_range("bytes=200-499", 1000), Some((200, 499)));
        assert_eq!(parse_range("bytes=0-0", 1000), Some((0, 0)));
    }

    #[test]
    fn test_parse_range_open_ended() {
        assert_eq!(parse_range("bytes=500-", 1000), Some((500, 999)));
        assert_eq!(parse_range("bytes=0-", 1000), Some((0, 999)));
    }

    #[test]
    fn test_parse_range_suffix() {
        assert_eq!(parse_range("bytes=-300", 1000), Some((700, 999)));
    }

    #[test]
    fn test_parse_range_clamps_end() {
        assert_eq!(parse_range("bytes=900-2000", 1000), Some((900, 999)));
    }

    #[test]
    fn test_parse_range_malformed() {
        assert_eq!(parse_range("bites=0-10", 1000), None);
        assert_eq!(parse_range("bytes=abc-def", 1000), None);
        assert_eq!(parse_range("bytes=-0", 1000), None);
    }
}
