mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{multipart_body, seed_user, setup_app};
use http_body_util::BodyExt;
use rust_drive_backend::entities::{prelude::*, *};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use serde_json::Value;
use std::sync::atomic::Ordering;
use tower::ServiceExt;

const BOUNDARY: &str = "---------------------------123456789012345678901234567";

async fn body_json(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

fn standard_upload_request(auth: &str, file_name: &str, content: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/files/upload")
        .header("Authorization", format!("Bearer {auth}"))
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(
            BOUNDARY,
            file_name,
            "text/plain",
            content,
        )))
        .unwrap()
}

#[tokio::test]
async fn test_standard_upload_creates_file_and_token() {
    let (app, state, storage) = setup_app().await;
    let auth = seed_user(&state, "user_1", "u1@example.com").await;

    let response = app
        .oneshot(standard_upload_request(&auth, "notes.txt", b"hello world"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let token_id = json["token"].as_str().unwrap();
    assert_eq!(json["file_size"], 11);
    assert_eq!(json["file_type"], "text/plain");
    assert_eq!(json["parent"], "*");

    let token = FileTokens::find_by_id(token_id)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(token.owner, "user_1");
    assert!(!token.is_copied);

    let file = Files::find_by_id(&token.file_id)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert!(file.is_valid());
    assert_eq!(file.original_file_name, "notes.txt");
    assert_eq!(
        storage.objects.get(&file.storage_key).unwrap().as_slice(),
        b"hello world"
    );
}

#[tokio::test]
async fn test_standard_upload_rejects_oversize_and_persists_nothing() {
    let (app, state, _storage) = setup_app().await;
    let auth = seed_user(&state, "user_1", "u1@example.com").await;

    // One byte over the 10 MiB test limit.
    let content = vec![b'a'; 10 * 1024 * 1024 + 1];
    let response = app
        .oneshot(standard_upload_request(&auth, "big.txt", &content))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("10.0 MiB"));

    assert_eq!(Files::find().count(&state.db).await.unwrap(), 0);
    assert_eq!(FileTokens::find().count(&state.db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_direct_upload_local_fallback_flow() {
    let (app, state, storage) = setup_app().await;
    let auth = seed_user(&state, "user_1", "u1@example.com").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/files/upload/direct/start")
                .header("Authorization", format!("Bearer {auth}"))
                .header("Content-Type", "application/json")
                .body(Body::from(
                    r#"{"file_name":"photo.png","file_size":5}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let file_id = json["file_id"].as_str().unwrap().to_string();
    // Mock storage has no presign support, so the URL points back at us.
    assert!(json["upload_url"]
        .as_str()
        .unwrap()
        .contains(&format!("/api/files/upload/local/{file_id}")));

    let file = Files::find_by_id(&file_id)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert!(!file.is_valid());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/files/upload/local/{file_id}"))
                .header("Authorization", format!("Bearer {auth}"))
                .body(Body::from(&b"12345"[..]))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["file_id"], file_id);

    let file = Files::find_by_id(&file_id)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert!(file.is_valid());
    assert_eq!(storage.objects.get(&file.storage_key).unwrap().len(), 5);
}

#[tokio::test]
async fn test_multipart_upload_roundtrip() {
    let (app, state, storage) = setup_app().await;
    let auth = seed_user(&state, "user_1", "u1@example.com").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/files/upload/multipart/start")
                .header("Authorization", format!("Bearer {auth}"))
                .header("Content-Type", "application/json")
                .body(Body::from(
                    r#"{"file_name":"big.bin","file_size":10}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let file_id = body_json(response).await["file_id"]
        .as_str()
        .unwrap()
        .to_string();

    // Parts pushed out of order on purpose.
    for (part_number, chunk) in [(2, &b"world"[..]), (1, &b"hello"[..])] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri(format!(
                        "/api/files/upload/multipart/{file_id}/parts/{part_number}"
                    ))
                    .header("Authorization", format!("Bearer {auth}"))
                    .body(Body::from(chunk))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/files/upload/multipart/{file_id}/finish"))
                .header("Authorization", format!("Bearer {auth}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["file_id"], file_id);

    let file = Files::find_by_id(&file_id)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert!(file.is_valid());
    assert_eq!(
        storage.objects.get(&file.storage_key).unwrap().as_slice(),
        b"helloworld"
    );

    let session = UploadSessions::find_by_id(&file_id)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.status, upload_sessions::STATUS_COMPLETED);
}

#[tokio::test]
async fn test_multipart_finish_failure_leaves_file_unfinished() {
    let (app, state, storage) = setup_app().await;
    let auth = seed_user(&state, "user_1", "u1@example.com").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/files/upload/multipart/start")
                .header("Authorization", format!("Bearer {auth}"))
                .header("Content-Type", "application/json")
                .body(Body::from(
                    r#"{"file_name":"big.bin","file_size":5}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    let file_id = body_json(response).await["file_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/api/files/upload/multipart/{file_id}/parts/1"))
                .header("Authorization", format!("Bearer {auth}"))
                .body(Body::from(&b"hello"[..]))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    storage.fail_complete.store(true, Ordering::SeqCst);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/files/upload/multipart/{file_id}/finish"))
                .header("Authorization", format!("Bearer {auth}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    // Nothing was finalized: file still pending, no token minted, session
    // still open for a retry.
    let file = Files::find_by_id(&file_id)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert!(!file.is_valid());
    assert_eq!(
        FileTokens::find()
            .filter(file_tokens::Column::FileId.eq(&file_id))
            .count(&state.db)
            .await
            .unwrap(),
        0
    );
    let session = UploadSessions::find_by_id(&file_id)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.status, upload_sessions::STATUS_PENDING);
}

#[tokio::test]
async fn test_upload_local_reconciles_declared_size() {
    let (app, state, storage) = setup_app().await;
    let auth = seed_user(&state, "user_1", "u1@example.com").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/files/upload/direct/start")
                .header("Authorization", format!("Bearer {auth}"))
                .header("Content-Type", "application/json")
                .body(Body::from(
                    r#"{"file_name":"clip.mp4","file_size":5000}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let file_id = body_json(response).await["file_id"]
        .as_str()
        .unwrap()
        .to_string();

    // Client declared 5000 bytes but posts 3.
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/files/upload/local/{file_id}"))
                .header("Authorization", format!("Bearer {auth}"))
                .body(Body::from(&b"abc"[..]))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["file_size"], 3);

    let file = Files::find_by_id(&file_id)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(file.file_size, 3);
    assert_eq!(storage.objects.get(&file.storage_key).unwrap().len(), 3);
}

async fn start_multipart(app: &axum::Router, auth: &str, body: &str) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/files/upload/multipart/start")
                .header("Authorization", format!("Bearer {auth}"))
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["file_id"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_multipart_abort_removes_session_and_file() {
    let (app, state, _storage) = setup_app().await;
    let auth = seed_user(&state, "user_1", "u1@example.com").await;
    let file_id =
        start_multipart(&app, &auth, r#"{"file_name":"big.bin","file_size":10}"#).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/api/files/upload/multipart/{file_id}/parts/1"))
                .header("Authorization", format!("Bearer {auth}"))
                .body(Body::from(&b"hello"[..]))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/files/upload/multipart/{file_id}"))
                .header("Authorization", format!("Bearer {auth}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert!(UploadSessions::find_by_id(&file_id)
        .one(&state.db)
        .await
        .unwrap()
        .is_none());
    assert!(Files::find_by_id(&file_id)
        .one(&state.db)
        .await
        .unwrap()
        .is_none());

    // The aborted session no longer accepts parts.
    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/api/files/upload/multipart/{file_id}/parts/2"))
                .header("Authorization", format!("Bearer {auth}"))
                .body(Body::from(&b"late"[..]))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_expired_sessions_are_swept() {
    let (app, state, storage) = setup_app().await;
    let auth = seed_user(&state, "user_1", "u1@example.com").await;

    // An abandoned pending session past its deadline.
    let abandoned =
        start_multipart(&app, &auth, r#"{"file_name":"stale.bin","file_size":5}"#).await;
    let session = UploadSessions::find_by_id(&abandoned)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    let mut active: upload_sessions::ActiveModel = session.into();
    active.expires_at = Set(chrono::Utc::now() - chrono::Duration::hours(1));
    active.update(&state.db).await.unwrap();

    // A finished upload whose completed session is just as old.
    let finished =
        start_multipart(&app, &auth, r#"{"file_name":"done.bin","file_size":5}"#).await;
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/api/files/upload/multipart/{finished}/parts/1"))
                .header("Authorization", format!("Bearer {auth}"))
                .body(Body::from(&b"hello"[..]))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/files/upload/multipart/{finished}/finish"))
                .header("Authorization", format!("Bearer {auth}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let session = UploadSessions::find_by_id(&finished)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    let mut active: upload_sessions::ActiveModel = session.into();
    active.expires_at = Set(chrono::Utc::now() - chrono::Duration::hours(1));
    active.update(&state.db).await.unwrap();

    let swept = state.uploads.expire_stale_sessions().await.unwrap();
    assert_eq!(swept, 1);

    // The abandoned session and its never-finished file are gone.
    assert!(UploadSessions::find_by_id(&abandoned)
        .one(&state.db)
        .await
        .unwrap()
        .is_none());
    assert!(Files::find_by_id(&abandoned)
        .one(&state.db)
        .await
        .unwrap()
        .is_none());

    // The finished upload keeps its file, token and blob.
    let file = Files::find_by_id(&finished)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert!(file.is_valid());
    assert!(storage.objects.contains_key(&file.storage_key));
    assert_eq!(
        FileTokens::find()
            .filter(file_tokens::Column::FileId.eq(&finished))
            .count(&state.db)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_upload_requires_auth() {
    let (app, _state, _storage) = setup_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/files/upload")
                .header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(multipart_body(
                    BOUNDARY,
                    "x.txt",
                    "text/plain",
                    b"x",
                )))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
