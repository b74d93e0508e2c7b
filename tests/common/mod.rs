use async_trait::async_trait;
use dashmap::DashMap;
use rust_drive_backend::config::ServiceConfig;
use rust_drive_backend::entities::*;
use rust_drive_backend::infrastructure::database;
use rust_drive_backend::services::storage::{
    DownloadStream, MultipartInit, PresignedUpload, StorageService,
};
use rust_drive_backend::utils::auth::create_jwt;
use rust_drive_backend::{AppState, create_app};
use sea_orm::{ActiveModelTrait, Database, Set};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory blob store double. `fail_complete` lets a test force the
/// multipart completion call to error like a flaky upstream.
pub struct MockStorage {
    pub objects: DashMap<String, Vec<u8>>,
    parts: DashMap<String, Vec<(i32, Vec<u8>)>>,
    upload_keys: DashMap<String, String>,
    pub fail_complete: AtomicBool,
}

impl MockStorage {
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
            parts: DashMap::new(),
            upload_keys: DashMap::new(),
            fail_complete: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl StorageService for MockStorage {
    async fn put_object(&self, key: &str, data: Vec<u8>) -> anyhow::Result<()> {
        self.objects.insert(key.to_string(), data);
        Ok(())
    }

    async fn presign_upload(
        &self,
        _key: &str,
        _content_type: &str,
    ) -> anyhow::Result<Option<PresignedUpload>> {
        // Behaves like the local backend: callers fall back to the direct
        // local upload endpoint.
        Ok(None)
    }

    async fn presign_download(&self, key: &str) -> anyhow::Result<String> {
        Ok(format!("http://mock/{key}"))
    }

    async fn create_multipart_upload(&self, key: &str) -> anyhow::Result<MultipartInit> {
        let upload_id = format!("upload-{}", self.upload_keys.len() + 1);
        self.upload_keys
            .insert(upload_id.clone(), key.to_string());
        self.parts.insert(upload_id.clone(), Vec::new());
        Ok(MultipartInit {
            bucket: "mock".to_string(),
            key: key.to_string(),
            upload_id,
        })
    }

    async fn upload_part(
        &self,
        _key: &str,
        upload_id: &str,
        part_number: i32,
        data: Vec<u8>,
    ) -> anyhow::Result<String> {
        let mut parts = self
            .parts
            .get_mut(upload_id)
            .ok_or_else(|| anyhow::anyhow!("unknown upload"))?;
        parts.retain(|(n, _)| *n != part_number);
        parts.push((part_number, data));
        Ok(format!("etag-{part_number}"))
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<(i32, String)>,
    ) -> anyhow::Result<()> {
        if self.fail_complete.load(Ordering::SeqCst) {
            anyhow::bail!("multipart completion rejected");
        }
        let stored = self
            .parts
            .remove(upload_id)
            .ok_or_else(|| anyhow::anyhow!("unknown upload"))?
            .1;
        let mut out = Vec::new();
        for (part_number, _etag) in parts {
            let part = stored
                .iter()
                .find(|(n, _)| *n == part_number)
                .ok_or_else(|| anyhow::anyhow!("missing part {part_number}"))?;
            out.extend_from_slice(&part.1);
        }
        self.objects.insert(key.to_string(), out);
        Ok(())
    }

    async fn abort_multipart_upload(&self, _key: &str, upload_id: &str) -> anyhow::Result<()> {
        self.parts.remove(upload_id);
        Ok(())
    }

    async fn get_object_stream(&self, key: &str) -> anyhow::Result<DownloadStream> {
        let data = self
            .objects
            .get(key)
            .ok_or_else(|| anyhow::anyhow!("object not found"))?
            .clone();
        Ok(DownloadStream {
            content_length: data.len() as i64,
            reader: Box::new(std::io::Cursor::new(data)),
        })
    }

    async fn get_object_range(
        &self,
        key: &str,
        start: u64,
        length: u64,
    ) -> anyhow::Result<DownloadStream> {
        let data = self
            .objects
            .get(key)
            .ok_or_else(|| anyhow::anyhow!("object not found"))?
            .clone();
        let start = start as usize;
        let end = (start + length as usize).min(data.len());
        let slice = data[start..end].to_vec();
        Ok(DownloadStream {
            content_length: slice.len() as i64,
            reader: Box::new(std::io::Cursor::new(slice)),
        })
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.objects.remove(key);
        Ok(())
    }
}

pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        max_file_size: 10 * 1024 * 1024,
        cpm_rate: 2.0,
        jwt_secret: "secret".to_string(),
        ..ServiceConfig::default()
    }
}

pub async fn setup_app() -> (axum::Router, AppState, Arc<MockStorage>) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    database::run_migrations(&db).await.unwrap();

    let storage = Arc::new(MockStorage::new());
    let state = AppState::new(db, storage.clone(), test_config());
    (create_app(state.clone()), state, storage)
}

/// Inserts a user row and mints a bearer token for it.
pub async fn seed_user(state: &AppState, id: &str, email: &str) -> String {
    let user = users::ActiveModel {
        id: Set(id.to_string()),
        email: Set(email.to_string()),
        name: Set(format!("User {id}")),
        referred_by: Set(None),
        last_views: Set(0),
        last_earnings: Set(0.0),
        last_payout_on: Set(None),
        created_at: Set(Some(chrono::Utc::now())),
    };
    user.insert(&state.db).await.unwrap();

    create_jwt(id, &state.config.jwt_secret).unwrap()
}

pub fn multipart_body(boundary: &str, file_name: &str, content_type: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
             Content-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}
