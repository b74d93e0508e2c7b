use crate::api::error::AppError;
use crate::config::ServiceConfig;
use crate::entities::{prelude::*, *};
use crate::services::file_service::FileService;
use crate::services::storage::{PresignedUpload, StorageService};
use crate::services::token_service::TokenService;
use crate::utils::keyed_mutex::KeyedMutex;
use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// One recorded multipart part. Stored in the session's JSON column so the
/// parts list survives restarts along with the rest of the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPart {
    pub part_number: i32,
    pub etag: String,
}

fn parts_from_json(value: &serde_json::Value) -> Result<Vec<SessionPart>, AppError> {
    serde_json::from_value(value.clone())
        .map_err(|e| AppError::Internal(format!("Corrupt session parts list: {e}")))
}

fn parts_to_json(parts: &[SessionPart]) -> Result<serde_json::Value, AppError> {
    serde_json::to_value(parts).map_err(|e| AppError::Internal(e.to_string()))
}

/// What a client needs to start pushing bytes on the direct path: either
/// presigned fields for the object store, or our own local upload endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct DirectUploadStarted {
    pub file_id: String,
    pub upload_url: String,
    pub fields: std::collections::HashMap<String, String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MultipartStarted {
    pub file_id: String,
}

/// Upload orchestration for all three strategies. Standard is request-scoped;
/// direct and multipart persist an unfinished file row (and, for multipart, a
/// session row) and converge on the same finalize step.
pub struct UploadService {
    db: DatabaseConnection,
    storage: Arc<dyn StorageService>,
    files: FileService,
    part_locks: KeyedMutex,
    config: ServiceConfig,
}

fn upstream(err: anyhow::Error) -> AppError {
    AppError::UpstreamStorage(err.to_string())
}

impl UploadService {
    pub fn new(
        db: DatabaseConnection,
        storage: Arc<dyn StorageService>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            db,
            storage,
            files: FileService::new(config.clone()),
            part_locks: KeyedMutex::new(),
            config,
        }
    }

    /// Shared tail of every strategy: stamp the file finished and hand the
    /// uploader their ownership token. Idempotent, so a duplicate finish
    /// signal returns the existing token instead of minting a second one.
    async fn finalize_upload(
        &self,
        db: &impl ConnectionTrait,
        user_id: &str,
        file: files::Model,
    ) -> Result<file_tokens::Model, AppError> {
        let existing = FileTokens::find()
            .filter(file_tokens::Column::Owner.eq(user_id))
            .filter(file_tokens::Column::FileId.eq(&file.file_id))
            .filter(file_tokens::Column::IsDeleted.eq(false))
            .one(db)
            .await?;
        if let Some(token) = existing {
            self.files.mark_upload_finished(db, file).await?;
            return Ok(token);
        }

        let file = self.files.mark_upload_finished(db, file).await?;
        TokenService::create_for_file(db, user_id, &file, false).await
    }

    async fn find_owned_file(
        &self,
        db: &impl ConnectionTrait,
        user_id: &str,
        file_id: &str,
    ) -> Result<files::Model, AppError> {
        let file = self.files.find_by_id(db, file_id).await?;
        if file.uploaded_by.as_deref() != Some(user_id) {
            return Err(AppError::NotOwner("File is not owned by you".to_string()));
        }
        Ok(file)
    }

    /// Standard single-shot upload: bytes arrive in the request body, the
    /// blob and both rows land together. A storage failure rolls the rows
    /// back, so a rejected upload leaves no trace.
    pub async fn standard(
        &self,
        user_id: &str,
        file_name: &str,
        file_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Result<file_tokens::Model, AppError> {
        let txn = self.db.begin().await?;

        let file = self
            .files
            .create(&txn, user_id, file_name, file_type, bytes.len() as i64, true)
            .await?;

        self.storage
            .put_object(&file.storage_key, bytes)
            .await
            .map_err(upstream)?;

        let token = TokenService::create_for_file(&txn, user_id, &file, false).await?;

        txn.commit().await?;
        tracing::info!("Standard upload finished: file {}", token.file_id);
        Ok(token)
    }

    /// Starts a direct upload: unfinished file row plus an upload descriptor
    /// the client pushes bytes to on its own.
    pub async fn direct_start(
        &self,
        user_id: &str,
        file_name: &str,
        file_type: Option<String>,
        file_size: i64,
    ) -> Result<DirectUploadStarted, AppError> {
        let txn = self.db.begin().await?;

        let file = self
            .files
            .create(&txn, user_id, file_name, file_type, file_size, false)
            .await?;

        let descriptor = self
            .storage
            .presign_upload(&file.storage_key, &file.file_type)
            .await
            .map_err(upstream)?;

        let (upload_url, fields) = match descriptor {
            Some(PresignedUpload { url, fields }) => (url, fields),
            // Local backend has no presign; the client posts to us instead.
            None => (
                format!(
                    "{}/api/files/upload/local/{}",
                    self.config.app_domain, file.file_id
                ),
                Default::default(),
            ),
        };

        let file_id = file.file_id.clone();
        txn.commit().await?;

        Ok(DirectUploadStarted {
            file_id,
            upload_url,
            fields,
        })
    }

    /// Client-confirmed completion of a direct upload. Trusts the signal;
    /// nothing verifies the bytes actually landed.
    pub async fn direct_finish(
        &self,
        user_id: &str,
        file_id: &str,
    ) -> Result<file_tokens::Model, AppError> {
        let txn = self.db.begin().await?;
        let file = self.find_owned_file(&txn, user_id, file_id).await?;
        let token = self.finalize_upload(&txn, user_id, file).await?;
        txn.commit().await?;
        Ok(token)
    }

    /// Direct-path fallback for the local backend: we receive the bytes
    /// ourselves, re-validate the size, then finalize as usual. The size
    /// declared at start is reconciled to the bytes actually received, so
    /// the file row and the token snapshot never disagree with the blob.
    pub async fn upload_local(
        &self,
        user_id: &str,
        file_id: &str,
        bytes: Vec<u8>,
    ) -> Result<file_tokens::Model, AppError> {
        let received = bytes.len() as i64;
        self.files.validate_file_size(received)?;

        let txn = self.db.begin().await?;
        let mut file = self.find_owned_file(&txn, user_id, file_id).await?;
        if file.file_size != received {
            let mut active: files::ActiveModel = file.into();
            active.file_size = Set(received);
            file = active.update(&txn).await?;
        }

        self.storage
            .put_object(&file.storage_key, bytes)
            .await
            .map_err(upstream)?;

        let token = self.finalize_upload(&txn, user_id, file).await?;
        txn.commit().await?;
        Ok(token)
    }

    /// Opens a multipart upload: unfinished file row plus a session row that
    /// carries the storage upload ID and the parts seen so far.
    pub async fn multipart_start(
        &self,
        user_id: &str,
        file_name: &str,
        file_type: Option<String>,
        file_size: i64,
    ) -> Result<MultipartStarted, AppError> {
        let txn = self.db.begin().await?;

        let file = self
            .files
            .create(&txn, user_id, file_name, file_type, file_size, false)
            .await?;

        let init = self
            .storage
            .create_multipart_upload(&file.storage_key)
            .await
            .map_err(upstream)?;

        let now = Utc::now();
        let session = upload_sessions::ActiveModel {
            file_id: Set(file.file_id.clone()),
            user_id: Set(user_id.to_string()),
            storage_key: Set(file.storage_key.clone()),
            upload_id: Set(init.upload_id),
            parts: Set(serde_json::json!([])),
            status: Set(upload_sessions::STATUS_PENDING.to_string()),
            created_at: Set(now),
            expires_at: Set(now + Duration::hours(self.config.upload_session_ttl_hours)),
        };
        session.insert(&txn).await?;

        let file_id = file.file_id.clone();
        txn.commit().await?;

        tracing::info!("Multipart upload started: file {}", file_id);
        Ok(MultipartStarted { file_id })
    }

    async fn find_pending_session(
        db: &impl ConnectionTrait,
        user_id: &str,
        file_id: &str,
    ) -> Result<upload_sessions::Model, AppError> {
        let session = UploadSessions::find_by_id(file_id)
            .lock_exclusive()
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Upload session not found".to_string()))?;

        if session.user_id != user_id {
            return Err(AppError::NotOwner("File is not owned by you".to_string()));
        }
        if session.status != upload_sessions::STATUS_PENDING {
            return Err(AppError::Validation(
                "Upload session is no longer active".to_string(),
            ));
        }
        Ok(session)
    }

    /// Forwards one part and records its ETag. Parts may arrive out of order
    /// and concurrently; the per-file lock plus the row lock keep the parts
    /// list append-consistent.
    pub async fn multipart_upload_part(
        &self,
        user_id: &str,
        file_id: &str,
        part_number: i32,
        bytes: Vec<u8>,
    ) -> Result<String, AppError> {
        let _guard = self.part_locks.lock(file_id).await;

        let session = Self::find_pending_session(&self.db, user_id, file_id).await?;

        let etag = self
            .storage
            .upload_part(&session.storage_key, &session.upload_id, part_number, bytes)
            .await
            .map_err(upstream)?;

        let txn = self.db.begin().await?;
        let session = Self::find_pending_session(&txn, user_id, file_id).await?;

        let mut parts = parts_from_json(&session.parts)?;
        parts.retain(|p| p.part_number != part_number);
        parts.push(SessionPart {
            part_number,
            etag: etag.clone(),
        });

        let mut active: upload_sessions::ActiveModel = session.into();
        active.parts = Set(parts_to_json(&parts)?);
        active.update(&txn).await?;
        txn.commit().await?;

        self.part_locks.cleanup();
        Ok(etag)
    }

    /// Completes the multipart session and finalizes the file. A failed
    /// completion call surfaces as an upstream error and rolls everything
    /// back, leaving the file unfinished so the client can retry or abort.
    pub async fn multipart_finish(
        &self,
        user_id: &str,
        file_id: &str,
    ) -> Result<file_tokens::Model, AppError> {
        let _guard = self.part_locks.lock(file_id).await;

        let txn = self.db.begin().await?;
        let session = Self::find_pending_session(&txn, user_id, file_id).await?;
        let file = self.find_owned_file(&txn, user_id, file_id).await?;

        let mut parts = parts_from_json(&session.parts)?;
        parts.sort_by_key(|p| p.part_number);
        if parts.is_empty() {
            return Err(AppError::Validation(
                "Upload session has no parts".to_string(),
            ));
        }

        self.storage
            .complete_multipart_upload(
                &session.storage_key,
                &session.upload_id,
                parts.into_iter().map(|p| (p.part_number, p.etag)).collect(),
            )
            .await
            .map_err(upstream)?;

        let mut active: upload_sessions::ActiveModel = session.into();
        active.status = Set(upload_sessions::STATUS_COMPLETED.to_string());
        active.update(&txn).await?;

        let token = self.finalize_upload(&txn, user_id, file).await?;

        txn.commit().await?;
        tracing::info!("Multipart upload finished: file {}", file_id);
        Ok(token)
    }

    /// Abandons a multipart upload: storage session aborted, session row and
    /// the never-finished file row removed.
    pub async fn multipart_abort(&self, user_id: &str, file_id: &str) -> Result<(), AppError> {
        let _guard = self.part_locks.lock(file_id).await;

        let txn = self.db.begin().await?;
        let session = Self::find_pending_session(&txn, user_id, file_id).await?;
        let file = self.find_owned_file(&txn, user_id, file_id).await?;

        self.storage
            .abort_multipart_upload(&session.storage_key, &session.upload_id)
            .await
            .map_err(upstream)?;

        session.delete(&txn).await?;
        self.files.delete(&txn, file).await?;

        txn.commit().await?;
        tracing::info!("Multipart upload aborted: file {}", file_id);
        Ok(())
    }

    /// Sweeps sessions past their deadline. Called by the background worker;
    /// storage aborts are best effort, the rows always go.
    pub async fn expire_stale_sessions(&self) -> Result<u64, AppError> {
        let stale = UploadSessions::find()
            .filter(upload_sessions::Column::Status.eq(upload_sessions::STATUS_PENDING))
            .filter(upload_sessions::Column::ExpiresAt.lt(Utc::now()))
            .all(&self.db)
            .await?;

        let mut expired = 0u64;
        for session in stale {
            let _guard = self.part_locks.lock(&session.file_id).await;

            if let Err(err) = self
                .storage
                .abort_multipart_upload(&session.storage_key, &session.upload_id)
                .await
            {
                tracing::warn!(
                    "Abort of expired session {} failed upstream: {}",
                    session.file_id,
                    err
                );
            }

            let txn = self.db.begin().await?;
            let file_id = session.file_id.clone();
            session.delete(&txn).await?;
            if let Ok(file) = self.files.find_by_id(&txn, &file_id).await {
                // Only an unfinished, unreferenced file is swept with its session.
                let referenced = FileTokens::find()
                    .filter(file_tokens::Column::FileId.eq(&file_id))
                    .count(&txn)
                    .await?;
                if !file.is_valid() && referenced == 0 {
                    self.files.delete(&txn, file).await?;
                }
            }
            txn.commit().await?;
            expired += 1;
        }

        if expired > 0 {
            tracing::info!("Expired {} stale upload session(s)", expired);
        }
        self.part_locks.cleanup();
        Ok(expired)
    }
}
