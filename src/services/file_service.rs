use crate::api::error::AppError;
use crate::config::ServiceConfig;
use crate::entities::{prelude::*, *};
use crate::utils::ident;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, Set,
};

/// Owns the canonical `files` record: one row per physical upload.
pub struct FileService {
    config: ServiceConfig,
}

fn bytes_to_mib(value: i64) -> f64 {
    value as f64 * 9.536_743_164_062_5e-7
}

/// MIME type from the filename extension; empty when unknown, matching the
/// original behavior of storing an empty type rather than a catch-all.
pub fn guess_file_type(file_name: &str) -> String {
    let extension = file_name.rsplit('.').next().unwrap_or("").to_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "pdf" => "application/pdf",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "json" => "application/json",
        "zip" => "application/zip",
        _ => "",
    }
    .to_string()
}

impl FileService {
    pub fn new(config: ServiceConfig) -> Self {
        Self { config }
    }

    /// Rejects payloads above the configured maximum, reporting the limit in
    /// MiB as the caller-facing reason.
    pub fn validate_file_size(&self, file_size: i64) -> Result<(), AppError> {
        if file_size > self.config.max_file_size {
            return Err(AppError::PayloadTooLarge(format!(
                "File is too large. It should not exceed {:.1} MiB",
                bytes_to_mib(self.config.max_file_size)
            )));
        }
        Ok(())
    }

    /// Random storage name keeps keys collision-free regardless of the
    /// user-supplied filename.
    fn generate_storage_key(file_type: &str, file_name: &str) -> String {
        let extension = match file_name.rsplit_once('.') {
            Some((_, ext)) => format!(".{}", ext),
            None => String::new(),
        };
        format!(
            "files/{}/{}{}",
            file_type,
            uuid::Uuid::new_v4().simple(),
            extension
        )
    }

    /// Creates the canonical file row. `finished` distinguishes the
    /// synchronous path (standard upload, bytes already stored) from the
    /// async paths (direct/multipart, upload still in flight).
    pub async fn create(
        &self,
        db: &impl ConnectionTrait,
        uploaded_by: &str,
        file_name: &str,
        file_type: Option<String>,
        file_size: i64,
        finished: bool,
    ) -> Result<files::Model, AppError> {
        self.validate_file_size(file_size)?;

        let file_type = match file_type {
            Some(t) if !t.is_empty() => t,
            _ => guess_file_type(file_name),
        };
        let storage_key = Self::generate_storage_key(&file_type, file_name);

        let file = files::ActiveModel {
            file_id: Set(ident::generate_id()),
            storage_key: Set(storage_key),
            original_file_name: Set(file_name.to_string()),
            file_type: Set(file_type),
            file_size: Set(file_size),
            created_at: Set(Some(Utc::now())),
            upload_finished_at: Set(finished.then(Utc::now)),
            uploaded_by: Set(Some(uploaded_by.to_string())),
            is_delete_init: Set(false),
            delete_init_at: Set(None),
        };

        Ok(file.insert(db).await?)
    }

    pub async fn find_by_id(
        &self,
        db: &impl ConnectionTrait,
        file_id: &str,
    ) -> Result<files::Model, AppError> {
        Files::find_by_id(file_id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))
    }

    /// Marks the upload complete. Calling twice simply refreshes the
    /// timestamp; the file is "valid" whenever the timestamp is set.
    pub async fn mark_upload_finished(
        &self,
        db: &impl ConnectionTrait,
        file: files::Model,
    ) -> Result<files::Model, AppError> {
        let mut active: files::ActiveModel = file.into();
        active.upload_finished_at = Set(Some(Utc::now()));
        Ok(active.update(db).await?)
    }

    pub async fn soft_delete(
        &self,
        db: &impl ConnectionTrait,
        file: files::Model,
    ) -> Result<files::Model, AppError> {
        let mut active: files::ActiveModel = file.into();
        active.is_delete_init = Set(true);
        active.delete_init_at = Set(Some(Utc::now()));
        Ok(active.update(db).await?)
    }

    pub async fn restore(
        &self,
        db: &impl ConnectionTrait,
        file: files::Model,
    ) -> Result<files::Model, AppError> {
        let mut active: files::ActiveModel = file.into();
        active.is_delete_init = Set(false);
        active.delete_init_at = Set(None);
        Ok(active.update(db).await?)
    }

    /// Removes the file row. Refused while any non-purged token still
    /// references it; the store enforces this, not the caller.
    pub async fn delete(
        &self,
        db: &impl ConnectionTrait,
        file: files::Model,
    ) -> Result<(), AppError> {
        let referencing = FileTokens::find()
            .filter(file_tokens::Column::FileId.eq(&file.file_id))
            .filter(file_tokens::Column::IsDeleted.eq(false))
            .count(db)
            .await?;

        if referencing > 0 {
            return Err(AppError::ReferentialIntegrity(format!(
                "File {} is still referenced by {} token(s)",
                file.file_id, referencing
            )));
        }

        file.delete(db).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_to_mib() {
        assert_eq!(bytes_to_mib(1024 * 1024), 1.0);
        assert_eq!(bytes_to_mib(10 * 1024 * 1024), 10.0);
    }

    #[test]
    fn test_guess_file_type() {
        assert_eq!(guess_file_type("photo.JPG"), "image/jpeg");
        assert_eq!(guess_file_type("report.pdf"), "application/pdf");
        assert_eq!(
            guess_file_type("slides.pptx"),
            "application/vnd.openxmlformats-officedocument.presentationml.presentation"
        );
        assert_eq!(guess_file_type("mystery.bin"), "");
        assert_eq!(guess_file_type("no_extension"), "");
    }

    #[test]
    fn test_storage_key_keeps_extension() {
        let key = FileService::generate_storage_key("image/png", "cat.png");
        assert!(key.starts_with("files/image/png/"));
        assert!(key.ends_with(".png"));

        let bare = FileService::generate_storage_key("", "README");
        assert!(!bare.contains('.'));
    }

    #[test]
    fn test_size_limit_message_reports_mib() {
        let service = FileService::new(crate::config::ServiceConfig {
            max_file_size: 10 * 1024 * 1024,
            ..Default::default()
        });
        assert!(service.validate_file_size(5 * 1024 * 1024).is_ok());
        let err = service.validate_file_size(15 * 1024 * 1024).unwrap_err();
        match err {
            AppError::PayloadTooLarge(msg) => assert!(msg.contains("10.0 MiB")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
