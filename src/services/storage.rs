use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};

/// Descriptor for a client-driven upload: either presigned POST fields for
/// the object store, or empty fields when the URL is a direct local endpoint.
#[derive(Debug, Clone)]
pub struct PresignedUpload {
    pub url: String,
    pub fields: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct MultipartInit {
    pub bucket: String,
    pub key: String,
    pub upload_id: String,
}

/// Backend-neutral download handle. The reader yields the object bytes
/// incrementally; nothing is buffered beyond the transport's own chunks.
pub struct DownloadStream {
    pub content_length: i64,
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
}

#[async_trait]
pub trait StorageService: Send + Sync {
    async fn put_object(&self, key: &str, data: Vec<u8>) -> Result<()>;
    /// Presigned upload descriptor, or `None` when the backend has no
    /// presign support (local disk) and the caller must fall back to a
    /// direct upload URL.
    async fn presign_upload(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<Option<PresignedUpload>>;
    async fn presign_download(&self, key: &str) -> Result<String>;
    async fn create_multipart_upload(&self, key: &str) -> Result<MultipartInit>;
    /// Uploads one part, returning its ETag.
    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Vec<u8>,
    ) -> Result<String>;
    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<(i32, String)>,
    ) -> Result<()>;
    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> Result<()>;
    async fn get_object_stream(&self, key: &str) -> Result<DownloadStream>;
    /// Streams `length` bytes starting at `start`.
    async fn get_object_range(&self, key: &str, start: u64, length: u64)
    -> Result<DownloadStream>;
    async fn delete_object(&self, key: &str) -> Result<()>;
}

pub struct S3StorageService {
    client: Client,
    bucket: String,
}

impl S3StorageService {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl StorageService for S3StorageService {
    async fn put_object(&self, key: &str, data: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await?;
        Ok(())
    }

    async fn presign_upload(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<Option<PresignedUpload>> {
        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(PresigningConfig::expires_in(Duration::from_secs(3600))?)
            .await?;

        let fields = presigned
            .headers()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Ok(Some(PresignedUpload {
            url: presigned.uri().to_string(),
            fields,
        }))
    }

    async fn presign_download(&self, key: &str) -> Result<String> {
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(PresigningConfig::expires_in(Duration::from_secs(3600))?)
            .await?;
        Ok(presigned.uri().to_string())
    }

    async fn create_multipart_upload(&self, key: &str) -> Result<MultipartInit> {
        let res = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;

        let upload_id = res
            .upload_id()
            .ok_or_else(|| anyhow::anyhow!("No upload ID returned"))?
            .to_string();

        Ok(MultipartInit {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            upload_id,
        })
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Vec<u8>,
    ) -> Result<String> {
        let res = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(data))
            .send()
            .await?;

        Ok(res.e_tag().unwrap_or_default().to_string())
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<(i32, String)>,
    ) -> Result<()> {
        let completed_parts: Vec<CompletedPart> = parts
            .into_iter()
            .map(|(part_number, e_tag)| {
                CompletedPart::builder()
                    .part_number(part_number)
                    .e_tag(e_tag)
                    .build()
            })
            .collect();

        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed)
            .send()
            .await?;
        Ok(())
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> Result<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await?;
        Ok(())
    }

    async fn get_object_stream(&self, key: &str) -> Result<DownloadStream> {
        let res = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;

        Ok(DownloadStream {
            content_length: res.content_length().unwrap_or(0),
            reader: Box::new(res.body.into_async_read()),
        })
    }

    async fn get_object_range(
        &self,
        key: &str,
        start: u64,
        length: u64,
    ) -> Result<DownloadStream> {
        let end = start + length - 1;
        let res = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .range(format!("bytes={}-{}", start, end))
            .send()
            .await?;

        Ok(DownloadStream {
            content_length: res.content_length().unwrap_or(length as i64),
            reader: Box::new(res.body.into_async_read()),
        })
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;
        Ok(())
    }
}

/// Local-disk backend. Multipart parts are staged as sibling files and
/// concatenated on completion; "presigned" uploads are not supported, so the
/// upload orchestrator hands out a direct local upload URL instead.
pub struct LocalStorageService {
    root: PathBuf,
}

impl LocalStorageService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn part_path(&self, key: &str, upload_id: &str, part_number: i32) -> PathBuf {
        self.root
            .join(".parts")
            .join(upload_id)
            .join(format!("{}.{}", key.replace('/', "_"), part_number))
    }
}

#[async_trait]
impl StorageService for LocalStorageService {
    async fn put_object(&self, key: &str, data: Vec<u8>) -> Result<()> {
        let path = self.object_path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, data).await?;
        Ok(())
    }

    async fn presign_upload(
        &self,
        _key: &str,
        _content_type: &str,
    ) -> Result<Option<PresignedUpload>> {
        Ok(None)
    }

    async fn presign_download(&self, key: &str) -> Result<String> {
        Ok(format!("file://{}", self.object_path(key).display()))
    }

    async fn create_multipart_upload(&self, key: &str) -> Result<MultipartInit> {
        let upload_id = uuid::Uuid::new_v4().to_string();
        tokio::fs::create_dir_all(self.root.join(".parts").join(&upload_id)).await?;
        Ok(MultipartInit {
            bucket: self.root.display().to_string(),
            key: key.to_string(),
            upload_id,
        })
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Vec<u8>,
    ) -> Result<String> {
        let path = self.part_path(key, upload_id, part_number);
        tokio::fs::write(path, &data).await?;
        // Stable pseudo-etag so completion bookkeeping works the same as S3
        Ok(format!("local-{}-{}", upload_id, part_number))
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        mut parts: Vec<(i32, String)>,
    ) -> Result<()> {
        parts.sort_by_key(|(n, _)| *n);

        let path = self.object_path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut out = Vec::new();
        for (part_number, _) in &parts {
            let part = tokio::fs::read(self.part_path(key, upload_id, *part_number)).await?;
            out.extend_from_slice(&part);
        }
        tokio::fs::write(path, out).await?;

        tokio::fs::remove_dir_all(self.root.join(".parts").join(upload_id))
            .await
            .ok();
        Ok(())
    }

    async fn abort_multipart_upload(&self, _key: &str, upload_id: &str) -> Result<()> {
        tokio::fs::remove_dir_all(self.root.join(".parts").join(upload_id))
            .await
            .ok();
        Ok(())
    }

    async fn get_object_stream(&self, key: &str) -> Result<DownloadStream> {
        let path = self.object_path(key);
        let meta = tokio::fs::metadata(&path).await?;
        let file = tokio::fs::File::open(path).await?;

        Ok(DownloadStream {
            content_length: meta.len() as i64,
            reader: Box::new(file),
        })
    }

    async fn get_object_range(
        &self,
        key: &str,
        start: u64,
        length: u64,
    ) -> Result<DownloadStream> {
        let path = self.object_path(key);
        let mut file = tokio::fs::File::open(path).await?;
        file.seek(std::io::SeekFrom::Start(start)).await?;

        Ok(DownloadStream {
            content_length: length as i64,
            reader: Box::new(file.take(length)),
        })
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        tokio::fs::remove_file(self.object_path(key)).await?;
        Ok(())
    }
}
