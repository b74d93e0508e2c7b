use crate::config::ServiceConfig;
use crate::services::storage::{LocalStorageService, S3StorageService, StorageService};
use aws_sdk_s3::config::Region;
use std::env;
use std::sync::Arc;
use tracing::info;

/// Builds the blob store from config: the S3-compatible backend by default,
/// local disk when `STORAGE_BACKEND=local`.
pub async fn setup_storage(config: &ServiceConfig) -> Arc<dyn StorageService> {
    if config.storage_backend == "local" {
        info!("Local storage backend: {}", config.local_storage_root);
        return Arc::new(LocalStorageService::new(config.local_storage_root.clone()));
    }

    let endpoint_url = env::var("S3_ENDPOINT").expect("S3_ENDPOINT must be set");
    let access_key = env::var("S3_ACCESS_KEY").expect("S3_ACCESS_KEY must be set");
    let secret_key = env::var("S3_SECRET_KEY").expect("S3_SECRET_KEY must be set");
    let bucket = env::var("S3_BUCKET").expect("S3_BUCKET must be set");

    info!("S3 storage: {} (bucket: {})", endpoint_url, bucket);

    let aws_config = aws_config::from_env()
        .endpoint_url(&endpoint_url)
        .region(Region::new("us-east-1"))
        .credentials_provider(aws_sdk_s3::config::Credentials::new(
            access_key, secret_key, None, None, "static",
        ))
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(true)
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);

    match s3_client.head_bucket().bucket(&bucket).send().await {
        Ok(_) => info!("Bucket '{}' is ready", bucket),
        Err(_) => {
            info!("Bucket '{}' not found, creating", bucket);
            if let Err(e) = s3_client.create_bucket().bucket(&bucket).send().await {
                tracing::error!("Failed to create bucket '{}': {}", bucket, e);
            }
        }
    }

    Arc::new(S3StorageService::new(s3_client, bucket))
}
