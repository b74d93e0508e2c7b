use crate::services::upload_service::UploadService;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, sleep};

/// Periodic sweeper for abandoned multipart upload sessions. A session the
/// client walked away from would otherwise hold an open storage upload and
/// its unfinished file row forever.
pub struct BackgroundWorker {
    uploads: Arc<UploadService>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl BackgroundWorker {
    pub fn new(uploads: Arc<UploadService>, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            uploads,
            interval: Duration::from_secs(3600),
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!("Background worker started");

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("Background worker shutting down");
                    break;
                }
                _ = sleep(self.interval) => {
                    self.sweep().await;
                }
            }
        }
    }

    async fn sweep(&self) {
        tracing::debug!("Running upload session sweep");
        if let Err(e) = self.uploads.expire_stale_sessions().await {
            tracing::error!("Upload session sweep failed: {}", e);
        }
    }
}
