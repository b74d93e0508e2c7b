use std::env;

/// Service configuration for uploads, quotas and earnings
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Maximum file size in bytes (default: 256 MiB)
    pub max_file_size: i64,

    /// Storage quota per user in bytes (default: 15 GiB)
    pub storage_per_user: i64,

    /// Earnings rate per 1000 views (default: 2.0)
    pub cpm_rate: f64,

    /// Storage backend: "s3" or "local" (default: "s3")
    pub storage_backend: String,

    /// Root directory for the local storage backend
    pub local_storage_root: String,

    /// Public domain used to build local upload URLs
    pub app_domain: String,

    /// Lifetime of a multipart upload session in hours (default: 24)
    pub upload_session_ttl_hours: i64,

    /// JWT Secret Key (Required in production)
    pub jwt_secret: String,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_file_size: 256 * 1024 * 1024,
            storage_per_user: 15 * 1024 * 1024 * 1024,
            cpm_rate: 2.0,
            storage_backend: "s3".to_string(),
            local_storage_root: "./data".to_string(),
            app_domain: "http://localhost:3000".to_string(),
            upload_session_ttl_hours: 24,
            jwt_secret: "secret".to_string(),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            storage_per_user: env::var("STORAGE_PER_USER")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.storage_per_user),

            cpm_rate: env::var("CPM_RATE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.cpm_rate),

            storage_backend: env::var("STORAGE_BACKEND").unwrap_or(default.storage_backend),

            local_storage_root: env::var("LOCAL_STORAGE_ROOT")
                .unwrap_or(default.local_storage_root),

            app_domain: env::var("APP_DOMAIN").unwrap_or(default.app_domain),

            upload_session_ttl_hours: env::var("UPLOAD_SESSION_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.upload_session_ttl_hours),

            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| "secret".to_string()),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Create config for development (small limits, local backend)
    pub fn development() -> Self {
        Self {
            max_file_size: 256 * 1024 * 1024,
            storage_backend: "local".to_string(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();
        assert_eq!(config.max_file_size, 256 * 1024 * 1024);
        assert_eq!(config.storage_per_user, 15 * 1024 * 1024 * 1024);
        assert_eq!(config.cpm_rate, 2.0);
        assert_eq!(config.storage_backend, "s3");
    }

    #[test]
    fn test_development_config() {
        let config = ServiceConfig::development();
        assert_eq!(config.storage_backend, "local");
        assert_eq!(config.upload_session_ttl_hours, 24);
    }

    #[test]
    fn test_from_env_cors_fallback() {
        unsafe { env::remove_var("ALLOWED_ORIGINS") };
        let config = ServiceConfig::from_env();
        let default_config = ServiceConfig::default();
        assert_eq!(config.allowed_origins, default_config.allowed_origins);
        assert!(!config.allowed_origins.contains(&"*".to_string()));
    }
}
