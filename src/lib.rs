pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::config::ServiceConfig;
use crate::services::listing_service::ListingService;
use crate::services::stats_service::StatsService;
use crate::services::storage::StorageService;
use crate::services::token_service::TokenService;
use crate::services::upload_service::UploadService;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post, put},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::health_check,
        api::handlers::files::upload::standard_upload,
        api::handlers::files::upload::direct_start,
        api::handlers::files::upload::direct_finish,
        api::handlers::files::upload::upload_local,
        api::handlers::files::upload::multipart_start,
        api::handlers::files::upload::multipart_upload_part,
        api::handlers::files::upload::multipart_finish,
        api::handlers::files::upload::multipart_abort,
        api::handlers::files::manage::delete_file,
        api::handlers::files::manage::restore_files,
        api::handlers::files::manage::copy_file,
        api::handlers::files::manage::favourite_file,
        api::handlers::files::manage::unfavourite_file,
        api::handlers::files::manage::rename_file,
        api::handlers::files::manage::update_views,
        api::handlers::files::manage::empty_recycle_bin,
        api::handlers::files::list::list_files,
        api::handlers::files::list::list_shared,
        api::handlers::files::list::list_recycle_bin,
        api::handlers::files::list::list_favourites,
        api::handlers::files::list::list_category,
        api::handlers::files::list::top_viewed,
        api::handlers::files::list::file_details,
        api::handlers::files::list::storage_stats,
        api::handlers::files::list::earnings,
        api::handlers::files::download::download_inline,
        api::handlers::files::download::download_attachment,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
            api::handlers::files::TokenResponse,
            api::handlers::files::MessageResponse,
            api::handlers::files::upload::StartUploadRequest,
            api::handlers::files::upload::UploadPartResponse,
            api::handlers::files::manage::RestoreRequest,
            api::handlers::files::manage::RenameRequest,
            api::handlers::files::manage::EmptyBinResponse,
            services::listing_service::FileCategory,
            services::listing_service::FileListItem,
            services::listing_service::FileDetails,
            services::listing_service::TopViewedItem,
            services::stats_service::StorageStats,
            services::stats_service::Earnings,
            services::upload_service::DirectUploadStarted,
            services::upload_service::MultipartStarted,
        )
    ),
    tags(
        (name = "upload", description = "Upload strategies"),
        (name = "files", description = "Token lifecycle and listings"),
        (name = "stats", description = "Usage and earnings read-models"),
        (name = "download", description = "Token-addressed downloads")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub storage: Arc<dyn StorageService>,
    pub uploads: Arc<UploadService>,
    pub tokens: Arc<TokenService>,
    pub listings: Arc<ListingService>,
    pub stats: Arc<StatsService>,
    pub config: ServiceConfig,
}

impl AppState {
    pub fn new(
        db: DatabaseConnection,
        storage: Arc<dyn StorageService>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            uploads: Arc::new(UploadService::new(
                db.clone(),
                storage.clone(),
                config.clone(),
            )),
            tokens: Arc::new(TokenService::new(db.clone())),
            listings: Arc::new(ListingService::new(db.clone())),
            stats: Arc::new(StatsService::new(db.clone(), config.clone())),
            db,
            storage,
            config,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let cors = if state.config.allowed_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(
                state
                    .config
                    .allowed_origins
                    .iter()
                    .filter_map(|o| o.parse::<axum::http::HeaderValue>().ok())
                    .collect::<Vec<_>>(),
            )
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any)
    };

    // Standard uploads carry multipart framing on top of the payload.
    let body_limit = state.config.max_file_size as usize + 10 * 1024 * 1024;

    let authed = Router::new()
        .route(
            "/api/files/upload",
            post(api::handlers::files::upload::standard_upload)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route(
            "/api/files/upload/direct/start",
            post(api::handlers::files::upload::direct_start),
        )
        .route(
            "/api/files/upload/direct/finish/:file_id",
            post(api::handlers::files::upload::direct_finish),
        )
        .route(
            "/api/files/upload/local/:file_id",
            post(api::handlers::files::upload::upload_local)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route(
            "/api/files/upload/multipart/start",
            post(api::handlers::files::upload::multipart_start),
        )
        .route(
            "/api/files/upload/multipart/:file_id/parts/:part_number",
            put(api::handlers::files::upload::multipart_upload_part)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route(
            "/api/files/upload/multipart/:file_id/finish",
            post(api::handlers::files::upload::multipart_finish),
        )
        .route(
            "/api/files/upload/multipart/:file_id",
            delete(api::handlers::files::upload::multipart_abort),
        )
        .route("/api/files", get(api::handlers::files::list::list_files))
        .route(
            "/api/files/shared",
            get(api::handlers::files::list::list_shared),
        )
        .route(
            "/api/files/bin",
            get(api::handlers::files::list::list_recycle_bin)
                .delete(api::handlers::files::manage::empty_recycle_bin),
        )
        .route(
            "/api/files/favourites",
            get(api::handlers::files::list::list_favourites),
        )
        .route(
            "/api/files/category/:category",
            get(api::handlers::files::list::list_category),
        )
        .route("/api/files/top", get(api::handlers::files::list::top_viewed))
        .route(
            "/api/files/details/:token",
            get(api::handlers::files::list::file_details),
        )
        .route(
            "/api/files/stats",
            get(api::handlers::files::list::storage_stats),
        )
        .route(
            "/api/files/earnings",
            get(api::handlers::files::list::earnings),
        )
        .route(
            "/api/files/restore",
            post(api::handlers::files::manage::restore_files),
        )
        .route(
            "/api/files/:token",
            delete(api::handlers::files::manage::delete_file),
        )
        .route(
            "/api/files/:token/copy",
            post(api::handlers::files::manage::copy_file),
        )
        .route(
            "/api/files/:token/favourite",
            post(api::handlers::files::manage::favourite_file)
                .delete(api::handlers::files::manage::unfavourite_file),
        )
        .route(
            "/api/files/:token/rename",
            patch(api::handlers::files::manage::rename_file),
        )
        .route(
            "/api/files/:token/views",
            post(api::handlers::files::manage::update_views),
        )
        .layer(from_fn_with_state(
            state.clone(),
            api::middleware::auth::auth_middleware,
        ));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/get/:token",
            get(api::handlers::files::download::download_inline),
        )
        .route(
            "/get/d/:token",
            get(api::handlers::files::download::download_attachment),
        )
        .merge(authed)
        .layer(cors)
        .with_state(state)
}
