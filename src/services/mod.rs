pub mod file_service;
pub mod listing_service;
pub mod stats_service;
pub mod storage;
pub mod token_service;
pub mod upload_service;
pub mod worker;
