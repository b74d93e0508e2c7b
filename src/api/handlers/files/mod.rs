pub mod download;
pub mod list;
pub mod manage;
pub mod upload;

use crate::entities::file_tokens;
use serde::Serialize;
use utoipa::ToSchema;

/// The client-facing shape of an ownership token, returned by every upload
/// strategy and by copy.
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
    pub file_id: String,
    pub file_type: String,
    pub file_size: i64,
    pub parent: String,
}

impl From<file_tokens::Model> for TokenResponse {
    fn from(model: file_tokens::Model) -> Self {
        Self {
            token: model.token,
            file_id: model.file_id,
            file_type: model.file_type,
            file_size: model.file_size,
            parent: model.parent,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
