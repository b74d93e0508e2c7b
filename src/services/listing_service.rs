use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const OOXML_PREFIX: &str = "application/vnd.openxmlformats-officedocument.";

/// MIME categories used by the per-category listings and the stats counters.
/// Together with `Others` they partition the active tokens: every token
/// matches exactly one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Images,
    Videos,
    Audio,
    Documents,
    Others,
}

impl FileCategory {
    pub fn of(file_type: &str) -> Self {
        if file_type.starts_with("image/") {
            Self::Images
        } else if file_type.starts_with("video/") {
            Self::Videos
        } else if file_type.starts_with("audio/") {
            Self::Audio
        } else if file_type == "application/pdf" || file_type.starts_with(OOXML_PREFIX) {
            Self::Documents
        } else {
            Self::Others
        }
    }

    /// SQL predicate over the token's type snapshot.
    pub fn condition(self) -> Condition {
        let images = || file_tokens::Column::FileType.starts_with("image/");
        let videos = || file_tokens::Column::FileType.starts_with("video/");
        let audio = || file_tokens::Column::FileType.starts_with("audio/");
        let documents = || {
            Condition::any()
                .add(file_tokens::Column::FileType.eq("application/pdf"))
                .add(file_tokens::Column::FileType.starts_with(OOXML_PREFIX))
        };

        match self {
            Self::Images => Condition::all().add(images()),
            Self::Videos => Condition::all().add(videos()),
            Self::Audio => Condition::all().add(audio()),
            Self::Documents => documents(),
            Self::Others => Condition::all()
                .add(images().not())
                .add(videos().not())
                .add(audio().not())
                .add(documents().not()),
        }
    }
}

/// Which slice of a user's tokens a listing returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    /// All active tokens.
    All,
    /// Active tokens created by copy/share.
    Shared,
    /// Tokens in the recycle bin (not yet purged).
    RecycleBin,
    /// Active tokens marked favourite.
    Favourites,
    /// Active tokens in one MIME category.
    Category(FileCategory),
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FileListItem {
    pub token: String,
    pub file_type: String,
    pub parent: String,
    pub modified_at: Option<chrono::DateTime<chrono::Utc>>,
    pub file_name: String,
    pub file_size: i64,
    pub favourite: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FileDetails {
    pub token: String,
    pub file_type: String,
    pub parent: String,
    pub modified_at: Option<chrono::DateTime<chrono::Utc>>,
    pub file_name: String,
    pub file_size: i64,
    pub favourite: bool,
    pub is_owner: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TopViewedItem {
    pub token: String,
    pub file_type: String,
    pub file_name: String,
    pub file_size: i64,
    pub views: i64,
}

/// Display name falls back to the upload-time name when no rename happened.
fn display_name(token: &file_tokens::Model, file: Option<&files::Model>) -> String {
    token
        .change_file_name
        .clone()
        .or_else(|| file.map(|f| f.original_file_name.clone()))
        .unwrap_or_default()
}

pub struct ListingService {
    db: DatabaseConnection,
}

impl ListingService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn scope_condition(user_id: &str, scope: ListScope) -> Condition {
        let mut cond = Condition::all()
            .add(file_tokens::Column::Owner.eq(user_id))
            .add(file_tokens::Column::IsDeleted.eq(false));

        cond = match scope {
            ListScope::RecycleBin => cond.add(file_tokens::Column::IsDeleteInit.eq(true)),
            _ => cond.add(file_tokens::Column::IsDeleteInit.eq(false)),
        };

        match scope {
            ListScope::Shared => cond.add(file_tokens::Column::IsCopied.eq(true)),
            ListScope::Favourites => cond.add(file_tokens::Column::Favourite.eq(true)),
            ListScope::Category(category) => cond.add(category.condition()),
            ListScope::All | ListScope::RecycleBin => cond,
        }
    }

    /// Lists one scope of the user's tokens, most recently modified first.
    /// An empty result is a `NotFound`, matching the original API contract.
    pub async fn list(
        &self,
        user_id: &str,
        scope: ListScope,
    ) -> Result<Vec<FileListItem>, AppError> {
        let rows = FileTokens::find()
            .find_also_related(Files)
            .filter(Self::scope_condition(user_id, scope))
            .order_by_desc(file_tokens::Column::ModifiedAt)
            .all(&self.db)
            .await?;

        if rows.is_empty() {
            return Err(AppError::NotFound("No file found".to_string()));
        }

        Ok(rows
            .into_iter()
            .map(|(token, file)| FileListItem {
                file_name: display_name(&token, file.as_ref()),
                file_size: file.as_ref().map(|f| f.file_size).unwrap_or(token.file_size),
                token: token.token,
                file_type: token.file_type,
                parent: token.parent,
                modified_at: token.modified_at,
                favourite: token.favourite,
            })
            .collect())
    }

    /// Ten most viewed active tokens.
    pub async fn top_viewed(&self, user_id: &str) -> Result<Vec<TopViewedItem>, AppError> {
        let rows = FileTokens::find()
            .find_also_related(Files)
            .filter(Self::scope_condition(user_id, ListScope::All))
            .order_by_desc(file_tokens::Column::Views)
            .limit(10)
            .all(&self.db)
            .await?;

        if rows.is_empty() {
            return Err(AppError::NotFound("No file found".to_string()));
        }

        Ok(rows
            .into_iter()
            .map(|(token, file)| TopViewedItem {
                file_name: display_name(&token, file.as_ref()),
                file_size: file.as_ref().map(|f| f.file_size).unwrap_or(token.file_size),
                token: token.token,
                file_type: token.file_type,
                views: token.views,
            })
            .collect())
    }

    /// Detail view for one token. `requester` decides the `is_owner` flag;
    /// binned tokens are not served.
    pub async fn details(
        &self,
        token: &str,
        requester: Option<&str>,
    ) -> Result<FileDetails, AppError> {
        let (token, file) = FileTokens::find_by_id(token)
            .find_also_related(Files)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("No file found".to_string()))?;

        if token.is_delete_init {
            return Err(AppError::AlreadyDeleted(
                "File has already been deleted by its owner".to_string(),
            ));
        }

        Ok(FileDetails {
            file_name: display_name(&token, file.as_ref()),
            file_size: file.as_ref().map(|f| f.file_size).unwrap_or(token.file_size),
            is_owner: requester.is_some_and(|user_id| user_id == token.owner),
            token: token.token,
            file_type: token.file_type,
            parent: token.parent,
            modified_at: token.modified_at,
            favourite: token.favourite,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_partition_is_exclusive_and_exhaustive() {
        let samples = [
            ("image/png", FileCategory::Images),
            ("image/svg+xml", FileCategory::Images),
            ("video/mp4", FileCategory::Videos),
            ("audio/mpeg", FileCategory::Audio),
            ("application/pdf", FileCategory::Documents),
            (
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                FileCategory::Documents,
            ),
            ("application/zip", FileCategory::Others),
            ("text/plain", FileCategory::Others),
            ("", FileCategory::Others),
        ];
        for (mime, expected) in samples {
            assert_eq!(FileCategory::of(mime), expected, "mime: {mime}");
        }
    }
}
