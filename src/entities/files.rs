use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Canonical blob record. One row per physical upload; many `file_tokens`
/// rows may reference it. A file is "valid" once `upload_finished_at` is set.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "files")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub file_id: String,
    #[sea_orm(unique)]
    pub storage_key: String,
    pub original_file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub created_at: Option<DateTimeUtc>,
    pub upload_finished_at: Option<DateTimeUtc>,
    /// Weak reference: deleting the uploader must not delete the blob.
    pub uploaded_by: Option<String>,
    pub is_delete_init: bool,
    pub delete_init_at: Option<DateTimeUtc>,
}

impl Model {
    pub fn is_valid(&self) -> bool {
        self.upload_finished_at.is_some()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::file_tokens::Entity")]
    FileTokens,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UploadedBy",
        to = "super::users::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    Users,
}

impl Related<super::file_tokens::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FileTokens.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
