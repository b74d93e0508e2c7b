use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-user ownership handle for a file. The token is the user-facing ID;
/// sharing a file creates another token on the same `files` row.
///
/// Two-stage soft delete: `is_delete_init` puts the token in the recycle bin,
/// `is_deleted` marks it permanently purged.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "file_tokens")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub token: String,
    pub owner: String,
    pub file_id: String,
    /// Size/type copied from the file at token creation, so listings and
    /// stats never need the join.
    pub file_size: i64,
    pub file_type: String,
    /// Folder placeholder; always the root sentinel `"*"` for now.
    pub parent: String,
    pub modified_at: Option<DateTimeUtc>,
    pub is_delete_init: bool,
    pub is_deleted: bool,
    pub delete_init_at: Option<DateTimeUtc>,
    pub is_copied: bool,
    pub favourite: bool,
    pub change_file_name: Option<String>,
    pub views: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::files::Entity",
        from = "Column::FileId",
        to = "super::files::Column::FileId",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    Files,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::Owner",
        to = "super::users::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Users,
}

impl Related<super::files::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Files.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
