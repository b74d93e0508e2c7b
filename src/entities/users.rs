use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub email: String,
    pub name: String,
    /// Referral token of the user who referred this account, if any.
    pub referred_by: Option<String>,
    pub last_views: i64,
    pub last_earnings: f64,
    pub last_payout_on: Option<DateTimeUtc>,
    pub created_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::file_tokens::Entity")]
    FileTokens,
    #[sea_orm(has_many = "super::files::Entity")]
    Files,
    #[sea_orm(has_one = "super::user_referrals::Entity")]
    UserReferrals,
}

impl Related<super::file_tokens::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FileTokens.def()
    }
}

impl Related<super::files::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Files.def()
    }
}

impl Related<super::user_referrals::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserReferrals.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
