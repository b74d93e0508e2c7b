use crate::api::error::AppError;
use crate::config::ServiceConfig;
use crate::entities::{prelude::*, *};
use crate::services::listing_service::FileCategory;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use serde::Serialize;
use utoipa::ToSchema;

/// Per-user usage aggregates. All sizes are bytes; counts are tokens, not
/// files, so a shared file counts once per owner.
#[derive(Debug, Serialize, ToSchema)]
pub struct StorageStats {
    pub total_storage: i64,
    pub bin_storage: i64,
    pub images: u64,
    pub videos: u64,
    pub audio: u64,
    pub documents: u64,
    pub others: u64,
    pub shared: u64,
    pub favourites: u64,
    pub allocated_storage: i64,
    pub remaining_storage: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Earnings {
    pub total_views: i64,
    pub total_earnings: f64,
    pub period_earnings: f64,
    pub total_referrals: u64,
}

/// Derived, stateless read-models over the token and user stores. Nothing
/// here mutates; views only ever increases, so earnings never go down.
pub struct StatsService {
    db: DatabaseConnection,
    config: ServiceConfig,
}

impl StatsService {
    pub fn new(db: DatabaseConnection, config: ServiceConfig) -> Self {
        Self { db, config }
    }

    pub async fn storage_stats(&self, user_id: &str) -> Result<StorageStats, AppError> {
        let tokens = FileTokens::find()
            .filter(file_tokens::Column::Owner.eq(user_id))
            .filter(file_tokens::Column::IsDeleted.eq(false))
            .all(&self.db)
            .await?;

        let mut stats = StorageStats {
            total_storage: 0,
            bin_storage: 0,
            images: 0,
            videos: 0,
            audio: 0,
            documents: 0,
            others: 0,
            shared: 0,
            favourites: 0,
            allocated_storage: self.config.storage_per_user,
            remaining_storage: 0,
        };

        for token in &tokens {
            if token.is_delete_init {
                stats.bin_storage += token.file_size;
                continue;
            }
            stats.total_storage += token.file_size;
            match FileCategory::of(&token.file_type) {
                FileCategory::Images => stats.images += 1,
                FileCategory::Videos => stats.videos += 1,
                FileCategory::Audio => stats.audio += 1,
                FileCategory::Documents => stats.documents += 1,
                FileCategory::Others => stats.others += 1,
            }
            if token.is_copied {
                stats.shared += 1;
            }
            if token.favourite {
                stats.favourites += 1;
            }
        }

        stats.remaining_storage = (stats.allocated_storage - stats.total_storage).max(0);
        Ok(stats)
    }

    /// CPM model: earnings = rate per 1000 views. The period figure is the
    /// delta since the last payout snapshot on the user record.
    pub async fn earnings(&self, user_id: &str) -> Result<Earnings, AppError> {
        let user = Users::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let tokens = FileTokens::find()
            .filter(file_tokens::Column::Owner.eq(user_id))
            .filter(file_tokens::Column::IsDeleted.eq(false))
            .all(&self.db)
            .await?;
        let total_views: i64 = tokens.iter().map(|t| t.views).sum();

        let cpm = self.config.cpm_rate;
        let total_earnings = cpm * total_views as f64 / 1000.0;
        let period_earnings = cpm * (total_views - user.last_views) as f64 / 1000.0;

        let total_referrals = match UserReferrals::find()
            .filter(user_referrals::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?
        {
            Some(referral) => {
                Users::find()
                    .filter(users::Column::ReferredBy.eq(&referral.token))
                    .count(&self.db)
                    .await?
            }
            None => 0,
        };

        Ok(Earnings {
            total_views,
            total_earnings,
            period_earnings,
            total_referrals,
        })
    }
}
