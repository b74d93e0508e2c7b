use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use crate::utils::ident;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, Set, TransactionTrait,
};

/// Lifecycle operations on ownership tokens: copy, delete/restore,
/// favourite, rename, view counting, recycle-bin purge. Every mutation is
/// one transaction, so the token flags and the file cascade commit together.
pub struct TokenService {
    db: DatabaseConnection,
}

impl TokenService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates the ownership handle for a file, snapshotting size and type
    /// so listings and stats never need the join.
    pub async fn create_for_file(
        db: &impl ConnectionTrait,
        owner: &str,
        file: &files::Model,
        is_copied: bool,
    ) -> Result<file_tokens::Model, AppError> {
        let token = file_tokens::ActiveModel {
            token: Set(ident::generate_id()),
            owner: Set(owner.to_string()),
            file_id: Set(file.file_id.clone()),
            file_size: Set(file.file_size),
            file_type: Set(file.file_type.clone()),
            parent: Set("*".to_string()),
            modified_at: Set(Some(Utc::now())),
            is_delete_init: Set(false),
            is_deleted: Set(false),
            delete_init_at: Set(None),
            is_copied: Set(is_copied),
            favourite: Set(false),
            change_file_name: Set(None),
            views: Set(0),
        };
        Ok(token.insert(db).await?)
    }

    async fn find_token(
        db: &impl ConnectionTrait,
        token: &str,
    ) -> Result<file_tokens::Model, AppError> {
        FileTokens::find_by_id(token)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))
    }

    fn ensure_owner(token: &file_tokens::Model, user_id: &str) -> Result<(), AppError> {
        if token.owner != user_id {
            return Err(AppError::NotOwner("File is not owned by you".to_string()));
        }
        Ok(())
    }

    fn ensure_not_binned(token: &file_tokens::Model) -> Result<(), AppError> {
        if token.is_delete_init {
            return Err(AppError::AlreadyDeleted(
                "File has already been deleted or moved to the recycle bin".to_string(),
            ));
        }
        Ok(())
    }

    /// Copy-on-share: a new token on the same file, no byte duplication.
    pub async fn copy(
        &self,
        user_id: &str,
        source_token: &str,
    ) -> Result<file_tokens::Model, AppError> {
        let txn = self.db.begin().await?;

        let source = Self::find_token(&txn, source_token).await?;
        Self::ensure_not_binned(&source)?;

        let already_owned = FileTokens::find()
            .filter(file_tokens::Column::Owner.eq(user_id))
            .filter(file_tokens::Column::FileId.eq(&source.file_id))
            .filter(file_tokens::Column::IsDeleted.eq(false))
            .count(&txn)
            .await?;
        if already_owned > 0 {
            return Err(AppError::AlreadyOwned(
                "File is already owned by you".to_string(),
            ));
        }

        let file = Files::find_by_id(&source.file_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

        let copy = Self::create_for_file(&txn, user_id, &file, true).await?;

        txn.commit().await?;
        Ok(copy)
    }

    /// Moves a token to the recycle bin. When this was the last active token
    /// on the file, the file itself is flagged in the same transaction.
    pub async fn delete(&self, user_id: &str, token: &str) -> Result<(), AppError> {
        let txn = self.db.begin().await?;

        let model = Self::find_token(&txn, token).await?;
        Self::ensure_owner(&model, user_id)?;
        if model.is_delete_init {
            return Err(AppError::AlreadyDeleted(
                "File has already been deleted by you".to_string(),
            ));
        }

        let file_id = model.file_id.clone();
        let mut active: file_tokens::ActiveModel = model.into();
        active.is_delete_init = Set(true);
        active.delete_init_at = Set(Some(Utc::now()));
        active.update(&txn).await?;

        Self::cascade_file_soft_delete(&txn, &file_id).await?;

        txn.commit().await?;
        Ok(())
    }

    /// Last-active-referrer check: flags the file once no token outside the
    /// recycle bin references it.
    async fn cascade_file_soft_delete(
        db: &impl ConnectionTrait,
        file_id: &str,
    ) -> Result<(), AppError> {
        let active_refs = FileTokens::find()
            .filter(file_tokens::Column::FileId.eq(file_id))
            .filter(file_tokens::Column::IsDeleteInit.eq(false))
            .count(db)
            .await?;

        if active_refs == 0 {
            if let Some(file) = Files::find_by_id(file_id).one(db).await? {
                tracing::info!("Last active token removed, soft-deleting file {}", file_id);
                let mut active: files::ActiveModel = file.into();
                active.is_delete_init = Set(true);
                active.delete_init_at = Set(Some(Utc::now()));
                active.update(db).await?;
            }
        }
        Ok(())
    }

    /// Restores a batch of tokens from the recycle bin. The whole batch is
    /// one transaction and fails at the first bad token, so a partial
    /// restore is never observable.
    pub async fn restore(&self, user_id: &str, tokens: &[String]) -> Result<(), AppError> {
        let txn = self.db.begin().await?;

        for token in tokens {
            let model = Self::find_token(&txn, token).await?;
            Self::ensure_owner(&model, user_id)?;
            if !model.is_delete_init {
                return Err(AppError::Validation(
                    "File has already been recovered".to_string(),
                ));
            }
            if model.is_deleted {
                return Err(AppError::AlreadyDeleted(
                    "File has been permanently deleted".to_string(),
                ));
            }

            let file_id = model.file_id.clone();
            let mut active: file_tokens::ActiveModel = model.into();
            active.is_delete_init = Set(false);
            active.delete_init_at = Set(None);
            active.update(&txn).await?;

            // Reverse of the delete cascade: a restored token makes the file
            // referenced again.
            if let Some(file) = Files::find_by_id(&file_id).one(&txn).await? {
                if file.is_delete_init {
                    let mut active: files::ActiveModel = file.into();
                    active.is_delete_init = Set(false);
                    active.delete_init_at = Set(None);
                    active.update(&txn).await?;
                }
            }
        }

        txn.commit().await?;
        Ok(())
    }

    pub async fn set_favourite(
        &self,
        user_id: &str,
        token: &str,
        favourite: bool,
    ) -> Result<(), AppError> {
        let txn = self.db.begin().await?;

        let model = Self::find_token(&txn, token).await?;
        Self::ensure_owner(&model, user_id)?;
        Self::ensure_not_binned(&model)?;

        let mut active: file_tokens::ActiveModel = model.into();
        active.favourite = Set(favourite);
        active.update(&txn).await?;

        txn.commit().await?;
        Ok(())
    }

    /// Sets the display-name override; the original upload name stays on the
    /// file record untouched.
    pub async fn rename(
        &self,
        user_id: &str,
        token: &str,
        new_name: &str,
    ) -> Result<(), AppError> {
        let txn = self.db.begin().await?;

        let model = Self::find_token(&txn, token).await?;
        Self::ensure_owner(&model, user_id)?;
        Self::ensure_not_binned(&model)?;

        let mut active: file_tokens::ActiveModel = model.into();
        active.change_file_name = Set(Some(new_name.to_string()));
        active.update(&txn).await?;

        txn.commit().await?;
        Ok(())
    }

    /// Increments the view counter; the sole input to earnings.
    pub async fn update_views(&self, user_id: &str, token: &str) -> Result<(), AppError> {
        let txn = self.db.begin().await?;

        let model = Self::find_token(&txn, token).await?;
        Self::ensure_owner(&model, user_id)?;
        Self::ensure_not_binned(&model)?;

        let views = model.views;
        let mut active: file_tokens::ActiveModel = model.into();
        active.views = Set(views + 1);
        active.update(&txn).await?;

        txn.commit().await?;
        Ok(())
    }

    /// Permanently purges everything in the requester's recycle bin.
    /// Returns the number of tokens purged.
    pub async fn empty_recycle_bin(&self, user_id: &str) -> Result<u64, AppError> {
        let txn = self.db.begin().await?;

        let binned = FileTokens::find()
            .filter(file_tokens::Column::Owner.eq(user_id))
            .filter(file_tokens::Column::IsDeleteInit.eq(true))
            .filter(file_tokens::Column::IsDeleted.eq(false))
            .all(&txn)
            .await?;

        let count = binned.len() as u64;
        for model in binned {
            let mut active: file_tokens::ActiveModel = model.into();
            active.is_deleted = Set(true);
            active.update(&txn).await?;
        }

        txn.commit().await?;
        tracing::info!("Emptied recycle bin for user {}: {} token(s)", user_id, count);
        Ok(count)
    }
}
