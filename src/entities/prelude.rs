pub use super::file_tokens::Entity as FileTokens;
pub use super::files::Entity as Files;
pub use super::upload_sessions::Entity as UploadSessions;
pub use super::user_referrals::Entity as UserReferrals;
pub use super::users::Entity as Users;
