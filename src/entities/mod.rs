pub mod prelude;

pub mod file_tokens;
pub mod files;
pub mod upload_sessions;
pub mod user_referrals;
pub mod users;
