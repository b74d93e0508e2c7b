pub mod auth;
pub mod ident;
pub mod keyed_mutex;
