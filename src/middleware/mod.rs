pub mod auth;

pub use auth::{AuthUser, OptionalUser, PageUser};
