pub mod auth;
pub mod config;
pub mod error;
pub mod types;

pub use auth::{AllowAll, Authorizer, DenyAll, StaticPolicy};
pub use config::DataConfig;
pub use error::ServiceError;
pub use types::{UserContext, new_id, now_epoch_millis};
