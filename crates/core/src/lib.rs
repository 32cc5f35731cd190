pub mod config;
pub mod errors;
pub mod models;
pub mod traits;

pub use config::*;
pub use errors::*;
pub use models::{CachePolicy, DeadLetterMessage, OutboxMessage, RequestMetadata};
pub use traits::*;
