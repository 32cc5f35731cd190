pub mod dead_letter_message;
pub mod outbox_message;
pub mod request_metadata;

pub use dead_letter_message::DeadLetterMessage;
pub use outbox_message::OutboxMessage;
pub use request_metadata::{CachePolicy, RequestMetadata};
