pub mod cache_store;
pub mod dead_letter_queue;
pub mod handler;
pub mod message;
pub mod outbox_store;

pub use cache_store::CacheStore;
pub use dead_letter_queue::DeadLetterQueue;
pub use handler::{NotificationHandler, RequestHandler};
pub use message::{
    decode_notification, short_type_name, AnyNotification, ErasedRequest, ErasedResponse,
    Notification, NotificationDecoder, Request,
};
pub use outbox_store::OutboxStore;
