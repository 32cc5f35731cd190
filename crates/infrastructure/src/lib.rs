pub mod cache;
pub mod cleanup_service;
pub mod dead_letter;
pub mod observability;
pub mod outbox;

pub use cache::InMemoryCacheStore;
pub use cleanup_service::{CleanupStats, OutboxCleanupService};
pub use dead_letter::InMemoryDeadLetterQueue;
pub use observability::{init_logging, init_metrics, MetricsCollector, RequestTracer};
pub use outbox::{InMemoryOutboxStore, OutboxWriter};
