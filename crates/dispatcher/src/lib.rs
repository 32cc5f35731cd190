//! Message dispatch
//!
//! Handler registry, request pipeline with the built-in behaviors, the
//! `MessageHub` mediator and the outbox background processor.

pub mod behaviors;
pub mod hub;
pub mod outbox_processor;
pub mod pipeline;
pub mod registry;

pub use behaviors::{
    CacheBehavior, ExceptionHandlingBehavior, RetryBehavior, TelemetryBehavior, TimeoutBehavior,
    ValidationBehavior,
};
pub use hub::{FanOutReport, MessageHub, MessageHubBuilder};
pub use outbox_processor::{OutboxBatchStats, OutboxProcessor};
pub use pipeline::{Next, PipelineBehavior, RequestContext};
pub use registry::HandlerRegistry;
