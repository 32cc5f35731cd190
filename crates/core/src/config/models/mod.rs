pub mod app_config;
pub mod hub_options;
pub mod observability;
pub mod outbox;
pub mod resilience;

pub use app_config::HubConfig;
pub use hub_options::HubOptions;
pub use observability::{LogFormat, LoggingConfig, MetricsConfig};
pub use outbox::OutboxConfig;
pub use resilience::{RetryConfig, TimeoutConfig};
