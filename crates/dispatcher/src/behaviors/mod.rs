//! 内置管道行为

pub mod cache;
pub mod exception_handling;
pub mod retry;
pub mod telemetry;
pub mod timeout;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache::CacheBehavior;
pub use exception_handling::ExceptionHandlingBehavior;
pub use retry::RetryBehavior;
pub use telemetry::TelemetryBehavior;
pub use timeout::TimeoutBehavior;
pub use validation::ValidationBehavior;
