use std::time::Duration;

use async_trait::async_trait;
use messagehub_core::{ErasedResponse, HubError, HubResult, RetryConfig};
use messagehub_infrastructure::MetricsCollector;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::pipeline::{Next, PipelineBehavior, RequestContext};

/// 对可重试失败做有界重试，两次尝试之间固定等待
pub struct RetryBehavior {
    max_retries: u32,
    delay: Duration,
    metrics: MetricsCollector,
}

impl RetryBehavior {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            delay,
            metrics: MetricsCollector::new(),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.effective_max_retries(), config.delay())
    }
}

#[async_trait]
impl PipelineBehavior for RetryBehavior {
    fn name(&self) -> &'static str {
        "Retry"
    }

    async fn handle(
        &self,
        ctx: &RequestContext<'_>,
        cancel: &CancellationToken,
        next: Next<'_>,
    ) -> HubResult<ErasedResponse> {
        let mut attempt: u32 = 0;
        let mut last_error: Option<HubError> = None;

        while attempt <= self.max_retries {
            match next.run(cancel).await {
                Ok(response) => {
                    if attempt > 0 {
                        debug!(request_type = ctx.request_type(), attempt, "重试后请求成功");
                    }
                    return Ok(response);
                }
                Err(e) if e.is_retryable() => {
                    attempt += 1;
                    if attempt <= self.max_retries {
                        warn!(
                            request_type = ctx.request_type(),
                            attempt,
                            max_retries = self.max_retries,
                            error = %e,
                            "请求失败，等待后重试"
                        );
                        self.metrics.record_retry(ctx.request_type(), attempt);

                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => return Err(HubError::CallerCancelled),
                            _ = tokio::time::sleep(self.delay) => {}
                        }
                    }
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| HubError::Internal("重试循环结束但没有捕获到错误".to_string())))
    }
}
