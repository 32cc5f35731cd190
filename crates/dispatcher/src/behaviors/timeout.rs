use std::time::Duration;

use async_trait::async_trait;
use messagehub_core::{ErasedResponse, HubError, HubResult, TimeoutConfig};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::pipeline::{Next, PipelineBehavior, RequestContext};

/// 给内层调用设置截止时间
///
/// 内层拿到的是调用方令牌的子令牌：调用方取消时返回 `CallerCancelled`，
/// 到达截止时间时返回 `Timeout`，两者不会混淆。
pub struct TimeoutBehavior {
    default_timeout: Duration,
}

impl TimeoutBehavior {
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }

    pub fn from_config(config: &TimeoutConfig) -> Self {
        Self::new(config.default_timeout())
    }
}

#[async_trait]
impl PipelineBehavior for TimeoutBehavior {
    fn name(&self) -> &'static str {
        "Timeout"
    }

    async fn handle(
        &self,
        ctx: &RequestContext<'_>,
        cancel: &CancellationToken,
        next: Next<'_>,
    ) -> HubResult<ErasedResponse> {
        let timeout = ctx.metadata().timeout.unwrap_or(self.default_timeout);
        let deadline = cancel.child_token();
        let _guard = deadline.clone().drop_guard();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(HubError::CallerCancelled),
            _ = tokio::time::sleep(timeout) => {
                let timeout_ms = timeout.as_millis() as u64;
                warn!(request_type = ctx.request_type(), timeout_ms, "请求执行超时");
                Err(HubError::timeout(ctx.request_type(), timeout_ms))
            }
            result = next.run(&deadline) => result,
        }
    }
}
