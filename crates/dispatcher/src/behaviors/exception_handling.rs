use async_trait::async_trait;
use messagehub_core::{ErasedResponse, HubResult};
use messagehub_infrastructure::MetricsCollector;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::pipeline::{Next, PipelineBehavior, RequestContext};

/// 记录所有从内层冒出的失败，然后原样返回
#[derive(Default)]
pub struct ExceptionHandlingBehavior {
    metrics: MetricsCollector,
}

impl ExceptionHandlingBehavior {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PipelineBehavior for ExceptionHandlingBehavior {
    fn name(&self) -> &'static str {
        "ExceptionHandling"
    }

    async fn handle(
        &self,
        ctx: &RequestContext<'_>,
        cancel: &CancellationToken,
        next: Next<'_>,
    ) -> HubResult<ErasedResponse> {
        let result = next.run(cancel).await;

        if let Err(e) = &result {
            if e.is_cancellation() {
                debug!(request_type = ctx.request_type(), "请求被调用方取消");
            } else {
                error!(
                    request_type = ctx.request_type(),
                    error_kind = e.kind(),
                    error = %e,
                    "请求处理失败"
                );
            }
            self.metrics.record_request_failure(ctx.request_type(), e.kind());
        }

        result
    }
}
