use std::time::Instant;

use async_trait::async_trait;
use messagehub_core::{ErasedResponse, HubResult};
use messagehub_dispatcher::{Next, PipelineBehavior, RequestContext};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// 自定义日志行为，记录每个请求的开始和结束
#[derive(Debug, Default)]
pub struct LoggingBehavior;

#[async_trait]
impl PipelineBehavior for LoggingBehavior {
    fn name(&self) -> &'static str {
        "LoggingBehavior"
    }

    async fn handle(
        &self,
        ctx: &RequestContext<'_>,
        cancel: &CancellationToken,
        next: Next<'_>,
    ) -> HubResult<ErasedResponse> {
        let request_type = ctx.request_type();
        info!(request_type, "Handling request");

        let start = Instant::now();
        match next.run(cancel).await {
            Ok(response) => {
                info!(
                    request_type,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Request completed successfully"
                );
                Ok(response)
            }
            Err(e) => {
                error!(request_type, error = %e, "Request failed");
                Err(e)
            }
        }
    }
}
