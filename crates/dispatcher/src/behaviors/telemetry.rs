use async_trait::async_trait;
use messagehub_core::{ErasedResponse, HubResult};
use messagehub_infrastructure::{MetricsCollector, RequestTracer};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::pipeline::{Next, PipelineBehavior, RequestContext};

/// 在 `messagehub.handle` span 中执行内层调用并记录耗时与结果
#[derive(Default)]
pub struct TelemetryBehavior {
    metrics: MetricsCollector,
}

impl TelemetryBehavior {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PipelineBehavior for TelemetryBehavior {
    fn name(&self) -> &'static str {
        "Telemetry"
    }

    async fn handle(
        &self,
        ctx: &RequestContext<'_>,
        cancel: &CancellationToken,
        next: Next<'_>,
    ) -> HubResult<ErasedResponse> {
        let span = RequestTracer::request_span(ctx.request_type());
        let started = Instant::now();

        let result = next.run(cancel).instrument(span.clone()).await;

        let elapsed = started.elapsed();
        RequestTracer::record_result(&span, result.is_ok(), elapsed.as_millis() as u64);
        if let Err(e) = &result {
            RequestTracer::record_error(&span, e);
        }
        self.metrics
            .record_request(ctx.request_type(), result.is_ok(), elapsed.as_secs_f64());

        result
    }
}
