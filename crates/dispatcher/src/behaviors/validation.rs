use async_trait::async_trait;
use messagehub_core::{ErasedResponse, HubError, HubResult};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use validator::ValidationErrors;

use crate::pipeline::{Next, PipelineBehavior, RequestContext};

/// 调用 `next` 之前检查请求上声明的校验规则
#[derive(Debug, Default)]
pub struct ValidationBehavior;

impl ValidationBehavior {
    pub fn new() -> Self {
        Self
    }
}

/// 取字段名最小的那条失败作为报告，保证输出稳定
fn first_violation(errors: &ValidationErrors) -> (String, String) {
    let mut violations: Vec<(String, String)> = errors
        .field_errors()
        .into_iter()
        .filter_map(|(field, field_errors)| {
            field_errors
                .first()
                .map(|e| (field.to_string(), e.code.to_string()))
        })
        .collect();
    violations.sort();

    violations
        .into_iter()
        .next()
        .unwrap_or_else(|| ("<request>".to_string(), "invalid".to_string()))
}

#[async_trait]
impl PipelineBehavior for ValidationBehavior {
    fn name(&self) -> &'static str {
        "Validation"
    }

    async fn handle(
        &self,
        ctx: &RequestContext<'_>,
        cancel: &CancellationToken,
        next: Next<'_>,
    ) -> HubResult<ErasedResponse> {
        if let Err(errors) = ctx.request().validate_request() {
            let (field, rule) = first_violation(&errors);
            debug!(
                request_type = ctx.request_type(),
                field = %field,
                rule = %rule,
                "请求校验失败"
            );
            return Err(HubError::validation(ctx.request_type(), field, rule));
        }

        next.run(cancel).await
    }
}
