use messagehub_core::HubError;
use tracing_opentelemetry::OpenTelemetrySpanExt;

pub const MESSAGING_SYSTEM: &str = "messagehub";

/// 请求、通知与 Outbox 处理相关的 span 构造和属性记录
pub struct RequestTracer;

impl RequestTracer {
    pub fn request_span(request_type: &str) -> tracing::Span {
        let span = tracing::info_span!(
            "messagehub.handle",
            request.type = request_type,
            otel.kind = "internal",
            messaging.success = tracing::field::Empty,
            messaging.duration_ms = tracing::field::Empty,
            messaging.error.type = tracing::field::Empty
        );
        span.set_attribute("messaging.system", MESSAGING_SYSTEM);
        span.set_attribute("messaging.request.type", request_type.to_string());

        span
    }

    pub fn notification_span(notification_type: &str, handler_type: &str) -> tracing::Span {
        let span = tracing::info_span!(
            "messagehub.notify",
            notification.type = notification_type,
            handler.type = handler_type,
            otel.kind = "consumer",
            messaging.success = tracing::field::Empty,
            messaging.duration_ms = tracing::field::Empty,
            messaging.error.type = tracing::field::Empty
        );
        span.set_attribute("messaging.system", MESSAGING_SYSTEM);
        span.set_attribute("messaging.notification.type", notification_type.to_string());
        span.set_attribute("messaging.handler.type", handler_type.to_string());

        span
    }

    pub fn outbox_span(message_id: &str, notification_type: &str, attempts: u32) -> tracing::Span {
        let span = tracing::info_span!(
            "messagehub.outbox.redeliver",
            outbox.message_id = message_id,
            notification.type = notification_type,
            outbox.attempts = attempts,
            otel.kind = "consumer",
            messaging.success = tracing::field::Empty,
            messaging.duration_ms = tracing::field::Empty,
            messaging.error.type = tracing::field::Empty
        );
        span.set_attribute("messaging.system", MESSAGING_SYSTEM);
        span.set_attribute("messaging.message.id", message_id.to_string());
        span.set_attribute("messaging.outbox.attempts", attempts as i64);

        span
    }

    /// 结果同时写入 span 字段和 OpenTelemetry 属性
    pub fn record_result(span: &tracing::Span, success: bool, duration_ms: u64) {
        span.record("messaging.success", success);
        span.record("messaging.duration_ms", duration_ms);
        span.set_attribute("messaging.success", success);
        span.set_attribute("messaging.duration_ms", duration_ms as i64);
    }

    pub fn record_error(span: &tracing::Span, error: &HubError) {
        span.record("messaging.error.type", error.kind());
        span.set_attribute("error", true);
        span.set_attribute("messaging.error.type", error.kind());
        span.set_attribute("messaging.error.message", error.to_string());
    }
}
