use std::sync::Arc;

use messagehub_core::{AnyNotification, HubResult, OutboxMessage, OutboxStore};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::observability::MetricsCollector;

/// Outbox 写入器
///
/// 把通知序列化为 `OutboxMessage` 并交给存储持久化。序列化或写入任一步
/// 失败都直接返回错误，不会留下半条记录。
#[derive(Clone)]
pub struct OutboxWriter {
    store: Arc<dyn OutboxStore>,
    metrics: MetricsCollector,
}

impl OutboxWriter {
    pub fn new(store: Arc<dyn OutboxStore>) -> Self {
        Self {
            store,
            metrics: MetricsCollector::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn OutboxStore> {
        &self.store
    }

    pub async fn save(&self, notification: &dyn AnyNotification) -> HubResult<Uuid> {
        let message = OutboxMessage::from_notification(notification).inspect_err(|e| {
            warn!(
                notification_type = notification.short_type_name(),
                error = %e,
                "通知序列化失败，未写入Outbox"
            );
        })?;
        let id = message.id;

        self.store.save(message).await?;
        self.metrics
            .record_outbox_saved(notification.short_type_name());

        debug!(
            message_id = %id,
            notification_type = notification.short_type_name(),
            "通知已写入Outbox"
        );
        Ok(id)
    }
}
