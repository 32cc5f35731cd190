use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use messagehub_core::{
    AnyNotification, DeadLetterMessage, DeadLetterQueue, HubError, HubResult,
};
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use crate::observability::MetricsCollector;

/// 死信查询的默认分页大小
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// 内存死信队列
///
/// 每次失败生成一条独立记录，按创建时间从新到旧返回。
#[derive(Default)]
pub struct InMemoryDeadLetterQueue {
    entries: RwLock<HashMap<Uuid, (u64, DeadLetterMessage)>>,
    next_sequence: AtomicU64,
    metrics: MetricsCollector,
}

impl InMemoryDeadLetterQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用默认分页参数查询第一页
    pub async fn recent(&self) -> HubResult<Vec<DeadLetterMessage>> {
        self.get_messages(0, DEFAULT_PAGE_SIZE).await
    }

    pub async fn get(&self, id: Uuid) -> Option<DeadLetterMessage> {
        self.entries
            .read()
            .await
            .get(&id)
            .map(|(_, message)| message.clone())
    }
}

#[async_trait]
impl DeadLetterQueue for InMemoryDeadLetterQueue {
    async fn add(
        &self,
        notification: &dyn AnyNotification,
        handler_type: &str,
        error: &HubError,
    ) -> HubResult<()> {
        let record = DeadLetterMessage::from_failure(notification, handler_type, error);
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);

        warn!(
            dead_letter_id = %record.id,
            notification_type = %record.notification_type,
            handler_type = handler_type,
            error = %record.error_message,
            "通知处理失败，已写入死信队列"
        );

        self.entries
            .write()
            .await
            .insert(record.id, (sequence, record));
        self.metrics.record_dead_letter(notification.short_type_name());
        Ok(())
    }

    async fn get_messages(&self, skip: usize, take: usize) -> HubResult<Vec<DeadLetterMessage>> {
        let entries = self.entries.read().await;
        let mut ordered: Vec<&(u64, DeadLetterMessage)> = entries.values().collect();
        ordered.sort_by(|(seq_a, a), (seq_b, b)| {
            b.created_at.cmp(&a.created_at).then(seq_b.cmp(seq_a))
        });

        Ok(ordered
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|(_, message)| message.clone())
            .collect())
    }

    async fn delete(&self, id: Uuid) -> HubResult<()> {
        self.entries.write().await.remove(&id);
        Ok(())
    }

    async fn count(&self) -> HubResult<usize> {
        Ok(self.entries.read().await.len())
    }
}
