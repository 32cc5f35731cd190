use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use messagehub_core::{HubError, HubResult, OutboxMessage, OutboxStore};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug)]
struct StoredMessage {
    /// 写入序号，创建时间相同时保证先进先出
    sequence: u64,
    message: OutboxMessage,
}

/// 内存 Outbox 存储
///
/// 适用于开发和测试场景，进程重启后数据丢失。
#[derive(Debug, Default)]
pub struct InMemoryOutboxStore {
    messages: RwLock<HashMap<Uuid, StoredMessage>>,
    next_sequence: AtomicU64,
}

impl InMemoryOutboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: Uuid) -> Option<OutboxMessage> {
        self.messages
            .read()
            .await
            .get(&id)
            .map(|stored| stored.message.clone())
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn save(&self, message: OutboxMessage) -> HubResult<()> {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        let mut messages = self.messages.write().await;
        if messages.contains_key(&message.id) {
            return Err(HubError::store_error(format!(
                "Outbox消息已存在: {}",
                message.id
            )));
        }
        debug!(message_id = %message.id, notification_type = %message.notification_type, "保存Outbox消息");
        messages.insert(message.id, StoredMessage { sequence, message });
        Ok(())
    }

    async fn get_unprocessed(&self, batch_size: usize) -> HubResult<Vec<OutboxMessage>> {
        let messages = self.messages.read().await;
        let mut pending: Vec<&StoredMessage> = messages
            .values()
            .filter(|stored| !stored.message.is_processed)
            .collect();
        pending.sort_by_key(|stored| (stored.message.created_at, stored.sequence));

        Ok(pending
            .into_iter()
            .take(batch_size)
            .map(|stored| stored.message.clone())
            .collect())
    }

    async fn mark_processed(&self, id: Uuid) -> HubResult<()> {
        let mut messages = self.messages.write().await;
        match messages.get_mut(&id) {
            Some(stored) => {
                stored.message.mark_processed();
                Ok(())
            }
            None => Err(HubError::store_error(format!("Outbox消息不存在: {id}"))),
        }
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> HubResult<()> {
        let mut messages = self.messages.write().await;
        match messages.get_mut(&id) {
            Some(stored) => {
                stored.message.record_failure(error);
                Ok(())
            }
            None => Err(HubError::store_error(format!("Outbox消息不存在: {id}"))),
        }
    }

    async fn delete_processed_older_than(&self, cutoff: DateTime<Utc>) -> HubResult<u64> {
        let mut messages = self.messages.write().await;
        let before = messages.len();
        messages.retain(|_, stored| !stored.message.processed_before(cutoff));
        Ok((before - messages.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    fn message(name: &str) -> OutboxMessage {
        OutboxMessage::new(name, "{}")
    }

    #[tokio::test]
    async fn test_unprocessed_are_returned_oldest_first() {
        let store = InMemoryOutboxStore::new();
        let now = Utc::now();

        let mut newest = message("app::C");
        newest.created_at = now;
        let mut oldest = message("app::A");
        oldest.created_at = now - Duration::seconds(10);
        let mut middle = message("app::B");
        middle.created_at = now - Duration::seconds(5);

        store.save(newest).await.unwrap();
        store.save(oldest).await.unwrap();
        store.save(middle).await.unwrap();

        let batch = store.get_unprocessed(10).await.unwrap();
        let names: Vec<_> = batch.iter().map(|m| m.notification_type.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);

        let limited = store.get_unprocessed(2).await.unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn test_equal_timestamps_keep_insertion_order() {
        let store = InMemoryOutboxStore::new();
        let created_at = Utc::now();
        for name in ["First", "Second", "Third"] {
            let mut m = message(name);
            m.created_at = created_at;
            store.save(m).await.unwrap();
        }

        let batch = store.get_unprocessed(10).await.unwrap();
        let names: Vec<_> = batch.iter().map(|m| m.notification_type.as_str()).collect();
        assert_eq!(names, vec!["First", "Second", "Third"]);
    }

    #[tokio::test]
    async fn test_mark_failed_keeps_message_pending() {
        let store = InMemoryOutboxStore::new();
        let m = message("Pending");
        let id = m.id;
        store.save(m).await.unwrap();

        store.mark_failed(id, "first").await.unwrap();
        store.mark_failed(id, "second").await.unwrap();

        let stored = store.get(id).await.unwrap();
        assert_eq!(stored.attempts, 2);
        assert_eq!(stored.last_error.as_deref(), Some("second"));
        assert_eq!(store.get_unprocessed(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mark_processed_removes_from_pending() {
        let store = InMemoryOutboxStore::new();
        let m = message("Done");
        let id = m.id;
        store.save(m).await.unwrap();

        store.mark_processed(id).await.unwrap();
        assert!(store.get_unprocessed(10).await.unwrap().is_empty());
        assert!(store.get(id).await.unwrap().processed_at.is_some());
    }

    #[tokio::test]
    async fn test_mark_unknown_message_fails() {
        let store = InMemoryOutboxStore::new();
        assert!(store.mark_processed(Uuid::new_v4()).await.is_err());
        assert!(store.mark_failed(Uuid::new_v4(), "x").await.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_save_is_rejected() {
        let store = InMemoryOutboxStore::new();
        let m = message("Dup");
        store.save(m.clone()).await.unwrap();
        assert!(store.save(m).await.is_err());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete_processed_is_idempotent() {
        let store = InMemoryOutboxStore::new();
        let processed = message("Processed");
        let pending = message("Pending");
        let processed_id = processed.id;
        store.save(processed).await.unwrap();
        store.save(pending).await.unwrap();
        store.mark_processed(processed_id).await.unwrap();

        let cutoff = Utc::now() + Duration::seconds(1);
        assert_eq!(store.delete_processed_older_than(cutoff).await.unwrap(), 1);
        assert_eq!(store.delete_processed_older_than(cutoff).await.unwrap(), 0);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_are_not_lost() {
        const MESSAGES: usize = 32;
        const FAILURES_PER_MESSAGE: u32 = 8;

        let store = Arc::new(InMemoryOutboxStore::new());
        let mut tasks = tokio::task::JoinSet::new();
        let mut ids = Vec::with_capacity(MESSAGES);
        for i in 0..MESSAGES {
            let m = message(&format!("Concurrent{i}"));
            ids.push(m.id);
            let store = Arc::clone(&store);
            tasks.spawn(async move { store.save(m).await.unwrap() });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap();
        }
        assert_eq!(store.len().await, MESSAGES);

        for (i, id) in ids.iter().copied().enumerate() {
            for attempt in 0..FAILURES_PER_MESSAGE {
                let store = Arc::clone(&store);
                tasks.spawn(async move {
                    store.mark_failed(id, &format!("attempt {attempt}")).await.unwrap()
                });
            }
            if i % 2 == 0 {
                let store = Arc::clone(&store);
                tasks.spawn(async move { store.mark_processed(id).await.unwrap() });
            }
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap();
        }

        for id in &ids {
            assert_eq!(store.get(*id).await.unwrap().attempts, FAILURES_PER_MESSAGE);
        }
        let pending = store.get_unprocessed(MESSAGES).await.unwrap();
        assert_eq!(pending.len(), MESSAGES / 2);
        assert!(pending.iter().all(|m| m.processed_at.is_none()));
    }
}
