use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::HubResult;
use crate::models::OutboxMessage;

/// Outbox 存储抽象接口
///
/// 实现必须在写入方（中介）与读取/更新方（后台处理器）并发访问时保持安全。
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// 持久化一条消息
    async fn save(&self, message: OutboxMessage) -> HubResult<()>;

    /// 按创建时间从旧到新获取最多 `batch_size` 条未处理消息
    async fn get_unprocessed(&self, batch_size: usize) -> HubResult<Vec<OutboxMessage>>;

    /// 标记消息已处理
    async fn mark_processed(&self, id: Uuid) -> HubResult<()>;

    /// 记录一次失败：尝试次数加一、记录错误，消息保持未处理以便重试
    async fn mark_failed(&self, id: Uuid, error: &str) -> HubResult<()>;

    /// 删除在 `cutoff` 之前完成处理的消息，返回删除数量
    async fn delete_processed_older_than(&self, cutoff: DateTime<Utc>) -> HubResult<u64>;
}
