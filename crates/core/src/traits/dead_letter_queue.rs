use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::{HubError, HubResult};
use crate::models::DeadLetterMessage;

use super::message::AnyNotification;

/// 死信队列：记录通知处理器失败，供运维排查
///
/// 队列只负责记录，不做重试或重投递。
#[async_trait]
pub trait DeadLetterQueue: Send + Sync {
    /// 为一次（通知，失败处理器）失败事件创建一条不可变记录
    async fn add(
        &self,
        notification: &dyn AnyNotification,
        handler_type: &str,
        error: &HubError,
    ) -> HubResult<()>;

    /// 按创建时间从新到旧分页查询
    async fn get_messages(&self, skip: usize, take: usize) -> HubResult<Vec<DeadLetterMessage>>;

    /// 删除一条记录，记录不存在时静默返回
    async fn delete(&self, id: Uuid) -> HubResult<()>;

    async fn count(&self) -> HubResult<usize>;
}
