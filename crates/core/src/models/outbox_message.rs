use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::HubResult;
use crate::traits::AnyNotification;

/// Outbox 消息
///
/// 已持久化但尚未投递的通知，由后台处理器异步发布。
///
/// # 字段说明
///
/// - `id`: 消息唯一标识
/// - `notification_type`: 通知的短类型名，用于日志
/// - `notification_type_full_name`: 通知的完整类型名，投递时据此查找解码器
/// - `payload`: 通知的 JSON 序列化结果
/// - `created_at`: 写入时间
/// - `processed_at`: 处理完成时间，仅在 `is_processed` 为真时存在
/// - `is_processed`: 是否已投递成功
/// - `attempts`: 失败次数，只增不减
/// - `last_error`: 最近一次失败的错误描述
///
/// # 使用示例
///
/// ```rust
/// use messagehub_core::models::OutboxMessage;
///
/// let message = OutboxMessage::new("app::UserCreated", r#"{"user_id":1}"#);
/// assert_eq!(message.notification_type, "UserCreated");
/// assert!(!message.is_processed);
/// assert_eq!(message.attempts, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxMessage {
    pub id: Uuid,
    pub notification_type: String,
    pub notification_type_full_name: String,
    pub payload: String,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub is_processed: bool,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl OutboxMessage {
    pub fn new(full_type_name: &str, payload: impl Into<String>) -> Self {
        let base = full_type_name.split('<').next().unwrap_or(full_type_name);
        let short = base.rsplit("::").next().unwrap_or(base);
        Self {
            id: Uuid::new_v4(),
            notification_type: short.to_string(),
            notification_type_full_name: full_type_name.to_string(),
            payload: payload.into(),
            created_at: Utc::now(),
            processed_at: None,
            is_processed: false,
            attempts: 0,
            last_error: None,
        }
    }

    /// 序列化通知并生成一条待处理的 Outbox 消息
    pub fn from_notification(notification: &dyn AnyNotification) -> HubResult<Self> {
        let payload = notification.to_json()?;
        Ok(Self::new(notification.full_type_name(), payload))
    }

    pub fn mark_processed(&mut self) {
        self.is_processed = true;
        self.processed_at = Some(Utc::now());
    }

    pub fn record_failure(&mut self, error: &str) {
        self.attempts += 1;
        self.last_error = Some(error.to_string());
    }

    /// 是否在 `cutoff` 之前完成处理，清理任务据此判断
    pub fn processed_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.is_processed && self.processed_at.is_some_and(|at| at < cutoff)
    }
}
