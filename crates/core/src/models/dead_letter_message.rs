use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::HubError;
use crate::traits::AnyNotification;

/// 死信记录
///
/// 一次（通知，处理器）失败事件的不可变快照。创建后不再修改，
/// 只能被删除。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterMessage {
    pub id: Uuid,
    pub notification_type: String,
    pub notification_type_full_name: String,
    pub payload: String,
    pub handler_type: String,
    pub error_message: String,
    /// 渲染后的错误链
    pub stack_context: Option<String>,
    pub created_at: DateTime<Utc>,
    pub attempts: u32,
}

impl DeadLetterMessage {
    pub fn from_failure(
        notification: &dyn AnyNotification,
        handler_type: &str,
        error: &HubError,
    ) -> Self {
        // 负载无法序列化时仍然保留失败记录
        let payload = notification
            .to_json()
            .unwrap_or_else(|e| format!("<unserializable: {e}>"));
        let chain = error.render_chain();
        let stack_context = chain.contains('\n').then_some(chain);

        Self {
            id: Uuid::new_v4(),
            notification_type: notification.short_type_name().to_string(),
            notification_type_full_name: notification.full_type_name().to_string(),
            payload,
            handler_type: handler_type.to_string(),
            error_message: error.to_string(),
            stack_context,
            created_at: Utc::now(),
            attempts: 1,
        }
    }
}
