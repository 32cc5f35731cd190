use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outbox 后台处理与保留策略配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboxConfig {
    /// 轮询间隔（秒）
    pub polling_interval_seconds: u64,
    /// 每次轮询处理的最大消息数
    pub batch_size: usize,
    /// 是否启用已处理消息的定期清理
    pub cleanup_enabled: bool,
    /// 清理间隔（秒）
    pub cleanup_interval_seconds: u64,
    /// 已处理消息保留时长（小时）
    pub retention_hours: i64,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            polling_interval_seconds: 5,
            batch_size: 100,
            cleanup_enabled: true,
            cleanup_interval_seconds: 3600, // 1小时
            retention_hours: 24,
        }
    }
}

impl OutboxConfig {
    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval_seconds)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_seconds)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::hours(self.retention_hours)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.polling_interval_seconds == 0 {
            return Err(anyhow::anyhow!("Outbox轮询间隔必须大于0"));
        }

        if self.batch_size == 0 {
            return Err(anyhow::anyhow!("Outbox批处理大小必须大于0"));
        }

        if self.cleanup_enabled {
            if self.cleanup_interval_seconds == 0 {
                return Err(anyhow::anyhow!("Outbox清理间隔必须大于0"));
            }
            if self.retention_hours < 0 {
                return Err(anyhow::anyhow!("Outbox保留时长不能为负数"));
            }
        }

        Ok(())
    }
}
