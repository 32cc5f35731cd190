use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 重试行为配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// 最大重试次数（不含首次执行）
    pub max_retries: u32,
    /// 两次尝试之间的固定间隔（毫秒）
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay_ms: 1000,
        }
    }
}

impl RetryConfig {
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    /// 0 次重试视为未配置，回落到默认值
    pub fn effective_max_retries(&self) -> u32 {
        if self.max_retries == 0 {
            Self::DEFAULT_MAX_RETRIES
        } else {
            self.max_retries
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// 超时行为配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub default_timeout_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 30_000,
        }
    }
}

impl TimeoutConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.default_timeout_ms == 0 {
            return Err(anyhow::anyhow!("默认超时时间必须大于0"));
        }
        Ok(())
    }
}
