use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 请求类型的缓存声明
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePolicy {
    pub duration_seconds: u64,
    /// 缺省时使用请求的短类型名
    pub key_prefix: Option<String>,
}

impl CachePolicy {
    pub fn for_seconds(duration_seconds: u64) -> Self {
        Self {
            duration_seconds,
            key_prefix: None,
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.duration_seconds)
    }
}

/// 注册时解析出的每个请求类型的元数据
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMetadata {
    pub cache: Option<CachePolicy>,
    pub timeout: Option<Duration>,
}

impl RequestMetadata {
    pub fn new(cache: Option<CachePolicy>, timeout: Option<Duration>) -> Self {
        Self { cache, timeout }
    }

    pub fn with_cache(mut self, policy: CachePolicy) -> Self {
        self.cache = Some(policy);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
