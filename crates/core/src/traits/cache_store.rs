use std::time::Duration;

use async_trait::async_trait;

use crate::errors::HubResult;

use super::message::ErasedResponse;

/// 响应缓存存储，需要容忍多个在途请求并发读写
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> HubResult<Option<ErasedResponse>>;

    async fn set(&self, key: &str, value: ErasedResponse, ttl: Duration) -> HubResult<()>;

    async fn remove(&self, key: &str) -> HubResult<bool>;
}
