use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use messagehub_core::{CacheStore, ErasedResponse, HubResult};
use tokio::sync::RwLock;
use tokio::time::Instant;

struct CacheEntry {
    value: ErasedResponse,
    expires_at: Instant,
}

/// 内存响应缓存
///
/// 过期判断使用 tokio 时钟，测试里可以用暂停时钟推进时间。
#[derive(Default)]
pub struct InMemoryCacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 删除所有已过期条目，返回删除数量
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> HubResult<Option<ErasedResponse>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Ok(Some(entry.value.clone()))
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // 过期条目在读到时顺手删除
        let mut entries = self.entries.write().await;
        if entries
            .get(key)
            .is_some_and(|entry| entry.expires_at <= Instant::now())
        {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: ErasedResponse, ttl: Duration) -> HubResult<()> {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn remove(&self, key: &str) -> HubResult<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }
}
