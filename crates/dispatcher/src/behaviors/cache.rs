use std::sync::Arc;

use async_trait::async_trait;
use messagehub_core::{CachePolicy, CacheStore, ErasedResponse, HubResult};
use messagehub_infrastructure::MetricsCollector;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::pipeline::{Next, PipelineBehavior, RequestContext};

/// 按请求类型声明的缓存策略缓存响应
///
/// 相同键的并发请求不会合并，都会执行 `next` 并各自写入缓存。
pub struct CacheBehavior {
    store: Arc<dyn CacheStore>,
    metrics: MetricsCollector,
}

impl CacheBehavior {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            metrics: MetricsCollector::new(),
        }
    }

    /// 缓存键: `{前缀}:{请求 JSON 的 SHA-256}`
    ///
    /// 请求无法序列化时返回 `None`，本次调用不读写缓存。
    pub fn cache_key(ctx: &RequestContext<'_>, policy: &CachePolicy) -> Option<String> {
        let prefix = policy
            .key_prefix
            .as_deref()
            .unwrap_or_else(|| ctx.request_type());

        match ctx.request().to_json() {
            Ok(json) => {
                let digest = Sha256::digest(json.as_bytes());
                Some(format!("{prefix}:{digest:x}"))
            }
            Err(e) => {
                warn!(
                    request_type = ctx.request_type(),
                    error = %e,
                    "请求序列化失败，跳过缓存"
                );
                None
            }
        }
    }
}

#[async_trait]
impl PipelineBehavior for CacheBehavior {
    fn name(&self) -> &'static str {
        "Cache"
    }

    async fn handle(
        &self,
        ctx: &RequestContext<'_>,
        cancel: &CancellationToken,
        next: Next<'_>,
    ) -> HubResult<ErasedResponse> {
        let Some(policy) = ctx.metadata().cache.as_ref() else {
            return next.run(cancel).await;
        };

        let Some(key) = Self::cache_key(ctx, policy) else {
            return next.run(cancel).await;
        };
        match self.store.get(&key).await {
            Ok(Some(cached)) => {
                debug!(request_type = ctx.request_type(), cache_key = %key, "缓存命中");
                self.metrics.record_cache_lookup(ctx.request_type(), true);
                return Ok(cached);
            }
            Ok(None) => {
                debug!(request_type = ctx.request_type(), cache_key = %key, "缓存未命中");
                self.metrics.record_cache_lookup(ctx.request_type(), false);
            }
            Err(e) => {
                warn!(request_type = ctx.request_type(), error = %e, "读取缓存失败，直接执行请求");
            }
        }

        let response = next.run(cancel).await?;

        if let Err(e) = self.store.set(&key, response.clone(), policy.ttl()).await {
            warn!(request_type = ctx.request_type(), error = %e, "写入缓存失败");
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behaviors::test_support::{run_behavior, Probe, ScriptedHandler};
    use messagehub_core::{ErasedRequest, Request, RequestMetadata};
    use messagehub_infrastructure::InMemoryCacheStore;
    use serde::Serialize;
    use std::collections::HashMap;
    use std::time::Duration;
    use validator::Validate;

    fn cached_metadata(seconds: u64) -> RequestMetadata {
        RequestMetadata::default().with_cache(CachePolicy::for_seconds(seconds))
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_within_ttl_and_miss_after_expiry() {
        let store = Arc::new(InMemoryCacheStore::new());
        let handler = ScriptedHandler::new(vec![Ok(1), Ok(2)]);
        let metadata = cached_metadata(60);
        let probe = Probe::valid();

        let first = run_behavior(CacheBehavior::new(store.clone()), &probe, &metadata, &handler)
            .await
            .unwrap();
        let second = run_behavior(CacheBehavior::new(store.clone()), &probe, &metadata, &handler)
            .await
            .unwrap();
        assert_eq!(first.downcast_ref::<u32>(), Some(&1));
        assert_eq!(second.downcast_ref::<u32>(), Some(&1));
        assert_eq!(handler.calls(), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        let third = run_behavior(CacheBehavior::new(store), &probe, &metadata, &handler)
            .await
            .unwrap();
        assert_eq!(third.downcast_ref::<u32>(), Some(&2));
        assert_eq!(handler.calls(), 2);
    }

    #[tokio::test]
    async fn test_uncached_request_always_delegates() {
        let store = Arc::new(InMemoryCacheStore::new());
        let handler = ScriptedHandler::new(vec![Ok(1), Ok(2)]);
        let probe = Probe::valid();

        for _ in 0..2 {
            run_behavior(
                CacheBehavior::new(store.clone()),
                &probe,
                &RequestMetadata::default(),
                &handler,
            )
            .await
            .unwrap();
        }
        assert_eq!(handler.calls(), 2);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let store = Arc::new(InMemoryCacheStore::new());
        let handler = ScriptedHandler::new(vec![
            Err(messagehub_core::HubError::handler("nope")),
            Ok(9),
        ]);
        let metadata = cached_metadata(60);
        let probe = Probe::valid();

        assert!(run_behavior(CacheBehavior::new(store.clone()), &probe, &metadata, &handler)
            .await
            .is_err());
        let ok = run_behavior(CacheBehavior::new(store), &probe, &metadata, &handler)
            .await
            .unwrap();
        assert_eq!(ok.downcast_ref::<u32>(), Some(&9));
    }

    #[test]
    fn test_key_is_stable_for_equal_requests() {
        let policy = CachePolicy::for_seconds(10);
        let metadata = RequestMetadata::default();
        let a = Probe::valid();
        let b = Probe::valid();
        let c = Probe {
            id: 2,
            ..Probe::valid()
        };

        let key = |probe: &Probe| {
            let ctx = RequestContext::new(probe as &dyn ErasedRequest, &metadata);
            CacheBehavior::cache_key(&ctx, &policy).unwrap()
        };

        assert_eq!(key(&a), key(&b));
        assert_ne!(key(&a), key(&c));
        assert!(key(&a).starts_with("Probe:"));

        let prefixed = policy.clone().with_key_prefix("probe-v2");
        let ctx = RequestContext::new(&a as &dyn ErasedRequest, &metadata);
        assert!(CacheBehavior::cache_key(&ctx, &prefixed)
            .unwrap()
            .starts_with("probe-v2:"));
    }

    /// JSON 不支持非字符串键的映射，序列化必然失败
    #[derive(Serialize, Validate)]
    struct PairLookup {
        id: u32,
        pairs: HashMap<(u8, u8), u8>,
    }

    impl Request for PairLookup {
        type Response = u32;
    }

    #[tokio::test]
    async fn test_unserializable_requests_bypass_cache() {
        let store = Arc::new(InMemoryCacheStore::new());
        let handler = ScriptedHandler::new(vec![Ok(1), Ok(2), Ok(3)]);
        let metadata = cached_metadata(60);
        let behaviors: Vec<Arc<dyn PipelineBehavior>> =
            vec![Arc::new(CacheBehavior::new(store.clone()))];

        let mut responses = Vec::new();
        for id in 1..=3 {
            let request = PairLookup {
                id,
                pairs: HashMap::from([((id as u8, 0), 1)]),
            };
            assert!(request.to_json().is_err());

            let ctx = RequestContext::new(&request, &metadata);
            let response = Next::new(&ctx, &behaviors, &handler)
                .run(&CancellationToken::new())
                .await
                .unwrap();
            responses.push(*response.downcast_ref::<u32>().unwrap());
        }

        assert_eq!(responses, vec![1, 2, 3]);
        assert_eq!(handler.calls(), 3);
        assert_eq!(store.len().await, 0);
    }
}
